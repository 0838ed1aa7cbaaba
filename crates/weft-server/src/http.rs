use std::convert::Infallible;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::warn;
use weft_contract::{Session, SessionKey};
use weft_protocol_ag_ui::{messages_snapshot, RunAgentInput};
use weft_runtime::{RequestMeta, RunContext};

use crate::service::{ApiError, AppState};

/// Health endpoint path.
pub const HEALTH_PATH: &str = "/health";
/// Agent run endpoint path.
pub const RUN_PATH: &str = "/run";
/// Session list endpoint path.
pub const SESSIONS_PATH: &str = "/sessions";
/// Session delete endpoint path.
pub const SESSION_PATH: &str = "/sessions/:session_id";
/// Session history endpoint path.
pub const SESSION_MESSAGES_PATH: &str = "/sessions/:session_id/messages";
/// Session state endpoint path.
pub const SESSION_STATE_PATH: &str = "/sessions/:session_id/state";

/// Build health routes.
pub fn health_routes() -> Router<AppState> {
    Router::new().route(HEALTH_PATH, get(health))
}

/// Build the streaming run route.
pub fn run_routes() -> Router<AppState> {
    Router::new().route(RUN_PATH, post(run))
}

/// Build session query routes.
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route(SESSIONS_PATH, get(list_sessions))
        .route(SESSION_PATH, delete(delete_session))
        .route(SESSION_MESSAGES_PATH, get(session_messages))
        .route(SESSION_STATE_PATH, get(session_state))
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

async fn run(
    State(st): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RunAgentInput>,
) -> Result<Response, ApiError> {
    req.validate()
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

    let input = req.into_run_input();
    let meta = request_meta(&headers);
    let resolved = st
        .config
        .resolve(&input, &meta)
        .await
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

    let ctx = RunContext::new(resolved.key, input, resolved.initial_state);
    let encoder = st.encoder;
    let frames = st
        .pipeline
        .execute(ctx)
        .map(move |event| Ok::<Bytes, Infallible>(encoder.encode(&event)));

    Ok(stream_response(st.encoder.content_type(), frames))
}

#[derive(Debug, Deserialize)]
struct UserQuery {
    #[serde(rename = "userId")]
    user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionSummary {
    session_id: String,
    created_at: u64,
    updated_at: u64,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.key.session_id.clone(),
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct SessionListResponse {
    sessions: Vec<SessionSummary>,
}

async fn list_sessions(
    State(st): State<AppState>,
    Query(params): Query<UserQuery>,
) -> Result<Json<SessionListResponse>, ApiError> {
    let sessions = st
        .store
        .list(&st.app_name, &params.user_id)
        .await
        .map_err(internal_error)?;
    Ok(Json(SessionListResponse {
        sessions: sessions.iter().map(SessionSummary::from).collect(),
    }))
}

async fn session_messages(
    State(st): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<UserQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let session = load_session(&st, &params.user_id, &session_id).await?;
    Ok(Json(messages_snapshot(&session.events)))
}

async fn session_state(
    State(st): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<UserQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let session = load_session(&st, &params.user_id, &session_id).await?;
    Ok(Json(session.state))
}

async fn delete_session(
    State(st): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<UserQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let key = SessionKey::new(&st.app_name, &params.user_id, &session_id);
    if st.store.get(&key).await.map_err(internal_error)?.is_none() {
        return Err(ApiError::SessionNotFound(session_id));
    }
    st.store.delete(&key).await.map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn load_session(
    st: &AppState,
    user_id: &str,
    session_id: &str,
) -> Result<Session, ApiError> {
    let key = SessionKey::new(&st.app_name, user_id, session_id);
    st.store
        .get(&key)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| ApiError::SessionNotFound(session_id.to_string()))
}

fn internal_error(e: weft_contract::SessionStoreError) -> ApiError {
    warn!(error = %e, "session store operation failed");
    ApiError::Internal(e.to_string())
}

fn request_meta(headers: &HeaderMap) -> RequestMeta {
    let mut meta = RequestMeta::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            meta = meta.with_header(name.as_str(), value);
        }
    }
    meta
}

/// Streaming response with the headers SSE clients expect.
fn stream_response<S>(content_type: &'static str, stream: S) -> Response
where
    S: futures::Stream<Item = Result<Bytes, Infallible>> + Send + 'static,
{
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    (headers, Body::from_stream(stream)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_meta_lowercases_header_names() {
        let mut headers = HeaderMap::new();
        headers.insert("X-User-Id", HeaderValue::from_static("alice"));
        let meta = request_meta(&headers);
        assert_eq!(meta.header("x-user-id"), Some("alice"));
        assert_eq!(meta.header("X-USER-ID"), Some("alice"));
    }
}
