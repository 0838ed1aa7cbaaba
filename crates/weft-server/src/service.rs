use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use weft_contract::SessionStore;
use weft_protocol_ag_ui::SseEncoder;
use weft_runtime::{ConfigContext, RunPipeline};

/// Shared state behind every route.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RunPipeline>,
    pub config: Arc<ConfigContext>,
    pub store: Arc<dyn SessionStore>,
    pub encoder: SseEncoder,
    /// App name used for session query endpoints.
    pub app_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, msg) = match &self {
            ApiError::SessionNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::InvalidRequest(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };
        let body = Json(serde_json::json!({ "error": msg }));
        (code, body).into_response()
    }
}
