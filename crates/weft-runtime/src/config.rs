//! Per-request identity and state resolution.
//!
//! Deployments differ in where identity comes from: a header, a token
//! claim, a field in the request body, or a constant. [`ValueSource`]
//! captures that choice per field; [`ConfigContext`] groups the four
//! fields the pipeline needs and resolves them once per request.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Map, Value};
use weft_contract::{RunInput, SessionKey};

/// Failure while resolving a config field.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to resolve {field}: {reason}")]
pub struct ExtractionError {
    pub field: String,
    pub reason: String,
}

impl ExtractionError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Request-scoped metadata visible to extractors.
///
/// Header names are stored lowercase.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    headers: HashMap<String, String>,
}

impl RequestMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

type ExtractorFn<T> = dyn for<'a> Fn(&'a RunInput, &'a RequestMeta) -> BoxFuture<'a, Result<T, ExtractionError>>
    + Send
    + Sync;

/// A config field that is either fixed or computed per request.
pub enum ValueSource<T> {
    Constant(T),
    Extractor(Arc<ExtractorFn<T>>),
}

impl<T: Clone + Send + 'static> ValueSource<T> {
    pub fn constant(value: T) -> Self {
        Self::Constant(value)
    }

    /// Wraps a synchronous extraction function.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&RunInput, &RequestMeta) -> Result<T, ExtractionError> + Send + Sync + 'static,
    {
        Self::Extractor(Arc::new(move |input, meta| {
            let out = f(input, meta);
            Box::pin(async move { out })
        }))
    }

    pub async fn resolve(
        &self,
        input: &RunInput,
        meta: &RequestMeta,
    ) -> Result<T, ExtractionError> {
        match self {
            Self::Constant(value) => Ok(value.clone()),
            Self::Extractor(f) => f(input, meta).await,
        }
    }
}

/// Everything the pipeline needs resolved before a run can start.
#[derive(Debug, Clone)]
pub struct ResolvedRun {
    pub key: SessionKey,
    pub initial_state: Value,
}

/// Identity and state resolution for one deployment.
///
/// Defaults: a fixed app name, session id equal to the client's thread
/// id, and initial state taken from the request (empty object when the
/// request carries none). Only the user id has no sensible default and
/// must be supplied.
pub struct ConfigContext {
    pub app_name: ValueSource<String>,
    pub user_id: ValueSource<String>,
    pub session_id: ValueSource<String>,
    pub initial_state: ValueSource<Value>,
}

impl ConfigContext {
    pub fn new(user_id: ValueSource<String>) -> Self {
        Self {
            app_name: ValueSource::constant("default".to_string()),
            user_id,
            session_id: ValueSource::from_fn(|input, _| Ok(input.thread_id.clone())),
            initial_state: ValueSource::from_fn(|input, _| {
                Ok(input
                    .state
                    .clone()
                    .unwrap_or_else(|| Value::Object(Map::new())))
            }),
        }
    }

    /// User id read from a request header.
    pub fn with_user_id_header(header_name: impl Into<String>) -> Self {
        let name = header_name.into();
        Self::new(ValueSource::from_fn(move |_, meta| {
            meta.header(&name)
                .map(str::to_string)
                .ok_or_else(|| ExtractionError::new("user_id", format!("missing header {name}")))
        }))
    }

    pub fn with_app_name(mut self, app_name: ValueSource<String>) -> Self {
        self.app_name = app_name;
        self
    }

    pub fn with_session_id(mut self, session_id: ValueSource<String>) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn with_initial_state(mut self, initial_state: ValueSource<Value>) -> Self {
        self.initial_state = initial_state;
        self
    }

    /// Resolves every field for this request.
    pub async fn resolve(
        &self,
        input: &RunInput,
        meta: &RequestMeta,
    ) -> Result<ResolvedRun, ExtractionError> {
        let app_name = self.app_name.resolve(input, meta).await?;
        let user_id = self.user_id.resolve(input, meta).await?;
        let session_id = self.session_id.resolve(input, meta).await?;
        let initial_state = self.initial_state.resolve(input, meta).await?;
        Ok(ResolvedRun {
            key: SessionKey::new(app_name, user_id, session_id),
            initial_state,
        })
    }
}
