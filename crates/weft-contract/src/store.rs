//! Session identity and persistence.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::AgentEvent;

/// Identity of one conversation: one session of one user of one app.
///
/// This triple is both the storage key and the mutual-exclusion key; at
/// most one run may hold it at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
}

impl SessionKey {
    pub fn new(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.app_name, self.user_id, self.session_id)
    }
}

/// A persisted conversation: its state and its full internal event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub key: SessionKey,
    /// Current state, the fold of every state action in `events`.
    pub state: Value,
    /// Internal events in arrival order.
    pub events: Vec<AgentEvent>,
    /// Creation time, milliseconds since the epoch.
    pub created_at: u64,
    /// Last append time, milliseconds since the epoch.
    pub updated_at: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("session already exists: {0}")]
    AlreadyExists(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Persistence backend for sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &SessionKey) -> Result<Option<Session>, SessionStoreError>;

    async fn create(
        &self,
        key: &SessionKey,
        initial_state: Value,
    ) -> Result<Session, SessionStoreError>;

    /// Appends events to the session log and folds their state actions
    /// into session state.
    async fn append_events(
        &self,
        key: &SessionKey,
        events: &[AgentEvent],
    ) -> Result<(), SessionStoreError>;

    async fn delete(&self, key: &SessionKey) -> Result<(), SessionStoreError>;

    /// Sessions belonging to one user of one app, oldest first.
    async fn list(
        &self,
        app_name: &str,
        user_id: &str,
    ) -> Result<Vec<Session>, SessionStoreError>;

    /// Fetches the session, creating it when absent.
    ///
    /// Tolerates a concurrent create by re-reading after a lost race.
    async fn get_or_create(
        &self,
        key: &SessionKey,
        initial_state: Value,
    ) -> Result<Session, SessionStoreError> {
        if let Some(session) = self.get(key).await? {
            return Ok(session);
        }
        match self.create(key, initial_state).await {
            Ok(session) => Ok(session),
            Err(SessionStoreError::AlreadyExists(_)) => match self.get(key).await? {
                Some(session) => Ok(session),
                None => Err(SessionStoreError::NotFound(key.to_string())),
            },
            Err(e) => Err(e),
        }
    }
}
