//! In-memory session store for tests and single-process deployments.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::warn;
use weft_contract::{
    AgentEvent, Session, SessionKey, SessionStore, SessionStoreError, StateAction,
};

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Folds one state action into session state.
fn apply_state_action(state: &mut Value, action: &StateAction) {
    match action {
        StateAction::Delta(map) => {
            if let Value::Object(obj) = state {
                for (key, value) in map {
                    obj.insert(key.clone(), value.clone());
                }
            }
        }
        StateAction::Patch(ops) => {
            match serde_json::from_value::<json_patch::Patch>(Value::Array(ops.clone())) {
                Ok(patch) => {
                    if let Err(e) = json_patch::patch(state, &patch) {
                        warn!(error = %e, "state patch failed to apply");
                    }
                }
                Err(e) => warn!(error = %e, "state patch is not valid RFC 6902"),
            }
        }
        StateAction::Snapshot(snapshot) => {
            *state = snapshot.clone();
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &SessionKey) -> Result<Option<Session>, SessionStoreError> {
        Ok(self.sessions.read().await.get(&key.to_string()).cloned())
    }

    async fn create(
        &self,
        key: &SessionKey,
        initial_state: Value,
    ) -> Result<Session, SessionStoreError> {
        let mut sessions = self.sessions.write().await;
        let storage_key = key.to_string();
        if sessions.contains_key(&storage_key) {
            return Err(SessionStoreError::AlreadyExists(storage_key));
        }
        let now = now_millis();
        let session = Session {
            key: key.clone(),
            state: initial_state,
            events: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        sessions.insert(storage_key, session.clone());
        Ok(session)
    }

    async fn append_events(
        &self,
        key: &SessionKey,
        events: &[AgentEvent],
    ) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.write().await;
        let storage_key = key.to_string();
        let session = sessions
            .get_mut(&storage_key)
            .ok_or(SessionStoreError::NotFound(storage_key))?;
        for event in events {
            if let Some(action) = &event.state {
                apply_state_action(&mut session.state, action);
            }
            session.events.push(event.clone());
        }
        session.updated_at = now_millis();
        Ok(())
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), SessionStoreError> {
        self.sessions.write().await.remove(&key.to_string());
        Ok(())
    }

    async fn list(
        &self,
        app_name: &str,
        user_id: &str,
    ) -> Result<Vec<Session>, SessionStoreError> {
        let sessions = self.sessions.read().await;
        let mut matching: Vec<Session> = sessions
            .values()
            .filter(|s| s.key.app_name == app_name && s.key.user_id == user_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.key.session_id.cmp(&b.key.session_id))
        });
        Ok(matching)
    }
}
