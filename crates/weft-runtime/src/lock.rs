//! Session locking.
//!
//! One run per session at a time. Acquisition is async and may retry;
//! release is synchronous and infallible so it can run inside `Drop` on
//! every exit path, including cancellation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, warn};
use weft_contract::SessionKey;
use weft_protocol_ag_ui::Event;

/// Tuning for lock acquisition.
#[derive(Debug, Clone)]
pub struct SessionLockConfig {
    /// How long a holder may keep the lock before it can be reclaimed.
    /// `None` disables lease expiry.
    pub lock_timeout: Option<Duration>,
    /// Acquisition attempts after the first failure.
    pub lock_retry_times: u32,
    /// Delay between attempts.
    pub lock_retry_interval: Duration,
}

impl Default for SessionLockConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Some(Duration::from_secs(300)),
            lock_retry_times: 3,
            lock_retry_interval: Duration::from_secs(10),
        }
    }
}

struct LockEntry {
    held: bool,
    acquired_at: Instant,
}

/// Process-wide test-and-set lock keyed by session.
#[derive(Default)]
pub struct SessionLock {
    entries: Mutex<HashMap<SessionKey, LockEntry>>,
    lock_timeout: Option<Duration>,
}

impl SessionLock {
    pub fn new(lock_timeout: Option<Duration>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            lock_timeout,
        }
    }

    /// One acquisition attempt. A holder past its lease is evicted and
    /// the lock handed to the caller.
    pub fn acquire(&self, key: &SessionKey) -> bool {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let entry = entries.entry(key.clone()).or_insert(LockEntry {
            held: false,
            acquired_at: now,
        });
        if entry.held {
            let expired = self
                .lock_timeout
                .is_some_and(|timeout| now.duration_since(entry.acquired_at) >= timeout);
            if !expired {
                return false;
            }
            warn!(session = %key, "reclaiming session lock past its lease");
        }
        entry.held = true;
        entry.acquired_at = now;
        true
    }

    /// Releases the lock. Idempotent; releasing an unheld key is a no-op.
    pub fn release(&self, key: &SessionKey) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get_mut(key) {
            entry.held = false;
        }
    }

    pub fn is_held(&self, key: &SessionKey) -> bool {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.get(key).is_some_and(|entry| entry.held)
    }
}

/// Pluggable lock behavior consulted by the pipeline.
#[async_trait]
pub trait SessionLockHandler: Send + Sync {
    /// Try to take the session for one run.
    async fn lock(&self, key: &SessionKey) -> bool;

    /// Give the session back. Must be synchronous, infallible, and
    /// idempotent; the run guard calls it from `Drop`.
    fn unlock(&self, key: &SessionKey);

    /// The single event a caller receives instead of a run while the
    /// session is busy.
    fn locked_response(&self, key: &SessionKey) -> Event;
}

/// In-memory lock handler with retry.
pub struct DefaultSessionLockHandler {
    lock: SessionLock,
    config: SessionLockConfig,
}

impl DefaultSessionLockHandler {
    pub fn new(config: SessionLockConfig) -> Self {
        Self {
            lock: SessionLock::new(config.lock_timeout),
            config,
        }
    }
}

impl Default for DefaultSessionLockHandler {
    fn default() -> Self {
        Self::new(SessionLockConfig::default())
    }
}

#[async_trait]
impl SessionLockHandler for DefaultSessionLockHandler {
    async fn lock(&self, key: &SessionKey) -> bool {
        for attempt in 0..=self.config.lock_retry_times {
            if self.lock.acquire(key) {
                if attempt > 0 {
                    debug!(session = %key, attempt, "session lock acquired after retry");
                }
                return true;
            }
            if attempt < self.config.lock_retry_times {
                tokio::time::sleep(self.config.lock_retry_interval).await;
            }
        }
        debug!(session = %key, "session lock unavailable");
        false
    }

    fn unlock(&self, key: &SessionKey) {
        self.lock.release(key);
    }

    fn locked_response(&self, key: &SessionKey) -> Event {
        Event::locked_error(&key.session_id)
    }
}

/// Releases the session lock when dropped.
pub struct LockGuard {
    handler: Arc<dyn SessionLockHandler>,
    key: SessionKey,
}

impl LockGuard {
    pub fn new(handler: Arc<dyn SessionLockHandler>, key: SessionKey) -> Self {
        Self { handler, key }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.handler.unlock(&self.key);
    }
}
