//! Hook points consulted by the run pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;
use weft_contract::{AgentEvent, RunInput};
use weft_protocol_ag_ui::Event;

use crate::lock::{DefaultSessionLockHandler, SessionLockHandler};

/// Overrides translation for selected internal events.
#[async_trait]
pub trait TranslateHandler: Send + Sync {
    /// `Some(events)` replaces the default translation for this event;
    /// an empty vec drops it deliberately. `None` falls through to the
    /// default translator.
    async fn translate(&self, event: &AgentEvent) -> Option<Vec<Event>>;
}

/// Observes run input and outbound events, and may rewrite the latter.
#[async_trait]
pub trait RunRecorder: Send + Sync {
    /// Called once, after the lock is held and before anything runs.
    async fn record_input(&self, input: &RunInput);

    /// Called for every outbound event; the returned event is what the
    /// client receives.
    async fn record_output(&self, event: Event) -> Event;
}

/// Default recorder: trace logging, no rewriting.
#[derive(Debug, Default)]
pub struct LoggingRecorder;

#[async_trait]
impl RunRecorder for LoggingRecorder {
    async fn record_input(&self, input: &RunInput) {
        trace!(
            thread_id = %input.thread_id,
            run_id = %input.run_id,
            messages = input.messages.len(),
            "run input accepted"
        );
    }

    async fn record_output(&self, event: Event) -> Event {
        trace!(event_type = event.type_name(), "event delivered");
        event
    }
}

/// The pluggable pieces of one pipeline: lock behavior, translation
/// overrides, and input/output recording.
#[derive(Clone)]
pub struct HandlerSet {
    pub lock: Arc<dyn SessionLockHandler>,
    pub translate: Option<Arc<dyn TranslateHandler>>,
    pub recorder: Arc<dyn RunRecorder>,
}

impl HandlerSet {
    pub fn new() -> Self {
        Self {
            lock: Arc::new(DefaultSessionLockHandler::default()),
            translate: None,
            recorder: Arc::new(LoggingRecorder),
        }
    }

    pub fn with_lock(mut self, lock: Arc<dyn SessionLockHandler>) -> Self {
        self.lock = lock;
        self
    }

    pub fn with_translate(mut self, translate: Arc<dyn TranslateHandler>) -> Self {
        self.translate = Some(translate);
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn RunRecorder>) -> Self {
        self.recorder = recorder;
        self
    }
}

impl Default for HandlerSet {
    fn default() -> Self {
        Self::new()
    }
}
