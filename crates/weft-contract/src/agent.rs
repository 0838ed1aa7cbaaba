//! The agent execution seam.
//!
//! The runtime never knows what an agent is made of. It asks a factory
//! for a fresh instance, hands it the run request, and consumes the
//! resulting event stream until it ends or fails.

use futures::stream::BoxStream;
use serde_json::Value;

use crate::event::AgentEvent;
use crate::message::RunInput;
use crate::store::SessionKey;

/// Error surfaced by a failing agent run.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AgentError {
    #[error("agent execution failed: {0}")]
    Failed(String),
    #[error("agent run cancelled")]
    Cancelled,
}

/// Stream of events produced by one agent run.
///
/// An `Err` item is terminal: no further items are consumed after it.
pub type AgentEventStream = BoxStream<'static, Result<AgentEvent, AgentError>>;

/// Everything an agent sees for one run.
#[derive(Debug, Clone)]
pub struct AgentRunRequest {
    pub key: SessionKey,
    pub input: RunInput,
    /// Session state at the start of the run.
    pub initial_state: Value,
}

/// One exclusive agent execution. The instance is consumed by the run.
pub trait Agent: Send {
    fn run(self: Box<Self>, request: AgentRunRequest) -> AgentEventStream;
}

/// Produces a fresh, independent agent instance per run.
///
/// Instances must not share mutable state; concurrent runs on different
/// sessions each get their own.
pub trait AgentFactory: Send + Sync {
    fn create_agent(&self) -> Box<dyn Agent>;
}
