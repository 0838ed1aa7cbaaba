//! Shared contracts for the weft middleware.
//!
//! This crate defines the internal agent event model, the agent execution
//! seam, and session persistence. It carries no protocol or transport
//! concerns; those live in the protocol and runtime crates.

pub mod agent;
pub mod event;
pub mod ids;
pub mod message;
pub mod store;

pub use agent::{Agent, AgentError, AgentEventStream, AgentFactory, AgentRunRequest};
pub use event::{AgentEvent, CustomPayload, Part, StateAction, AUTHOR_SYSTEM, AUTHOR_USER};
pub use ids::generate_id;
pub use message::{FunctionCallRecord, Message, Role, RunInput, ToolCallRecord};
pub use store::{Session, SessionKey, SessionStore, SessionStoreError};
