//! AG-UI protocol surface.
//!
//! Canonical client-facing events, wire request parsing, the internal
//! event translator, transport framing, and history reconstruction.

pub mod encoder;
pub mod events;
pub mod history;
pub mod request;
pub mod translator;

pub use encoder::{EncodingMode, SseEncoder};
pub use events::{codes, BaseEvent, Event};
pub use history::{messages_snapshot, rebuild_messages};
pub use request::{RequestError, RunAgentInput};
pub use translator::EventTranslator;
