//! Execution runtime for the weft middleware.
//!
//! Owns everything between an accepted run request and the stream of
//! canonical events handed to the transport: session locking, the event
//! queue pair, per-request config resolution, hook points, and the run
//! pipeline itself.

pub mod config;
pub mod handlers;
pub mod lock;
pub mod memory_store;
pub mod pipeline;
pub mod queue;

pub use config::{ConfigContext, ExtractionError, RequestMeta, ResolvedRun, ValueSource};
pub use handlers::{HandlerSet, LoggingRecorder, RunRecorder, TranslateHandler};
pub use lock::{
    DefaultSessionLockHandler, LockGuard, SessionLock, SessionLockConfig, SessionLockHandler,
};
pub use memory_store::MemorySessionStore;
pub use pipeline::{RunContext, RunPipeline};
pub use queue::{event_queue, EventQueueReceiver, EventQueueSender};
