//! Transport framing for the outbound event stream.

use bytes::Bytes;
use tracing::warn;

use crate::events::Event;

/// Last-resort frame body when even the substitute error event fails to
/// serialize. Built from primitives only.
const FALLBACK_ERROR_JSON: &str =
    r#"{"type":"RUN_ERROR","message":"Failed to encode event for transport","code":"ENCODING_ERROR"}"#;

/// Wire framing mode for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncodingMode {
    /// `event:` and `data:` lines per SSE.
    #[default]
    Sse,
    /// Bare JSON per event, blank-line separated.
    Plain,
}

/// Serializes canonical events into transport frames.
///
/// Encoding never breaks the stream: when an event fails to serialize, a
/// primitives-only `RUN_ERROR` frame takes its place.
#[derive(Debug, Clone, Copy, Default)]
pub struct SseEncoder {
    mode: EncodingMode,
}

impl SseEncoder {
    pub fn new(mode: EncodingMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> EncodingMode {
        self.mode
    }

    /// Content type the response must advertise for this mode.
    pub fn content_type(&self) -> &'static str {
        match self.mode {
            EncodingMode::Sse => "text/event-stream",
            EncodingMode::Plain => "text/plain; charset=utf-8",
        }
    }

    pub fn encode(&self, event: &Event) -> Bytes {
        match serde_json::to_string(event) {
            Ok(json) => self.frame(event.type_name(), &json),
            Err(e) => {
                warn!(
                    event_type = event.type_name(),
                    error = %e,
                    "failed to serialize event; substituting encoding error"
                );
                let substitute = Event::encoding_error();
                let json = serde_json::to_string(&substitute)
                    .unwrap_or_else(|_| FALLBACK_ERROR_JSON.to_string());
                self.frame(substitute.type_name(), &json)
            }
        }
    }

    fn frame(&self, name: &str, json: &str) -> Bytes {
        match self.mode {
            EncodingMode::Sse => Bytes::from(format!("event: {name}\ndata: {json}\n\n")),
            EncodingMode::Plain => Bytes::from(format!("{json}\n\n")),
        }
    }
}
