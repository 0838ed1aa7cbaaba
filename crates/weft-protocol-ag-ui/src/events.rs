//! Canonical AG-UI event model.
//!
//! Every event the client sees is one of these variants, serialized with a
//! SCREAMING_SNAKE_CASE `type` tag and camelCase fields. Factory methods
//! build well-formed events; `with_timestamp` stamps them on the way out.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use weft_contract::Role;

/// Stable error codes carried by `RUN_ERROR` events and request errors.
pub mod codes {
    /// The session is already running; try again later.
    pub const THREAD_IS_LOCKED: &str = "THREAD_IS_LOCKED";
    /// The agent itself failed while running.
    pub const AGENT_ERROR: &str = "AGENT_ERROR";
    /// The pipeline failed outside the agent.
    pub const EXECUTION_ERROR: &str = "EXECUTION_ERROR";
    /// An event could not be serialized for transport.
    pub const ENCODING_ERROR: &str = "ENCODING_ERROR";
    /// The request carried no user message to run on.
    pub const NO_INPUT_MESSAGE: &str = "NO_INPUT_MESSAGE";
}

/// Fields shared by every canonical event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseEvent {
    /// Milliseconds since the epoch, set when the event is stamped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    /// The internal event this one was translated from, when attached.
    #[serde(
        rename = "rawEvent",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub raw_event: Option<Value>,
}

/// A canonical client-facing event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // ==========================================================
    // Lifecycle
    // ==========================================================
    #[serde(rename = "RUN_STARTED")]
    RunStarted {
        #[serde(rename = "threadId")]
        thread_id: String,
        #[serde(rename = "runId")]
        run_id: String,
        #[serde(flatten)]
        base: BaseEvent,
    },
    #[serde(rename = "RUN_FINISHED")]
    RunFinished {
        #[serde(rename = "threadId")]
        thread_id: String,
        #[serde(rename = "runId")]
        run_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(flatten)]
        base: BaseEvent,
    },
    #[serde(rename = "RUN_ERROR")]
    RunError {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        #[serde(flatten)]
        base: BaseEvent,
    },

    // ==========================================================
    // Text messages
    // ==========================================================
    #[serde(rename = "TEXT_MESSAGE_START")]
    TextMessageStart {
        #[serde(rename = "messageId")]
        message_id: String,
        role: Role,
        #[serde(flatten)]
        base: BaseEvent,
    },
    #[serde(rename = "TEXT_MESSAGE_CONTENT")]
    TextMessageContent {
        #[serde(rename = "messageId")]
        message_id: String,
        delta: String,
        #[serde(flatten)]
        base: BaseEvent,
    },
    #[serde(rename = "TEXT_MESSAGE_END")]
    TextMessageEnd {
        #[serde(rename = "messageId")]
        message_id: String,
        #[serde(flatten)]
        base: BaseEvent,
    },

    // ==========================================================
    // Thinking track
    // ==========================================================
    #[serde(rename = "THINKING_START")]
    ThinkingStart {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(flatten)]
        base: BaseEvent,
    },
    #[serde(rename = "THINKING_END")]
    ThinkingEnd {
        #[serde(flatten)]
        base: BaseEvent,
    },
    #[serde(rename = "THINKING_TEXT_MESSAGE_START")]
    ThinkingTextMessageStart {
        #[serde(rename = "thinkingId")]
        thinking_id: String,
        #[serde(flatten)]
        base: BaseEvent,
    },
    #[serde(rename = "THINKING_TEXT_MESSAGE_CONTENT")]
    ThinkingTextMessageContent {
        #[serde(rename = "thinkingId")]
        thinking_id: String,
        delta: String,
        #[serde(flatten)]
        base: BaseEvent,
    },
    #[serde(rename = "THINKING_TEXT_MESSAGE_END")]
    ThinkingTextMessageEnd {
        #[serde(rename = "thinkingId")]
        thinking_id: String,
        #[serde(flatten)]
        base: BaseEvent,
    },

    // ==========================================================
    // Tool calls
    // ==========================================================
    #[serde(rename = "TOOL_CALL_START")]
    ToolCallStart {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolCallName")]
        tool_call_name: String,
        #[serde(
            rename = "parentMessageId",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        parent_message_id: Option<String>,
        #[serde(flatten)]
        base: BaseEvent,
    },
    #[serde(rename = "TOOL_CALL_ARGS")]
    ToolCallArgs {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        delta: String,
        #[serde(flatten)]
        base: BaseEvent,
    },
    #[serde(rename = "TOOL_CALL_END")]
    ToolCallEnd {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(flatten)]
        base: BaseEvent,
    },
    #[serde(rename = "TOOL_CALL_RESULT")]
    ToolCallResult {
        #[serde(rename = "messageId")]
        message_id: String,
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// JSON-serialized tool output.
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<Role>,
        #[serde(flatten)]
        base: BaseEvent,
    },

    // ==========================================================
    // State and snapshots
    // ==========================================================
    #[serde(rename = "STATE_SNAPSHOT")]
    StateSnapshot {
        snapshot: Value,
        #[serde(flatten)]
        base: BaseEvent,
    },
    #[serde(rename = "STATE_DELTA")]
    StateDelta {
        /// RFC 6902 operations.
        delta: Vec<Value>,
        #[serde(flatten)]
        base: BaseEvent,
    },
    #[serde(rename = "MESSAGES_SNAPSHOT")]
    MessagesSnapshot {
        messages: Vec<Value>,
        #[serde(flatten)]
        base: BaseEvent,
    },

    // ==========================================================
    // Escape hatch
    // ==========================================================
    #[serde(rename = "CUSTOM")]
    Custom {
        name: String,
        value: Value,
        #[serde(flatten)]
        base: BaseEvent,
    },
}

impl Event {
    pub fn run_started(thread_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self::RunStarted {
            thread_id: thread_id.into(),
            run_id: run_id.into(),
            base: BaseEvent::default(),
        }
    }

    pub fn run_finished(
        thread_id: impl Into<String>,
        run_id: impl Into<String>,
        result: Option<Value>,
    ) -> Self {
        Self::RunFinished {
            thread_id: thread_id.into(),
            run_id: run_id.into(),
            result,
            base: BaseEvent::default(),
        }
    }

    pub fn run_error(message: impl Into<String>, code: Option<String>) -> Self {
        Self::RunError {
            message: message.into(),
            code,
            base: BaseEvent::default(),
        }
    }

    /// `RUN_ERROR` emitted instead of a run when the session is busy.
    pub fn locked_error(session_id: &str) -> Self {
        Self::run_error(
            format!("Session {session_id} is currently processing another request"),
            Some(codes::THREAD_IS_LOCKED.to_string()),
        )
    }

    /// `RUN_ERROR` for a failure inside the agent itself.
    pub fn agent_error(message: impl Into<String>) -> Self {
        Self::run_error(message, Some(codes::AGENT_ERROR.to_string()))
    }

    /// `RUN_ERROR` for a pipeline failure outside the agent.
    pub fn execution_error(message: impl Into<String>) -> Self {
        Self::run_error(message, Some(codes::EXECUTION_ERROR.to_string()))
    }

    /// `RUN_ERROR` substituted for an event that failed to serialize.
    pub fn encoding_error() -> Self {
        Self::run_error(
            "Failed to encode event for transport",
            Some(codes::ENCODING_ERROR.to_string()),
        )
    }

    /// Opens an assistant text message.
    pub fn text_message_start(message_id: impl Into<String>) -> Self {
        Self::TextMessageStart {
            message_id: message_id.into(),
            role: Role::Assistant,
            base: BaseEvent::default(),
        }
    }

    pub fn text_message_content(
        message_id: impl Into<String>,
        delta: impl Into<String>,
    ) -> Self {
        Self::TextMessageContent {
            message_id: message_id.into(),
            delta: delta.into(),
            base: BaseEvent::default(),
        }
    }

    pub fn text_message_end(message_id: impl Into<String>) -> Self {
        Self::TextMessageEnd {
            message_id: message_id.into(),
            base: BaseEvent::default(),
        }
    }

    pub fn thinking_start(title: Option<String>) -> Self {
        Self::ThinkingStart {
            title,
            base: BaseEvent::default(),
        }
    }

    pub fn thinking_end() -> Self {
        Self::ThinkingEnd {
            base: BaseEvent::default(),
        }
    }

    pub fn thinking_text_start(thinking_id: impl Into<String>) -> Self {
        Self::ThinkingTextMessageStart {
            thinking_id: thinking_id.into(),
            base: BaseEvent::default(),
        }
    }

    pub fn thinking_text_content(
        thinking_id: impl Into<String>,
        delta: impl Into<String>,
    ) -> Self {
        Self::ThinkingTextMessageContent {
            thinking_id: thinking_id.into(),
            delta: delta.into(),
            base: BaseEvent::default(),
        }
    }

    pub fn thinking_text_end(thinking_id: impl Into<String>) -> Self {
        Self::ThinkingTextMessageEnd {
            thinking_id: thinking_id.into(),
            base: BaseEvent::default(),
        }
    }

    pub fn tool_call_start(
        tool_call_id: impl Into<String>,
        tool_call_name: impl Into<String>,
        parent_message_id: Option<String>,
    ) -> Self {
        Self::ToolCallStart {
            tool_call_id: tool_call_id.into(),
            tool_call_name: tool_call_name.into(),
            parent_message_id,
            base: BaseEvent::default(),
        }
    }

    pub fn tool_call_args(tool_call_id: impl Into<String>, delta: impl Into<String>) -> Self {
        Self::ToolCallArgs {
            tool_call_id: tool_call_id.into(),
            delta: delta.into(),
            base: BaseEvent::default(),
        }
    }

    pub fn tool_call_end(tool_call_id: impl Into<String>) -> Self {
        Self::ToolCallEnd {
            tool_call_id: tool_call_id.into(),
            base: BaseEvent::default(),
        }
    }

    /// Tool output as a tool-role message tied to its call.
    pub fn tool_call_result(
        message_id: impl Into<String>,
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::ToolCallResult {
            message_id: message_id.into(),
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            role: Some(Role::Tool),
            base: BaseEvent::default(),
        }
    }

    pub fn state_snapshot(snapshot: Value) -> Self {
        Self::StateSnapshot {
            snapshot,
            base: BaseEvent::default(),
        }
    }

    pub fn state_delta(delta: Vec<Value>) -> Self {
        Self::StateDelta {
            delta,
            base: BaseEvent::default(),
        }
    }

    pub fn messages_snapshot(messages: Vec<Value>) -> Self {
        Self::MessagesSnapshot {
            messages,
            base: BaseEvent::default(),
        }
    }

    pub fn custom(name: impl Into<String>, value: Value) -> Self {
        Self::Custom {
            name: name.into(),
            value,
            base: BaseEvent::default(),
        }
    }

    /// The wire `type` tag for this event.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "RUN_STARTED",
            Self::RunFinished { .. } => "RUN_FINISHED",
            Self::RunError { .. } => "RUN_ERROR",
            Self::TextMessageStart { .. } => "TEXT_MESSAGE_START",
            Self::TextMessageContent { .. } => "TEXT_MESSAGE_CONTENT",
            Self::TextMessageEnd { .. } => "TEXT_MESSAGE_END",
            Self::ThinkingStart { .. } => "THINKING_START",
            Self::ThinkingEnd { .. } => "THINKING_END",
            Self::ThinkingTextMessageStart { .. } => "THINKING_TEXT_MESSAGE_START",
            Self::ThinkingTextMessageContent { .. } => "THINKING_TEXT_MESSAGE_CONTENT",
            Self::ThinkingTextMessageEnd { .. } => "THINKING_TEXT_MESSAGE_END",
            Self::ToolCallStart { .. } => "TOOL_CALL_START",
            Self::ToolCallArgs { .. } => "TOOL_CALL_ARGS",
            Self::ToolCallEnd { .. } => "TOOL_CALL_END",
            Self::ToolCallResult { .. } => "TOOL_CALL_RESULT",
            Self::StateSnapshot { .. } => "STATE_SNAPSHOT",
            Self::StateDelta { .. } => "STATE_DELTA",
            Self::MessagesSnapshot { .. } => "MESSAGES_SNAPSHOT",
            Self::Custom { .. } => "CUSTOM",
        }
    }

    fn base_mut(&mut self) -> &mut BaseEvent {
        match self {
            Self::RunStarted { base, .. }
            | Self::RunFinished { base, .. }
            | Self::RunError { base, .. }
            | Self::TextMessageStart { base, .. }
            | Self::TextMessageContent { base, .. }
            | Self::TextMessageEnd { base, .. }
            | Self::ThinkingStart { base, .. }
            | Self::ThinkingEnd { base, .. }
            | Self::ThinkingTextMessageStart { base, .. }
            | Self::ThinkingTextMessageContent { base, .. }
            | Self::ThinkingTextMessageEnd { base, .. }
            | Self::ToolCallStart { base, .. }
            | Self::ToolCallArgs { base, .. }
            | Self::ToolCallEnd { base, .. }
            | Self::ToolCallResult { base, .. }
            | Self::StateSnapshot { base, .. }
            | Self::StateDelta { base, .. }
            | Self::MessagesSnapshot { base, .. }
            | Self::Custom { base, .. } => base,
        }
    }

    /// Stamps the event with a delivery timestamp.
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.base_mut().timestamp = Some(timestamp);
        self
    }

    /// Attaches the internal event this one was translated from.
    pub fn with_raw_event(mut self, raw: Value) -> Self {
        self.base_mut().raw_event = Some(raw);
        self
    }

    /// Milliseconds since the epoch.
    pub fn now_millis() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn run_started_serializes_with_camel_case_ids() {
        let event = Event::run_started("thread_1", "run_1");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "RUN_STARTED");
        assert_eq!(value["threadId"], "thread_1");
        assert_eq!(value["runId"], "run_1");
        assert!(value.get("timestamp").is_none());
    }

    #[test]
    fn run_error_carries_code() {
        let event = Event::locked_error("s1");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "RUN_ERROR");
        assert_eq!(value["code"], codes::THREAD_IS_LOCKED);
        assert!(value["message"]
            .as_str()
            .unwrap()
            .contains("currently processing"));
    }

    #[test]
    fn text_message_start_defaults_to_assistant_role() {
        let event = Event::text_message_start("msg_1");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "TEXT_MESSAGE_START");
        assert_eq!(value["messageId"], "msg_1");
        assert_eq!(value["role"], "assistant");
    }

    #[test]
    fn tool_call_result_is_tool_role() {
        let event = Event::tool_call_result("msg_1", "call_1", r#"["Item 1"]"#);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "TOOL_CALL_RESULT");
        assert_eq!(value["toolCallId"], "call_1");
        assert_eq!(value["role"], "tool");
        assert_eq!(value["content"], r#"["Item 1"]"#);
    }

    #[test]
    fn state_delta_preserves_operations_verbatim() {
        let ops = vec![json!({"op": "replace", "path": "/count", "value": 3})];
        let event = Event::state_delta(ops.clone());
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "STATE_DELTA");
        assert_eq!(value["delta"], json!(ops));
    }

    #[test]
    fn thinking_content_carries_thinking_id() {
        let event = Event::thinking_text_content("think_1", "hmm");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "THINKING_TEXT_MESSAGE_CONTENT");
        assert_eq!(value["thinkingId"], "think_1");
        assert_eq!(value["delta"], "hmm");
    }

    #[test]
    fn with_timestamp_sets_base_field() {
        let event = Event::run_finished("t", "r", None).with_timestamp(1234567890);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["timestamp"], 1234567890u64);
    }

    #[test]
    fn with_raw_event_attaches_source() {
        let event = Event::custom("probe", json!(1)).with_raw_event(json!({"author": "a"}));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["rawEvent"]["author"], "a");
    }

    #[test]
    fn type_name_matches_wire_tag() {
        let events = vec![
            Event::run_started("t", "r"),
            Event::text_message_end("m"),
            Event::tool_call_args("c", "{"),
            Event::state_snapshot(json!({})),
            Event::custom("x", json!(null)),
        ];
        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["type"], event.type_name());
        }
    }

    #[test]
    fn round_trip_preserves_event() {
        let event = Event::tool_call_start("call_1", "get_items", Some("msg_1".to_string()))
            .with_timestamp(42);
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
