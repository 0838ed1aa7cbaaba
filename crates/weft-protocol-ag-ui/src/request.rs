//! AG-UI run request parsing and validation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use weft_contract::{generate_id, Message, Role, RunInput};

use crate::events::codes;

/// Error raised while validating a run request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestError {
    pub code: String,
    pub message: String,
}

impl RequestError {
    pub fn invalid_field(field: &str, reason: &str) -> Self {
        Self {
            code: "INVALID_FIELD".to_string(),
            message: format!("invalid field '{field}': {reason}"),
        }
    }

    pub fn no_input_message() -> Self {
        Self {
            code: codes::NO_INPUT_MESSAGE.to_string(),
            message: "request contains no user message to run on".to_string(),
        }
    }
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for RequestError {}

/// An AG-UI run request as received over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunAgentInput {
    #[serde(rename = "threadId")]
    pub thread_id: String,
    /// Generated when the client omits it.
    #[serde(rename = "runId", default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
    #[serde(
        rename = "forwardedProps",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub forwarded_props: Option<Value>,
}

impl RunAgentInput {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            run_id: None,
            messages: Vec::new(),
            state: None,
            forwarded_props: None,
        }
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_state(mut self, state: Value) -> Self {
        self.state = Some(state);
        self
    }

    /// Rejects requests the pipeline cannot run.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.thread_id.trim().is_empty() {
            return Err(RequestError::invalid_field("threadId", "must not be empty"));
        }
        if let Some(run_id) = &self.run_id {
            if run_id.trim().is_empty() {
                return Err(RequestError::invalid_field("runId", "must not be empty"));
            }
        }
        if !self.messages.iter().any(|m| m.role == Role::User) {
            return Err(RequestError::no_input_message());
        }
        Ok(())
    }

    /// Converts into runtime input, generating a run id when absent.
    pub fn into_run_input(self) -> RunInput {
        RunInput {
            thread_id: self.thread_id,
            run_id: self.run_id.unwrap_or_else(generate_id),
            messages: self.messages,
            state: self.state,
            forwarded_props: self.forwarded_props,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_wire_shape() {
        let input: RunAgentInput = serde_json::from_value(json!({
            "threadId": "thread_1",
            "messages": [
                {"role": "user", "content": "hello", "id": "m1"}
            ],
            "state": {"count": 0},
            "forwardedProps": {"locale": "en"}
        }))
        .unwrap();
        assert_eq!(input.thread_id, "thread_1");
        assert_eq!(input.messages.len(), 1);
        assert_eq!(input.messages[0].content, "hello");
        assert_eq!(input.state, Some(json!({"count": 0})));
    }

    #[test]
    fn validate_rejects_empty_thread_id() {
        let input = RunAgentInput::new("  ").with_message(Message::user("hi"));
        let err = input.validate().unwrap_err();
        assert_eq!(err.code, "INVALID_FIELD");
        assert!(err.to_string().starts_with("[INVALID_FIELD]"));
    }

    #[test]
    fn validate_requires_a_user_message() {
        let input = RunAgentInput::new("t1").with_message(Message::assistant("just me"));
        let err = input.validate().unwrap_err();
        assert_eq!(err.code, codes::NO_INPUT_MESSAGE);
    }

    #[test]
    fn into_run_input_generates_missing_run_id() {
        let input = RunAgentInput::new("t1")
            .with_message(Message::user("hi"))
            .into_run_input();
        assert!(!input.run_id.is_empty());
        assert_eq!(input.thread_id, "t1");
    }

    #[test]
    fn into_run_input_keeps_explicit_run_id() {
        let mut request = RunAgentInput::new("t1").with_message(Message::user("hi"));
        request.run_id = Some("run_9".to_string());
        assert_eq!(request.into_run_input().run_id, "run_9");
    }
}
