//! Conversation messages and parsed run input.
//!
//! [`Message`] follows the OpenAI-compatible chat shape used on the wire,
//! so the same type serves request parsing and history snapshots.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message role, lowercase on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Developer,
    User,
    Assistant,
    Tool,
}

/// A tool call attached to an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCallRecord,
}

impl ToolCallRecord {
    pub fn function_call(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            call_type: "function".to_string(),
            function: FunctionCallRecord {
                name: name.into(),
                arguments: String::new(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallRecord {
    pub name: String,
    /// JSON-serialized argument object, accumulated from fragments.
    pub arguments: String,
}

/// One resolved conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(
        rename = "toolCalls",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub tool_calls: Option<Vec<ToolCallRecord>>,
    /// Set on tool-role messages: the call this message answers.
    #[serde(
        rename = "toolCallId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: None,
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn tool(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::Tool, content);
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Parsed run input handed to the runtime by the transport layer.
#[derive(Debug, Clone)]
pub struct RunInput {
    /// Conversation identifier chosen by the client.
    pub thread_id: String,
    /// Identifier for this run, generated when the client omits one.
    pub run_id: String,
    /// Conversation so far, newest message last.
    pub messages: Vec<Message>,
    /// Client-proposed initial state, if any.
    pub state: Option<Value>,
    /// Opaque client metadata forwarded alongside the run.
    pub forwarded_props: Option<Value>,
}

impl RunInput {
    /// The newest user-authored message, which seeds the run.
    pub fn latest_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_serializes_with_camel_case_fields() {
        let msg = Message::tool("done", "call_1").with_id("m1");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "tool");
        assert_eq!(value["toolCallId"], "call_1");
        assert!(value.get("toolCalls").is_none());
    }

    #[test]
    fn latest_user_message_skips_trailing_assistant() {
        let input = RunInput {
            thread_id: "t1".to_string(),
            run_id: "r1".to_string(),
            messages: vec![
                Message::user("first"),
                Message::assistant("reply"),
                Message::user("second"),
                Message::assistant("another"),
            ],
            state: None,
            forwarded_props: None,
        };
        assert_eq!(input.latest_user_message().map(|m| m.content.as_str()), Some("second"));
    }
}
