//! Internal agent event model.
//!
//! Agents emit [`AgentEvent`]s while they run. The runtime persists them
//! verbatim and the protocol layer translates them into client-facing
//! events. The model is deliberately small: ordered content parts, two
//! delivery flags, and an optional state action.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Author string for events that originate from the end user.
pub const AUTHOR_USER: &str = "user";
/// Author string for events injected by the hosting system.
pub const AUTHOR_SYSTEM: &str = "system";

/// One content fragment inside an agent event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Part {
    /// Plain or thought-flagged text.
    Text {
        text: String,
        #[serde(default)]
        thought: bool,
    },
    /// A tool invocation requested by the agent.
    FunctionCall {
        id: String,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        args: Option<Value>,
    },
    /// The result of a completed tool invocation.
    FunctionResponse {
        id: String,
        name: String,
        response: Value,
    },
}

/// State change carried by an agent event.
///
/// The variants are structurally exclusive: an event carries at most one
/// of them, never a mix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateAction {
    /// Top-level key/value merge into session state.
    Delta(Map<String, Value>),
    /// Raw RFC 6902 operations, forwarded to clients untouched.
    Patch(Vec<Value>),
    /// Full replacement of session state.
    Snapshot(Value),
}

/// Payload for events the canonical protocol has no mapping for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomPayload {
    pub name: String,
    pub value: Value,
}

/// One event on an agent's internal stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    /// Producing entity: [`AUTHOR_USER`], [`AUTHOR_SYSTEM`], or an agent name.
    pub author: String,
    /// Ordered content fragments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<Part>,
    /// More fragments for the same logical unit will follow.
    pub partial: bool,
    /// The agent's turn is over; anything still open must be closed.
    pub turn_complete: bool,
    /// Optional state change applied to the session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<StateAction>,
    /// Payload for events outside the canonical mapping.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<CustomPayload>,
    /// Tool call ids whose results arrive out-of-band later.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub long_running_tool_ids: Vec<String>,
}

impl AgentEvent {
    fn with_author(author: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            ..Self::default()
        }
    }

    /// Final text delivery: closes the open message after this fragment.
    pub fn text(author: impl Into<String>, text: impl Into<String>) -> Self {
        let mut ev = Self::with_author(author);
        ev.parts.push(Part::Text {
            text: text.into(),
            thought: false,
        });
        ev
    }

    /// Streaming text fragment: the message stays open.
    pub fn text_partial(author: impl Into<String>, text: impl Into<String>) -> Self {
        let mut ev = Self::text(author, text);
        ev.partial = true;
        ev
    }

    /// Final thought text, carried on the thinking track.
    pub fn thought(author: impl Into<String>, text: impl Into<String>) -> Self {
        let mut ev = Self::with_author(author);
        ev.parts.push(Part::Text {
            text: text.into(),
            thought: true,
        });
        ev
    }

    /// Streaming thought fragment.
    pub fn thought_partial(author: impl Into<String>, text: impl Into<String>) -> Self {
        let mut ev = Self::thought(author, text);
        ev.partial = true;
        ev
    }

    /// A complete tool invocation request.
    pub fn function_call(
        author: impl Into<String>,
        id: impl Into<String>,
        name: impl Into<String>,
        args: Option<Value>,
    ) -> Self {
        let mut ev = Self::with_author(author);
        ev.parts.push(Part::FunctionCall {
            id: id.into(),
            name: name.into(),
            args,
        });
        ev
    }

    /// The result of a tool invocation.
    pub fn function_response(
        author: impl Into<String>,
        id: impl Into<String>,
        name: impl Into<String>,
        response: Value,
    ) -> Self {
        let mut ev = Self::with_author(author);
        ev.parts.push(Part::FunctionResponse {
            id: id.into(),
            name: name.into(),
            response,
        });
        ev
    }

    /// Key/value merge into session state.
    pub fn state_delta(author: impl Into<String>, delta: Map<String, Value>) -> Self {
        let mut ev = Self::with_author(author);
        ev.state = Some(StateAction::Delta(delta));
        ev
    }

    /// Raw JSON Patch operations.
    pub fn state_patch(author: impl Into<String>, ops: Vec<Value>) -> Self {
        let mut ev = Self::with_author(author);
        ev.state = Some(StateAction::Patch(ops));
        ev
    }

    /// Full state replacement.
    pub fn state_snapshot(author: impl Into<String>, snapshot: Value) -> Self {
        let mut ev = Self::with_author(author);
        ev.state = Some(StateAction::Snapshot(snapshot));
        ev
    }

    /// Event with no canonical mapping; forwarded as a custom event.
    pub fn custom(
        author: impl Into<String>,
        name: impl Into<String>,
        value: Value,
    ) -> Self {
        let mut ev = Self::with_author(author);
        ev.custom = Some(CustomPayload {
            name: name.into(),
            value,
        });
        ev
    }

    /// Marker event: the agent's turn is over.
    pub fn turn_complete(author: impl Into<String>) -> Self {
        let mut ev = Self::with_author(author);
        ev.turn_complete = true;
        ev
    }

    /// Text event authored by the end user, as recorded into session logs.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::text(AUTHOR_USER, text)
    }

    /// Marks the event as a streaming fragment.
    pub fn with_partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }

    /// Attaches a state action to an existing event.
    pub fn with_state(mut self, state: StateAction) -> Self {
        self.state = Some(state);
        self
    }

    /// Records ids of tool calls whose results will arrive out-of-band.
    pub fn with_long_running_tool_ids(mut self, ids: Vec<String>) -> Self {
        self.long_running_tool_ids = ids;
        self
    }

    pub fn is_user_authored(&self) -> bool {
        self.author == AUTHOR_USER
    }

    pub fn is_system_authored(&self) -> bool {
        self.author == AUTHOR_SYSTEM
    }

    /// Concatenation of the event's plain text parts, if any.
    pub fn text_content(&self) -> Option<String> {
        let joined: String = self
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text, thought: false } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    }

    /// True when the event carries no parts, state, or custom payload.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty() && self.state.is_none() && self.custom.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_content_joins_plain_parts_only() {
        let mut ev = AgentEvent::text("assistant", "Hello");
        ev.parts.push(Part::Text {
            text: " world".to_string(),
            thought: false,
        });
        ev.parts.push(Part::Text {
            text: "hidden".to_string(),
            thought: true,
        });
        assert_eq!(ev.text_content().as_deref(), Some("Hello world"));
    }

    #[test]
    fn empty_event_detection() {
        assert!(AgentEvent::turn_complete("agent").is_empty());
        assert!(!AgentEvent::text("agent", "hi").is_empty());
        assert!(!AgentEvent::custom("agent", "ping", json!({})).is_empty());
    }

    #[test]
    fn serde_round_trip_preserves_parts() {
        let ev = AgentEvent::function_call("agent", "t1", "get_items", Some(json!({"n": 2})))
            .with_long_running_tool_ids(vec!["t1".to_string()]);
        let value = serde_json::to_value(&ev).unwrap();
        assert_eq!(value["parts"][0]["kind"], "function_call");
        assert_eq!(value["parts"][0]["name"], "get_items");
        let back: AgentEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, ev);
    }

    #[test]
    fn state_actions_serialize_distinctly() {
        let mut delta = Map::new();
        delta.insert("step".to_string(), json!(1));
        let ev = AgentEvent::state_delta("agent", delta);
        let value = serde_json::to_value(&ev).unwrap();
        assert_eq!(value["state"]["delta"]["step"], 1);

        let ev = AgentEvent::state_patch(
            "agent",
            vec![json!({"op": "add", "path": "/x", "value": 5})],
        );
        let value = serde_json::to_value(&ev).unwrap();
        assert_eq!(value["state"]["patch"][0]["op"], "add");
    }
}
