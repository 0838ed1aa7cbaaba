//! History reconstruction from persisted internal event logs.
//!
//! Replays a session's raw events through a deterministic translator and
//! folds the canonical output back into resolved messages, so clients
//! that reconnect see the same conversation a live subscriber saw.

use tracing::warn;
use weft_contract::{AgentEvent, Message, Role, ToolCallRecord};

use crate::events::Event;
use crate::translator::EventTranslator;

/// Replays an internal event log into an ordered message list.
///
/// User- and system-authored text maps directly to messages; everything
/// else goes through translation. Replaying the same log always yields
/// the same messages.
pub fn rebuild_messages(events: &[AgentEvent]) -> Vec<Message> {
    let mut translator = EventTranslator::with_deterministic_ids("hist");
    let mut fold = MessageFold::default();
    for ev in events {
        if let Some(message) = direct_message(ev) {
            fold.push_resolved(message);
            continue;
        }
        for canonical in translator.translate(ev) {
            fold.apply(&canonical);
        }
    }
    for canonical in translator.force_close() {
        fold.apply(&canonical);
    }
    fold.finish()
}

/// The full history as a `MESSAGES_SNAPSHOT` event.
pub fn messages_snapshot(events: &[AgentEvent]) -> Event {
    let messages = rebuild_messages(events)
        .iter()
        .filter_map(|message| match serde_json::to_value(message) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "failed to serialize history message");
                None
            }
        })
        .collect();
    Event::messages_snapshot(messages)
}

/// User and system text bypass translation entirely.
fn direct_message(ev: &AgentEvent) -> Option<Message> {
    let text = ev.text_content()?;
    if ev.is_user_authored() {
        Some(Message::user(text))
    } else if ev.is_system_authored() {
        Some(Message::system(text))
    } else {
        None
    }
}

/// Folds canonical events back into OpenAI-shaped messages.
#[derive(Default)]
struct MessageFold {
    messages: Vec<Message>,
    open: Option<Message>,
}

impl MessageFold {
    fn push_resolved(&mut self, message: Message) {
        self.seal();
        self.messages.push(message);
    }

    fn apply(&mut self, event: &Event) {
        match event {
            Event::TextMessageStart { message_id, .. } => {
                self.seal();
                self.open = Some(Message::assistant("").with_id(message_id.clone()));
            }
            Event::TextMessageContent { delta, .. } => {
                if let Some(open) = &mut self.open {
                    open.content.push_str(delta);
                }
            }
            // The message stays open so a parented tool call can attach.
            Event::TextMessageEnd { .. } => {}
            Event::ToolCallStart {
                tool_call_id,
                tool_call_name,
                parent_message_id,
                ..
            } => {
                let attachable = self
                    .open
                    .as_ref()
                    .is_some_and(|open| open.id == *parent_message_id && open.id.is_some());
                if !attachable {
                    self.seal();
                    self.open = Some(Message::assistant(""));
                }
                if let Some(open) = &mut self.open {
                    open.tool_calls
                        .get_or_insert_with(Vec::new)
                        .push(ToolCallRecord::function_call(tool_call_id, tool_call_name));
                }
            }
            Event::ToolCallArgs {
                tool_call_id,
                delta,
                ..
            } => {
                if let Some(record) = self.open_call_mut(tool_call_id) {
                    record.function.arguments.push_str(delta);
                }
            }
            Event::ToolCallEnd { .. } => {}
            Event::ToolCallResult {
                message_id,
                tool_call_id,
                content,
                ..
            } => {
                self.seal();
                self.messages
                    .push(Message::tool(content.clone(), tool_call_id.clone()).with_id(message_id.clone()));
            }
            // Lifecycle, state, and thinking events carry no message
            // content.
            _ => {}
        }
    }

    fn open_call_mut(&mut self, tool_call_id: &str) -> Option<&mut ToolCallRecord> {
        self.open
            .as_mut()
            .and_then(|open| open.tool_calls.as_mut())
            .and_then(|calls| calls.iter_mut().find(|record| record.id == tool_call_id))
    }

    fn seal(&mut self) {
        if let Some(message) = self.open.take() {
            let empty = message.content.is_empty()
                && message.tool_calls.as_ref().map_or(true, Vec::is_empty);
            if !empty {
                self.messages.push(message);
            }
        }
    }

    fn finish(mut self) -> Vec<Message> {
        self.seal();
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_log() -> Vec<AgentEvent> {
        vec![
            AgentEvent::user_text("What's in stock?"),
            AgentEvent::text_partial("inventory", "Let me"),
            AgentEvent::text("inventory", " check."),
            AgentEvent::function_call("inventory", "t1", "get_items", Some(json!({"max": 2}))),
            AgentEvent::function_response(
                "inventory",
                "t1",
                "get_items",
                json!(["Item 1", "Item 2"]),
            ),
            AgentEvent::text("inventory", "Two items available."),
        ]
    }

    #[test]
    fn rebuilds_user_assistant_tool_sequence() {
        let messages = rebuild_messages(&sample_log());
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );
        assert_eq!(messages[0].content, "What's in stock?");
        assert_eq!(messages[1].content, "Let me check.");
        let calls = messages[1].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].id, "t1");
        assert_eq!(calls[0].function.name, "get_items");
        assert_eq!(calls[0].function.arguments, r#"{"max":2}"#);
        assert_eq!(messages[2].tool_call_id.as_deref(), Some("t1"));
        assert_eq!(messages[2].content, r#"["Item 1","Item 2"]"#);
        assert_eq!(messages[3].content, "Two items available.");
    }

    #[test]
    fn replay_is_deterministic() {
        let log = sample_log();
        assert_eq!(rebuild_messages(&log), rebuild_messages(&log));
    }

    #[test]
    fn unclosed_stream_is_sealed_at_end() {
        let log = vec![AgentEvent::text_partial("agent", "dangling")];
        let messages = rebuild_messages(&log);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "dangling");
    }

    #[test]
    fn system_text_maps_directly() {
        let log = vec![AgentEvent::text(weft_contract::AUTHOR_SYSTEM, "be brief")];
        let messages = rebuild_messages(&log);
        assert_eq!(messages[0].role, Role::System);
    }

    #[test]
    fn state_only_events_produce_no_messages() {
        let log = vec![AgentEvent::state_snapshot("agent", json!({"x": 1}))];
        assert!(rebuild_messages(&log).is_empty());
    }

    #[test]
    fn snapshot_event_wraps_messages() {
        let event = messages_snapshot(&sample_log());
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "MESSAGES_SNAPSHOT");
        assert_eq!(value["messages"].as_array().unwrap().len(), 4);
        assert_eq!(value["messages"][0]["role"], "user");
    }
}
