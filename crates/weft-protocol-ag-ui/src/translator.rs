//! Translation from internal agent events to canonical AG-UI events.
//!
//! One [`EventTranslator`] instance serves one run. It owns the pairing
//! state: which text message, tool call, and thinking stream are open.
//! Every `*_START` it emits is matched by exactly one `*_END`, even when
//! the agent stops without closing anything itself; callers drain
//! [`EventTranslator::force_close`] before any terminal event.

use std::collections::HashSet;

use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use weft_contract::{generate_id, AgentEvent, Part, StateAction};

use crate::events::Event;

/// Content substituted for tool output that cannot be serialized.
const UNSERIALIZABLE_RESULT: &str = r#"{"error":"failed to serialize tool result"}"#;

enum IdGen {
    /// Fresh UUIDs; used for live runs.
    Random,
    /// Counter-based ids; used where replays must be reproducible.
    Sequential { prefix: String, next: u64 },
}

impl IdGen {
    fn next_id(&mut self) -> String {
        match self {
            Self::Random => generate_id(),
            Self::Sequential { prefix, next } => {
                let id = format!("{prefix}_{next}");
                *next += 1;
                id
            }
        }
    }
}

/// Stateful internal-to-canonical event translator.
pub struct EventTranslator {
    /// Id of the open assistant text message, if any.
    open_message: Option<String>,
    /// Id of the open tool call, if any.
    open_tool_call: Option<String>,
    /// Id of the open thinking stream, if any.
    open_thinking: Option<String>,
    /// Most recently closed or open message id; parents tool calls.
    last_message_id: Option<String>,
    /// Tool calls whose results arrive out-of-band and must not be
    /// forwarded as results here.
    long_running: HashSet<String>,
    ids: IdGen,
    attach_raw: bool,
}

impl EventTranslator {
    pub fn new() -> Self {
        Self {
            open_message: None,
            open_tool_call: None,
            open_thinking: None,
            last_message_id: None,
            long_running: HashSet::new(),
            ids: IdGen::Random,
            attach_raw: false,
        }
    }

    /// Counter-based ids so that replaying the same event log produces
    /// byte-identical output.
    pub fn with_deterministic_ids(prefix: impl Into<String>) -> Self {
        let mut translator = Self::new();
        translator.ids = IdGen::Sequential {
            prefix: prefix.into(),
            next: 0,
        };
        translator
    }

    /// Attach the serialized internal event to every canonical event it
    /// produces.
    pub fn with_raw_events(mut self, attach: bool) -> Self {
        self.attach_raw = attach;
        self
    }

    /// Translates one internal event. Never fails; events with no
    /// canonical mapping come back as `CUSTOM`.
    pub fn translate(&mut self, ev: &AgentEvent) -> Vec<Event> {
        if ev.is_user_authored() {
            debug!(author = %ev.author, "skipping user-authored event");
            return Vec::new();
        }

        let mut out = Vec::new();

        for part in &ev.parts {
            match part {
                Part::Text { text, thought: false } => {
                    self.translate_text(text, ev.partial, &mut out);
                }
                Part::Text { text, thought: true } => {
                    self.translate_thought(text, ev.partial, &mut out);
                }
                Part::FunctionCall { id, name, args } => {
                    self.translate_function_call(
                        id,
                        name,
                        args.as_ref(),
                        ev,
                        &mut out,
                    );
                }
                Part::FunctionResponse { id, response, .. } => {
                    self.translate_function_response(id, response, &mut out);
                }
            }
        }

        if let Some(state) = &ev.state {
            self.translate_state(state, &mut out);
        }

        if let Some(payload) = &ev.custom {
            out.push(Event::custom(payload.name.clone(), payload.value.clone()));
        }

        if ev.turn_complete {
            out.extend(self.force_close());
        }

        if out.is_empty() && ev.is_empty() && !ev.turn_complete {
            // No mapping and nothing open; surface the event instead of
            // dropping it.
            let value = serde_json::to_value(ev).unwrap_or(Value::Null);
            out.push(Event::custom("untranslated_event", value));
        }

        if self.attach_raw {
            if let Ok(raw) = serde_json::to_value(ev) {
                out = out
                    .into_iter()
                    .map(|event| event.with_raw_event(raw.clone()))
                    .collect();
            }
        }

        out
    }

    /// Closes every open stream, innermost first. Idempotent.
    pub fn force_close(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        self.close_thinking(&mut out);
        self.close_tool_call(&mut out);
        self.close_message(&mut out);
        out
    }

    fn translate_text(&mut self, text: &str, partial: bool, out: &mut Vec<Event>) {
        self.close_thinking(out);
        let message_id = match &self.open_message {
            Some(id) => id.clone(),
            None => {
                let id = self.ids.next_id();
                out.push(Event::text_message_start(id.clone()));
                self.open_message = Some(id.clone());
                self.last_message_id = Some(id.clone());
                id
            }
        };
        if !text.is_empty() {
            out.push(Event::text_message_content(message_id, text));
        }
        if !partial {
            self.close_message(out);
        }
    }

    fn translate_thought(&mut self, text: &str, partial: bool, out: &mut Vec<Event>) {
        let thinking_id = match &self.open_thinking {
            Some(id) => id.clone(),
            None => {
                let id = self.ids.next_id();
                out.push(Event::thinking_start(None));
                out.push(Event::thinking_text_start(id.clone()));
                self.open_thinking = Some(id.clone());
                id
            }
        };
        if !text.is_empty() {
            out.push(Event::thinking_text_content(thinking_id, text));
        }
        if !partial {
            self.close_thinking(out);
        }
    }

    fn translate_function_call(
        &mut self,
        id: &str,
        name: &str,
        args: Option<&Value>,
        ev: &AgentEvent,
        out: &mut Vec<Event>,
    ) {
        self.close_thinking(out);
        self.close_message(out);

        let already_open = self.open_tool_call.as_deref() == Some(id);
        if !already_open {
            // A differently-named call still open means the agent never
            // closed it; do so before starting the next one.
            self.close_tool_call(out);
            out.push(Event::tool_call_start(
                id,
                name,
                self.last_message_id.clone(),
            ));
            self.open_tool_call = Some(id.to_string());
            if ev.long_running_tool_ids.iter().any(|lr| lr == id) {
                self.long_running.insert(id.to_string());
            }
        }

        if let Some(fragment) = args.and_then(args_fragment) {
            out.push(Event::tool_call_args(id, fragment));
        }

        if !ev.partial {
            self.close_tool_call(out);
        }
    }

    fn translate_function_response(&mut self, id: &str, response: &Value, out: &mut Vec<Event>) {
        if self.open_tool_call.as_deref() == Some(id) {
            self.close_tool_call(out);
        }
        if self.long_running.contains(id) {
            debug!(tool_call_id = %id, "suppressing result for long-running tool");
            return;
        }
        let content = match serde_json::to_string(response) {
            Ok(content) => content,
            Err(e) => {
                warn!(tool_call_id = %id, error = %e, "failed to serialize tool result");
                UNSERIALIZABLE_RESULT.to_string()
            }
        };
        out.push(Event::tool_call_result(self.ids.next_id(), id, content));
    }

    fn translate_state(&mut self, state: &StateAction, out: &mut Vec<Event>) {
        match state {
            StateAction::Delta(map) => {
                if !map.is_empty() {
                    out.push(Event::state_delta(delta_to_patch_ops(map)));
                }
            }
            StateAction::Patch(ops) => {
                if !ops.is_empty() {
                    out.push(Event::state_delta(ops.clone()));
                }
            }
            StateAction::Snapshot(snapshot) => {
                out.push(Event::state_snapshot(snapshot.clone()));
            }
        }
    }

    fn close_message(&mut self, out: &mut Vec<Event>) {
        if let Some(id) = self.open_message.take() {
            out.push(Event::text_message_end(id.clone()));
            self.last_message_id = Some(id);
        }
    }

    fn close_tool_call(&mut self, out: &mut Vec<Event>) {
        if let Some(id) = self.open_tool_call.take() {
            out.push(Event::tool_call_end(id));
        }
    }

    fn close_thinking(&mut self, out: &mut Vec<Event>) {
        if let Some(id) = self.open_thinking.take() {
            out.push(Event::thinking_text_end(id));
            out.push(Event::thinking_end());
        }
    }
}

impl Default for EventTranslator {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializes tool call arguments into one `TOOL_CALL_ARGS` fragment.
/// String arguments pass through raw so streamed fragments concatenate
/// into valid JSON; empty arguments produce no fragment at all.
fn args_fragment(args: &Value) -> Option<String> {
    match args {
        Value::Null => None,
        Value::Object(map) if map.is_empty() => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => match serde_json::to_string(other) {
            Ok(fragment) => Some(fragment),
            Err(e) => {
                warn!(error = %e, "failed to serialize tool call arguments");
                Some("{}".to_string())
            }
        },
    }
}

/// Key/value merge expressed as RFC 6902 `add` operations.
fn delta_to_patch_ops(map: &Map<String, Value>) -> Vec<Value> {
    map.iter()
        .map(|(key, value)| {
            json!({
                "op": "add",
                "path": format!("/{}", pointer_escape(key)),
                "value": value,
            })
        })
        .collect()
}

/// JSON Pointer token escaping per RFC 6901.
fn pointer_escape(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn types(events: &[Event]) -> Vec<&'static str> {
        events.iter().map(|e| e.type_name()).collect()
    }

    fn translate_all(translator: &mut EventTranslator, events: &[AgentEvent]) -> Vec<Event> {
        let mut out = Vec::new();
        for ev in events {
            out.extend(translator.translate(ev));
        }
        out
    }

    #[test]
    fn streamed_text_emits_start_content_end_with_one_id() {
        let mut translator = EventTranslator::new();
        let out = translate_all(
            &mut translator,
            &[
                AgentEvent::text_partial("agent", "Hi"),
                AgentEvent::text_partial("agent", "Hi there"),
                AgentEvent::text("agent", "Hi there!"),
            ],
        );
        assert_eq!(
            types(&out),
            vec![
                "TEXT_MESSAGE_START",
                "TEXT_MESSAGE_CONTENT",
                "TEXT_MESSAGE_CONTENT",
                "TEXT_MESSAGE_CONTENT",
                "TEXT_MESSAGE_END",
            ]
        );
        let ids: HashSet<String> = out
            .iter()
            .map(|e| serde_json::to_value(e).unwrap()["messageId"]
                .as_str()
                .unwrap()
                .to_string())
            .collect();
        assert_eq!(ids.len(), 1);
        let deltas: Vec<String> = out
            .iter()
            .filter_map(|e| match e {
                Event::TextMessageContent { delta, .. } => Some(delta.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(deltas, vec!["Hi", "Hi there", "Hi there!"]);
    }

    #[test]
    fn final_text_with_no_open_message_emits_full_triple() {
        let mut translator = EventTranslator::new();
        let out = translator.translate(&AgentEvent::text("agent", "done"));
        assert_eq!(
            types(&out),
            vec![
                "TEXT_MESSAGE_START",
                "TEXT_MESSAGE_CONTENT",
                "TEXT_MESSAGE_END"
            ]
        );
    }

    #[test]
    fn argless_tool_call_emits_no_args_event() {
        let mut translator = EventTranslator::new();
        let out = translate_all(
            &mut translator,
            &[
                AgentEvent::function_call("agent", "t1", "get_items", None),
                AgentEvent::function_response(
                    "agent",
                    "t1",
                    "get_items",
                    json!(["Item 1", "Item 2"]),
                ),
            ],
        );
        assert_eq!(
            types(&out),
            vec!["TOOL_CALL_START", "TOOL_CALL_END", "TOOL_CALL_RESULT"]
        );
        match &out[2] {
            Event::ToolCallResult {
                tool_call_id,
                content,
                ..
            } => {
                assert_eq!(tool_call_id, "t1");
                assert_eq!(content, r#"["Item 1","Item 2"]"#);
            }
            other => panic!("expected tool call result, got {}", other.type_name()),
        }
    }

    #[test]
    fn complete_call_args_serialize_as_one_fragment() {
        let mut translator = EventTranslator::new();
        let out = translator.translate(&AgentEvent::function_call(
            "agent",
            "t1",
            "lookup",
            Some(json!({"city": "Tokyo"})),
        ));
        assert_eq!(
            types(&out),
            vec!["TOOL_CALL_START", "TOOL_CALL_ARGS", "TOOL_CALL_END"]
        );
        match &out[1] {
            Event::ToolCallArgs { delta, .. } => assert_eq!(delta, r#"{"city":"Tokyo"}"#),
            other => panic!("expected args, got {}", other.type_name()),
        }
    }

    #[test]
    fn streamed_args_accumulate_until_final_event() {
        let mut translator = EventTranslator::new();
        let out = translate_all(
            &mut translator,
            &[
                AgentEvent::function_call("agent", "t1", "lookup", Some(json!(r#"{"ci"#)))
                    .with_partial(true),
                AgentEvent::function_call("agent", "t1", "lookup", Some(json!(r#"ty":"Oslo"}"#))),
            ],
        );
        assert_eq!(
            types(&out),
            vec![
                "TOOL_CALL_START",
                "TOOL_CALL_ARGS",
                "TOOL_CALL_ARGS",
                "TOOL_CALL_END"
            ]
        );
        let joined: String = out
            .iter()
            .filter_map(|e| match e {
                Event::ToolCallArgs { delta, .. } => Some(delta.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(joined, r#"{"city":"Oslo"}"#);
    }

    #[test]
    fn tool_call_closes_open_text_message_first() {
        let mut translator = EventTranslator::new();
        let out = translate_all(
            &mut translator,
            &[
                AgentEvent::text_partial("agent", "checking"),
                AgentEvent::function_call("agent", "t1", "check", None),
            ],
        );
        assert_eq!(
            types(&out),
            vec![
                "TEXT_MESSAGE_START",
                "TEXT_MESSAGE_CONTENT",
                "TEXT_MESSAGE_END",
                "TOOL_CALL_START",
                "TOOL_CALL_END"
            ]
        );
        // The closed message parents the call.
        let start = serde_json::to_value(&out[0]).unwrap();
        let call = serde_json::to_value(&out[3]).unwrap();
        assert_eq!(call["parentMessageId"], start["messageId"]);
    }

    #[test]
    fn raw_patch_operations_pass_through_verbatim() {
        let ops = vec![
            json!({"op": "replace", "path": "/status", "value": "ready"}),
            json!({"op": "remove", "path": "/draft"}),
        ];
        let mut translator = EventTranslator::new();
        let out = translator.translate(&AgentEvent::state_patch("agent", ops.clone()));
        assert_eq!(types(&out), vec!["STATE_DELTA"]);
        match &out[0] {
            Event::StateDelta { delta, .. } => assert_eq!(delta, &ops),
            other => panic!("expected state delta, got {}", other.type_name()),
        }
    }

    #[test]
    fn kv_delta_becomes_add_operations() {
        let mut map = Map::new();
        map.insert("count".to_string(), json!(3));
        map.insert("a/b~c".to_string(), json!("x"));
        let mut translator = EventTranslator::new();
        let out = translator.translate(&AgentEvent::state_delta("agent", map));
        let value = serde_json::to_value(&out[0]).unwrap();
        let ops = value["delta"].as_array().unwrap();
        assert!(ops.iter().all(|op| op["op"] == "add"));
        assert!(ops.iter().any(|op| op["path"] == "/count" && op["value"] == 3));
        assert!(ops.iter().any(|op| op["path"] == "/a~1b~0c"));
    }

    #[test]
    fn snapshot_emits_state_snapshot() {
        let mut translator = EventTranslator::new();
        let out =
            translator.translate(&AgentEvent::state_snapshot("agent", json!({"done": true})));
        assert_eq!(types(&out), vec!["STATE_SNAPSHOT"]);
    }

    #[test]
    fn turn_completion_closes_open_message() {
        let mut translator = EventTranslator::new();
        let out = translate_all(
            &mut translator,
            &[
                AgentEvent::text_partial("agent", "half a thou"),
                AgentEvent::turn_complete("agent"),
            ],
        );
        assert_eq!(
            types(&out),
            vec![
                "TEXT_MESSAGE_START",
                "TEXT_MESSAGE_CONTENT",
                "TEXT_MESSAGE_END"
            ]
        );
    }

    #[test]
    fn force_close_is_idempotent() {
        let mut translator = EventTranslator::new();
        translator.translate(&AgentEvent::text_partial("agent", "x"));
        assert_eq!(types(&translator.force_close()), vec!["TEXT_MESSAGE_END"]);
        assert!(translator.force_close().is_empty());
    }

    #[test]
    fn user_authored_events_are_skipped() {
        let mut translator = EventTranslator::new();
        assert!(translator.translate(&AgentEvent::user_text("hello")).is_empty());
    }

    #[test]
    fn unmapped_event_degrades_to_custom() {
        let mut translator = EventTranslator::new();
        let ev = AgentEvent {
            author: "agent".to_string(),
            ..AgentEvent::default()
        };
        let out = translator.translate(&ev);
        assert_eq!(types(&out), vec!["CUSTOM"]);
        match &out[0] {
            Event::Custom { name, .. } => assert_eq!(name, "untranslated_event"),
            other => panic!("expected custom, got {}", other.type_name()),
        }
    }

    #[test]
    fn custom_payload_forwards_name_and_value() {
        let mut translator = EventTranslator::new();
        let ev = AgentEvent::custom("agent", "progress", json!({"pct": 40}));
        let out = translator.translate(&ev);
        match &out[0] {
            Event::Custom { name, value, .. } => {
                assert_eq!(name, "progress");
                assert_eq!(value["pct"], 40);
            }
            other => panic!("expected custom, got {}", other.type_name()),
        }
    }

    #[test]
    fn long_running_tool_result_is_suppressed() {
        let mut translator = EventTranslator::new();
        let out = translate_all(
            &mut translator,
            &[
                AgentEvent::function_call("agent", "lr1", "approve", None)
                    .with_long_running_tool_ids(vec!["lr1".to_string()]),
                AgentEvent::function_response("agent", "lr1", "approve", json!({"ok": true})),
                AgentEvent::function_response("agent", "t2", "other", json!(1)),
            ],
        );
        assert_eq!(
            types(&out),
            vec!["TOOL_CALL_START", "TOOL_CALL_END", "TOOL_CALL_RESULT"]
        );
        match &out[2] {
            Event::ToolCallResult { tool_call_id, .. } => assert_eq!(tool_call_id, "t2"),
            other => panic!("expected result for t2, got {}", other.type_name()),
        }
    }

    #[test]
    fn thought_text_streams_on_thinking_track() {
        let mut translator = EventTranslator::new();
        let out = translate_all(
            &mut translator,
            &[
                AgentEvent::thought_partial("agent", "weighing options"),
                AgentEvent::thought("agent", " and deciding"),
            ],
        );
        assert_eq!(
            types(&out),
            vec![
                "THINKING_START",
                "THINKING_TEXT_MESSAGE_START",
                "THINKING_TEXT_MESSAGE_CONTENT",
                "THINKING_TEXT_MESSAGE_CONTENT",
                "THINKING_TEXT_MESSAGE_END",
                "THINKING_END",
            ]
        );
    }

    #[test]
    fn plain_text_closes_open_thinking_stream() {
        let mut translator = EventTranslator::new();
        let out = translate_all(
            &mut translator,
            &[
                AgentEvent::thought_partial("agent", "hmm"),
                AgentEvent::text("agent", "answer"),
            ],
        );
        assert_eq!(
            types(&out),
            vec![
                "THINKING_START",
                "THINKING_TEXT_MESSAGE_START",
                "THINKING_TEXT_MESSAGE_CONTENT",
                "THINKING_TEXT_MESSAGE_END",
                "THINKING_END",
                "TEXT_MESSAGE_START",
                "TEXT_MESSAGE_CONTENT",
                "TEXT_MESSAGE_END",
            ]
        );
    }

    #[test]
    fn new_message_after_close_gets_fresh_id() {
        let mut translator = EventTranslator::new();
        let first = translator.translate(&AgentEvent::text("agent", "one"));
        let second = translator.translate(&AgentEvent::text("agent", "two"));
        let id_of = |e: &Event| serde_json::to_value(e).unwrap()["messageId"]
            .as_str()
            .unwrap()
            .to_string();
        assert_ne!(id_of(&first[0]), id_of(&second[0]));
    }

    #[test]
    fn raw_event_attachment_carries_source() {
        let mut translator = EventTranslator::new().with_raw_events(true);
        let out = translator.translate(&AgentEvent::text("agent", "hi"));
        for event in &out {
            let value = serde_json::to_value(event).unwrap();
            assert_eq!(value["rawEvent"]["author"], "agent");
        }
    }

    #[test]
    fn deterministic_ids_are_reproducible() {
        let events = vec![
            AgentEvent::text("agent", "one"),
            AgentEvent::function_call("agent", "t1", "f", None),
            AgentEvent::function_response("agent", "t1", "f", json!(0)),
        ];
        let mut a = EventTranslator::with_deterministic_ids("replay");
        let mut b = EventTranslator::with_deterministic_ids("replay");
        assert_eq!(
            translate_all(&mut a, &events),
            translate_all(&mut b, &events)
        );
    }
}
