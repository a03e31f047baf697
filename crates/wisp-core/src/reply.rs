//! Reply extraction from loosely-structured agent responses
//!
//! Agent invocations return values of no fixed schema: a bare string, a list
//! of content parts, a conversation state with a `messages` transcript, or a
//! mapping keyed by well-known field names. [`AgentResponse`] names each
//! recognized shape as an explicit variant, and [`AgentResponse::resolve`] is
//! a total match over the union that yields the reply text or "no value".

use serde_json::Value;

/// Fixed reply substituted at the boundary when extraction yields no text.
pub const FALLBACK_REPLY: &str = "Sorry — I couldn't generate a reply right now.";

/// One recognized shape of an agent invocation result.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentResponse {
    /// A bare text reply.
    Text(String),
    /// A sequence of content parts, e.g. `[{"type": "text", "text": "..."}]`.
    Parts(Vec<ReplyPart>),
    /// A conversation state carrying the message transcript.
    State(ConversationState),
    /// A mapping keyed by well-known reply fields.
    Fields(ReplyFields),
    /// A single message object whose content is a string.
    Message(AssistantMessage),
}

/// One element of a content-part sequence. Only string-valued fields are kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplyPart {
    pub text: Option<String>,
    pub content: Option<String>,
}

/// A transcript-shaped response: `messages` plus any top-level reply fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    pub messages: Vec<TranscriptEntry>,
    pub text: Option<String>,
    pub content: Option<String>,
}

/// One entry of a transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEntry {
    /// A typed message object exposing its content directly.
    Message(AssistantMessage),
    /// A loose mapping probed by key.
    Fields(TranscriptFields),
}

/// String-valued fields of a loose transcript entry, probed in declaration
/// order: `content`, then `text`, then `message`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscriptFields {
    pub content: Option<String>,
    pub text: Option<String>,
    pub message: Option<String>,
}

/// A message object with a guaranteed string content.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantMessage {
    pub content: String,
}

impl AgentResponse {
    /// Classify a loose JSON value into a recognized shape.
    ///
    /// Returns `None` for values with no recognized interpretation (numbers,
    /// booleans, null, mappings without any known key).
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Array(items) => Some(Self::Parts(
                items.iter().map(ReplyPart::from_value).collect(),
            )),
            Value::Object(map) => {
                if let Some(messages) = map.get("messages").and_then(Value::as_array) {
                    return Some(Self::State(ConversationState {
                        messages: messages
                            .iter()
                            .map(|m| TranscriptEntry::Fields(TranscriptFields::from_value(m)))
                            .collect(),
                        text: string_field(value, "text"),
                        content: string_field(value, "content"),
                    }));
                }
                let fields = ReplyFields {
                    text: string_field(value, "text"),
                    content: string_field(value, "content"),
                };
                if fields.text.is_some() || fields.content.is_some() {
                    Some(Self::Fields(fields))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Resolve the reply text. Total over the union; `None` means "no value".
    ///
    /// Precedence, first match wins:
    /// 1. `Text` is returned unchanged.
    /// 2. `Parts`: the first part's `text`, else its `content`.
    /// 3. `State`: the last transcript entry (content attribute for typed
    ///    messages; `content`/`text`/`message` keys for loose ones), falling
    ///    through to the state's own `text` then `content` fields.
    /// 4. `Fields`: `text`, then `content`.
    /// 5. `Message`: its content string.
    pub fn resolve(&self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s.clone()),
            Self::Parts(parts) => {
                let first = parts.first()?;
                first.text.clone().or_else(|| first.content.clone())
            }
            Self::State(state) => state
                .messages
                .last()
                .and_then(TranscriptEntry::reply_text)
                .or_else(|| state.text.clone())
                .or_else(|| state.content.clone()),
            Self::Fields(fields) => fields.text.clone().or_else(|| fields.content.clone()),
            Self::Message(message) => Some(message.content.clone()),
        }
    }
}

/// A mapping keyed by well-known reply fields, probed `text` then `content`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplyFields {
    pub text: Option<String>,
    pub content: Option<String>,
}

impl ReplyPart {
    fn from_value(value: &Value) -> Self {
        Self {
            text: string_field(value, "text"),
            content: string_field(value, "content"),
        }
    }
}

impl TranscriptFields {
    fn from_value(value: &Value) -> Self {
        Self {
            content: string_field(value, "content"),
            text: string_field(value, "text"),
            message: string_field(value, "message"),
        }
    }
}

impl TranscriptEntry {
    fn reply_text(&self) -> Option<String> {
        match self {
            Self::Message(m) => Some(m.content.clone()),
            Self::Fields(f) => f
                .content
                .clone()
                .or_else(|| f.text.clone())
                .or_else(|| f.message.clone()),
        }
    }
}

/// Extract a plain-text reply from a loose agent response value.
///
/// Pure and non-panicking; every unrecognized shape is `None`.
pub fn extract_text(value: &Value) -> Option<String> {
    AgentResponse::from_value(value).and_then(|response| response.resolve())
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_string_returned_unchanged() {
        assert_eq!(extract_text(&json!("hello there")), Some("hello there".to_string()));
        assert_eq!(extract_text(&json!("")), Some(String::new()));
    }

    #[test]
    fn test_parts_first_text_wins() {
        let value = json!([{"type": "text", "text": "first", "content": "ignored"}, {"text": "second"}]);
        assert_eq!(extract_text(&value), Some("first".to_string()));
    }

    #[test]
    fn test_parts_content_when_no_text() {
        let value = json!([{"content": "from content"}]);
        assert_eq!(extract_text(&value), Some("from content".to_string()));
    }

    #[test]
    fn test_parts_non_string_text_ignored() {
        let value = json!([{"text": 42, "content": "fallback"}]);
        assert_eq!(extract_text(&value), Some("fallback".to_string()));
    }

    #[test]
    fn test_empty_sequence_is_no_value() {
        assert_eq!(extract_text(&json!([])), None);
    }

    #[test]
    fn test_sequence_of_non_mappings_is_no_value() {
        assert_eq!(extract_text(&json!([1, 2, 3])), None);
    }

    #[test]
    fn test_messages_takes_last_entry() {
        let value = json!({
            "messages": [
                {"content": "earlier, ignored"},
                {"content": "the reply"},
            ]
        });
        assert_eq!(extract_text(&value), Some("the reply".to_string()));
    }

    #[test]
    fn test_messages_entry_key_precedence() {
        // content beats text beats message within the last entry
        let value = json!({"messages": [{"message": "third", "text": "second", "content": "first"}]});
        assert_eq!(extract_text(&value), Some("first".to_string()));

        let value = json!({"messages": [{"message": "third", "text": "second"}]});
        assert_eq!(extract_text(&value), Some("second".to_string()));

        let value = json!({"messages": [{"message": "third"}]});
        assert_eq!(extract_text(&value), Some("third".to_string()));
    }

    #[test]
    fn test_messages_unproductive_last_falls_through_to_text() {
        let value = json!({"messages": [{"role": "assistant"}], "text": "top-level"});
        assert_eq!(extract_text(&value), Some("top-level".to_string()));
    }

    #[test]
    fn test_empty_messages_falls_through() {
        let value = json!({"messages": [], "content": "still here"});
        assert_eq!(extract_text(&value), Some("still here".to_string()));
    }

    #[test]
    fn test_mapping_text_beats_content() {
        let value = json!({"text": "from text", "content": "from content"});
        assert_eq!(extract_text(&value), Some("from text".to_string()));
    }

    #[test]
    fn test_mapping_content_alone() {
        assert_eq!(extract_text(&json!({"content": "c"})), Some("c".to_string()));
    }

    #[test]
    fn test_mapping_non_string_values_are_no_value() {
        assert_eq!(extract_text(&json!({"text": 7})), None);
        assert_eq!(extract_text(&json!({"content": {"nested": true}})), None);
    }

    #[test]
    fn test_unrecognized_shapes_are_no_value() {
        assert_eq!(extract_text(&json!(42)), None);
        assert_eq!(extract_text(&json!(3.15)), None);
        assert_eq!(extract_text(&json!(true)), None);
        assert_eq!(extract_text(&json!(null)), None);
        assert_eq!(extract_text(&json!({})), None);
        assert_eq!(extract_text(&json!({"unrelated": "field"})), None);
    }

    #[test]
    fn test_messages_not_a_list_treated_as_fields() {
        let value = json!({"messages": "not a list", "text": "t"});
        assert_eq!(extract_text(&value), Some("t".to_string()));
    }

    #[test]
    fn test_typed_message_entry() {
        let state = ConversationState {
            messages: vec![
                TranscriptEntry::Message(AssistantMessage { content: "earlier".to_string() }),
                TranscriptEntry::Message(AssistantMessage { content: "final".to_string() }),
            ],
            text: None,
            content: None,
        };
        assert_eq!(AgentResponse::State(state).resolve(), Some("final".to_string()));
    }

    #[test]
    fn test_typed_message_variant() {
        let response = AgentResponse::Message(AssistantMessage { content: "direct".to_string() });
        assert_eq!(response.resolve(), Some("direct".to_string()));
    }
}
