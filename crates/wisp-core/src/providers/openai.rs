//! OpenAI provider (also the wire format behind OpenAI-compatible endpoints)

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::tools::ToolDefinition;

use super::types::{
    ChatBlock, ChatMessage, ChatMessageContent, ChatResponse, ChatResponseBlock, ChatRole,
    LlmProvider, StopReason,
};

pub(crate) const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// OpenAI chat-completions provider
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String, temperature: f32) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model,
            temperature,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Override the endpoint root (OpenAI-compatible services, tests)
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub(crate) fn model_name(&self) -> &str {
        &self.model
    }

    /// Convert provider-agnostic messages to the chat-completions wire format.
    /// Tool results become separate "tool" role messages.
    fn to_wire_messages(messages: &[ChatMessage], system: &str) -> Vec<WireMessage> {
        let mut result = vec![WireMessage {
            role: "system".to_string(),
            content: Some(system.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }];

        for msg in messages {
            match (&msg.role, &msg.content) {
                (ChatRole::System, _) => {}
                (role, ChatMessageContent::Text(text)) => {
                    result.push(WireMessage {
                        role: role.to_string(),
                        content: Some(text.clone()),
                        tool_calls: None,
                        tool_call_id: None,
                    });
                }
                (ChatRole::Assistant, ChatMessageContent::Blocks(blocks)) => {
                    let mut text_parts = Vec::new();
                    let mut tool_calls = Vec::new();
                    for block in blocks {
                        match block {
                            ChatBlock::Text { text } => text_parts.push(text.clone()),
                            ChatBlock::ToolCall { id, name, input } => {
                                tool_calls.push(WireToolCall {
                                    id: id.clone(),
                                    r#type: "function".to_string(),
                                    function: WireFunction {
                                        name: name.clone(),
                                        arguments: serde_json::to_string(input)
                                            .unwrap_or_default(),
                                    },
                                });
                            }
                            ChatBlock::ToolResult { .. } => {}
                        }
                    }
                    result.push(WireMessage {
                        role: "assistant".to_string(),
                        content: if text_parts.is_empty() {
                            None
                        } else {
                            Some(text_parts.join("\n"))
                        },
                        tool_calls: if tool_calls.is_empty() {
                            None
                        } else {
                            Some(tool_calls)
                        },
                        tool_call_id: None,
                    });
                }
                (ChatRole::User, ChatMessageContent::Blocks(blocks)) => {
                    let mut text_parts = Vec::new();
                    for block in blocks {
                        match block {
                            ChatBlock::Text { text } => text_parts.push(text.clone()),
                            ChatBlock::ToolResult { tool_call_id, content } => {
                                result.push(WireMessage {
                                    role: "tool".to_string(),
                                    content: Some(content.clone()),
                                    tool_calls: None,
                                    tool_call_id: Some(tool_call_id.clone()),
                                });
                            }
                            ChatBlock::ToolCall { .. } => {}
                        }
                    }
                    if !text_parts.is_empty() {
                        result.push(WireMessage {
                            role: "user".to_string(),
                            content: Some(text_parts.join("\n")),
                            tool_calls: None,
                            tool_call_id: None,
                        });
                    }
                }
            }
        }

        result
    }

    /// Convert a chat-completions response to the provider-agnostic format
    fn from_wire_response(resp: WireResponse) -> Result<ChatResponse> {
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("chat-completions response had no choices"))?;

        let mut blocks = Vec::new();
        if let Some(content) = choice.message.content
            && !content.is_empty()
        {
            blocks.push(ChatResponseBlock::Text { text: content });
        }
        if let Some(tool_calls) = choice.message.tool_calls {
            for tc in tool_calls {
                let input: Value = serde_json::from_str(&tc.function.arguments)
                    .unwrap_or(Value::Object(serde_json::Map::new()));
                blocks.push(ChatResponseBlock::ToolCall {
                    id: tc.id,
                    name: tc.function.name,
                    input,
                });
            }
        }

        let stop_reason = match choice.finish_reason.as_deref() {
            Some("stop") => StopReason::EndTurn,
            Some("tool_calls") => StopReason::ToolUse,
            Some("length") => StopReason::MaxTokens,
            _ => StopReason::Unknown,
        };

        Ok(ChatResponse { blocks, stop_reason })
    }

    pub(crate) async fn request(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        system: &str,
    ) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let wire_messages = Self::to_wire_messages(messages, system);

        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": wire_messages,
        });
        if !tools.is_empty() {
            let wire_tools: Vec<WireToolDef> = tools
                .iter()
                .map(|t| WireToolDef {
                    r#type: "function".to_string(),
                    function: WireToolFunction {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.input_schema.clone(),
                    },
                })
                .collect();
            body["tools"] = serde_json::to_value(wire_tools)?;
        }

        debug!(
            "Chat-completions request: model={}, messages={}",
            self.model,
            wire_messages.len()
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Failed to send chat-completions request")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!(
                "Chat-completions request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let wire: WireResponse = response
            .json()
            .await
            .context("Failed to parse chat-completions response")?;

        Self::from_wire_response(wire)
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        system: &str,
    ) -> Result<ChatResponse> {
        self.request(messages, tools, system).await
    }
}

// ── chat-completions wire types ──

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    r#type: String,
    function: WireFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Clone, Serialize)]
struct WireToolDef {
    r#type: String,
    function: WireToolFunction,
}

#[derive(Debug, Clone, Serialize)]
struct WireToolFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Clone, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct WireChoiceMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_wire_messages_leads_with_system() {
        let msgs = vec![ChatMessage::user("hello")];
        let result = OpenAiProvider::to_wire_messages(&msgs, "You are helpful.");
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].role, "system");
        assert_eq!(result[0].content.as_deref(), Some("You are helpful."));
        assert_eq!(result[1].role, "user");
    }

    #[test]
    fn test_to_wire_messages_tool_round_trip() {
        let msgs = vec![
            ChatMessage::user("ask the planner"),
            ChatMessage {
                role: ChatRole::Assistant,
                content: ChatMessageContent::Blocks(vec![ChatBlock::ToolCall {
                    id: "tc_1".to_string(),
                    name: "send_message".to_string(),
                    input: serde_json::json!({"recipient": "planner", "message": "hi"}),
                }]),
            },
            ChatMessage {
                role: ChatRole::User,
                content: ChatMessageContent::Blocks(vec![ChatBlock::ToolResult {
                    tool_call_id: "tc_1".to_string(),
                    content: "On it".to_string(),
                }]),
            },
        ];
        let result = OpenAiProvider::to_wire_messages(&msgs, "sys");
        assert_eq!(result.len(), 4);
        assert_eq!(result[2].role, "assistant");
        assert!(result[2].tool_calls.is_some());
        assert_eq!(result[3].role, "tool");
        assert_eq!(result[3].tool_call_id.as_deref(), Some("tc_1"));
    }

    #[test]
    fn test_from_wire_response_text() {
        let wire = WireResponse {
            choices: vec![WireChoice {
                message: WireChoiceMessage {
                    content: Some("Hello!".to_string()),
                    tool_calls: None,
                },
                finish_reason: Some("stop".to_string()),
            }],
        };
        let result = OpenAiProvider::from_wire_response(wire).unwrap();
        assert_eq!(result.stop_reason, StopReason::EndTurn);
        assert_eq!(result.text(), "Hello!");
    }

    #[test]
    fn test_from_wire_response_tool_calls() {
        let wire = WireResponse {
            choices: vec![WireChoice {
                message: WireChoiceMessage {
                    content: None,
                    tool_calls: Some(vec![WireToolCall {
                        id: "call_1".to_string(),
                        r#type: "function".to_string(),
                        function: WireFunction {
                            name: "send_message".to_string(),
                            arguments: r#"{"recipient":"planner","message":"hi"}"#.to_string(),
                        },
                    }]),
                },
                finish_reason: Some("tool_calls".to_string()),
            }],
        };
        let result = OpenAiProvider::from_wire_response(wire).unwrap();
        assert_eq!(result.stop_reason, StopReason::ToolUse);
        assert!(matches!(
            &result.blocks[0],
            ChatResponseBlock::ToolCall { name, .. } if name == "send_message"
        ));
    }

    #[test]
    fn test_from_wire_response_no_choices() {
        let wire = WireResponse { choices: vec![] };
        assert!(OpenAiProvider::from_wire_response(wire).is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let provider = OpenAiProvider::new("sk-secret".to_string(), "gpt-4o".to_string(), 0.3);
        let debug = format!("{:?}", provider);
        assert!(!debug.contains("sk-secret"));
    }
}
