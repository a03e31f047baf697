//! Anthropic Claude provider

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

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic Claude provider
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl AnthropicProvider {
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

    /// Override the endpoint root (proxies, regional endpoints, tests)
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Convert provider-agnostic messages to Anthropic wire format
    fn to_wire_messages(messages: &[ChatMessage]) -> Vec<WireMessage> {
        messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| {
                let role = match m.role {
                    ChatRole::Assistant => "assistant",
                    _ => "user",
                };
                let content = match &m.content {
                    ChatMessageContent::Text(t) => WireContent::Text(t.clone()),
                    ChatMessageContent::Blocks(blocks) => WireContent::Blocks(
                        blocks
                            .iter()
                            .map(|b| match b {
                                ChatBlock::Text { text } => WireBlock::Text { text: text.clone() },
                                ChatBlock::ToolCall { id, name, input } => WireBlock::ToolUse {
                                    id: id.clone(),
                                    name: name.clone(),
                                    input: input.clone(),
                                },
                                ChatBlock::ToolResult { tool_call_id, content } => {
                                    WireBlock::ToolResult {
                                        tool_use_id: tool_call_id.clone(),
                                        content: content.clone(),
                                    }
                                }
                            })
                            .collect(),
                    ),
                };
                WireMessage { role: role.to_string(), content }
            })
            .collect()
    }

    /// Convert an Anthropic response to the provider-agnostic format
    fn from_wire_response(resp: WireResponse) -> ChatResponse {
        let blocks = resp
            .content
            .into_iter()
            .filter_map(|b| match b {
                WireBlock::Text { text } => Some(ChatResponseBlock::Text { text }),
                WireBlock::ToolUse { id, name, input } => {
                    Some(ChatResponseBlock::ToolCall { id, name, input })
                }
                WireBlock::ToolResult { .. } => None,
            })
            .collect();

        let stop_reason = match resp.stop_reason.as_deref() {
            Some("end_turn") | None => StopReason::EndTurn,
            Some("tool_use") => StopReason::ToolUse,
            Some("max_tokens") => StopReason::MaxTokens,
            Some(_) => StopReason::Unknown,
        };

        ChatResponse { blocks, stop_reason }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn provider_name(&self) -> &str {
        "anthropic"
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
        let url = format!("{}/v1/messages", self.base_url);
        let wire_messages = Self::to_wire_messages(messages);

        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "system": system,
            "messages": wire_messages,
        });
        if !tools.is_empty() {
            body["tools"] = serde_json::to_value(tools)?;
        }

        debug!(
            "Anthropic request: model={}, messages={}",
            self.model,
            wire_messages.len()
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Failed to send request to Anthropic API")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!(
                "Anthropic API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let wire: WireResponse = response
            .json()
            .await
            .context("Failed to parse Anthropic API response")?;

        debug!(
            "Anthropic response: blocks={}, stop_reason={:?}",
            wire.content.len(),
            wire.stop_reason
        );

        Ok(Self::from_wire_response(wire))
    }
}

// ── Anthropic wire types ──

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: WireContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Blocks(Vec<WireBlock>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
    ToolResult { tool_use_id: String, content: String },
}

#[derive(Debug, Clone, Deserialize)]
struct WireResponse {
    content: Vec<WireBlock>,
    stop_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_wire_messages_filters_system() {
        let msgs = vec![
            ChatMessage {
                role: ChatRole::System,
                content: ChatMessageContent::Text("sys".to_string()),
            },
            ChatMessage::user("hello"),
        ];
        let result = AnthropicProvider::to_wire_messages(&msgs);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].role, "user");
    }

    #[test]
    fn test_to_wire_messages_tool_result_blocks() {
        let msgs = vec![ChatMessage {
            role: ChatRole::User,
            content: ChatMessageContent::Blocks(vec![ChatBlock::ToolResult {
                tool_call_id: "t1".to_string(),
                content: "result".to_string(),
            }]),
        }];
        let result = AnthropicProvider::to_wire_messages(&msgs);
        assert!(matches!(
            &result[0].content,
            WireContent::Blocks(blocks) if matches!(&blocks[0], WireBlock::ToolResult { tool_use_id, .. } if tool_use_id == "t1")
        ));
    }

    #[test]
    fn test_from_wire_response_text() {
        let wire = WireResponse {
            content: vec![WireBlock::Text { text: "Hello!".to_string() }],
            stop_reason: Some("end_turn".to_string()),
        };
        let result = AnthropicProvider::from_wire_response(wire);
        assert_eq!(result.stop_reason, StopReason::EndTurn);
        assert_eq!(result.text(), "Hello!");
    }

    #[test]
    fn test_from_wire_response_tool_use() {
        let wire = WireResponse {
            content: vec![WireBlock::ToolUse {
                id: "t1".to_string(),
                name: "send_message".to_string(),
                input: serde_json::json!({"recipient": "planner"}),
            }],
            stop_reason: Some("tool_use".to_string()),
        };
        let result = AnthropicProvider::from_wire_response(wire);
        assert_eq!(result.stop_reason, StopReason::ToolUse);
        assert!(matches!(
            &result.blocks[0],
            ChatResponseBlock::ToolCall { name, .. } if name == "send_message"
        ));
    }

    #[test]
    fn test_debug_hides_key() {
        let provider = AnthropicProvider::new(
            "sk-ant-secret".to_string(),
            "claude-sonnet-4-5".to_string(),
            0.1,
        );
        let debug = format!("{:?}", provider);
        assert!(!debug.contains("sk-ant-secret"));
        assert!(debug.contains("claude-sonnet-4-5"));
    }
}
