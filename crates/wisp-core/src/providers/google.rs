//! Google Gemini provider

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

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Google Gemini provider (also reachable under the `gemini` alias)
pub struct GoogleProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl std::fmt::Debug for GoogleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleProvider")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl GoogleProvider {
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

    /// Override the endpoint root (tests)
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Convert provider-agnostic messages to Gemini wire format
    fn to_wire_contents(messages: &[ChatMessage]) -> Vec<WireContent> {
        messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| {
                let role = match m.role {
                    ChatRole::Assistant => "model",
                    _ => "user",
                };
                let parts = match &m.content {
                    ChatMessageContent::Text(t) => vec![WirePart::Text { text: t.clone() }],
                    ChatMessageContent::Blocks(blocks) => blocks
                        .iter()
                        .map(|b| match b {
                            ChatBlock::Text { text } => WirePart::Text { text: text.clone() },
                            ChatBlock::ToolCall { name, input, .. } => WirePart::FunctionCall {
                                function_call: WireFunctionCall {
                                    name: name.clone(),
                                    args: input.clone(),
                                },
                            },
                            ChatBlock::ToolResult { tool_call_id, content } => {
                                WirePart::FunctionResponse {
                                    function_response: WireFunctionResponse {
                                        name: tool_call_id.clone(),
                                        response: serde_json::json!({"result": content}),
                                    },
                                }
                            }
                        })
                        .collect(),
                };
                WireContent {
                    role: role.to_string(),
                    parts,
                }
            })
            .collect()
    }

    /// Convert a Gemini response to the provider-agnostic format
    fn from_wire_response(resp: WireResponse) -> Result<ChatResponse> {
        let candidate = resp
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Gemini response had no candidates"))?;

        let mut blocks = Vec::new();
        let mut has_tool_calls = false;
        for part in candidate.content.parts {
            match part {
                WirePart::Text { text } => blocks.push(ChatResponseBlock::Text { text }),
                WirePart::FunctionCall { function_call } => {
                    has_tool_calls = true;
                    blocks.push(ChatResponseBlock::ToolCall {
                        id: format!("gemini_{}", function_call.name),
                        name: function_call.name,
                        input: function_call.args,
                    });
                }
                WirePart::FunctionResponse { .. } => {}
            }
        }

        let stop_reason = if has_tool_calls {
            StopReason::ToolUse
        } else {
            match candidate.finish_reason.as_deref() {
                Some("MAX_TOKENS") => StopReason::MaxTokens,
                _ => StopReason::EndTurn,
            }
        };

        Ok(ChatResponse { blocks, stop_reason })
    }
}

#[async_trait]
impl LlmProvider for GoogleProvider {
    fn provider_name(&self) -> &str {
        "google"
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
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let contents = Self::to_wire_contents(messages);

        let mut body = serde_json::json!({
            "contents": contents,
            "systemInstruction": {
                "parts": [{"text": system}]
            },
            "generationConfig": {
                "maxOutputTokens": self.max_tokens,
                "temperature": self.temperature,
            },
        });

        if !tools.is_empty() {
            let declarations: Vec<WireFunctionDeclaration> = tools
                .iter()
                .map(|t| WireFunctionDeclaration {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.input_schema.clone(),
                })
                .collect();
            body["tools"] = serde_json::json!([{"functionDeclarations": declarations}]);
        }

        debug!(
            "Gemini request: model={}, contents={}",
            self.model,
            contents.len()
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Failed to send request to Gemini API")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!(
                "Gemini API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let wire: WireResponse = response
            .json()
            .await
            .context("Failed to parse Gemini API response")?;

        Self::from_wire_response(wire)
    }
}

// ── Gemini wire types ──

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireContent {
    role: String,
    parts: Vec<WirePart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum WirePart {
    Text {
        text: String,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: WireFunctionCall,
    },
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: WireFunctionResponse,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireFunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Clone, Deserialize)]
struct WireResponse {
    candidates: Vec<WireCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
struct WireCandidate {
    content: WireContent,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}
