//! Tool-use loop over any LLM provider
//!
//! Drives a conversation to completion: sends the prompt, executes any tool
//! calls the model issues, feeds the results back, and returns the full
//! transcript once the model ends its turn.

use anyhow::{Result, anyhow};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::providers::{
    ChatBlock, ChatMessage, ChatMessageContent, ChatResponseBlock, ChatRole, LlmProvider,
    StopReason,
};
use crate::reply::{AssistantMessage, ConversationState, TranscriptEntry};
use crate::tools::{ToolDefinition, ToolExecutor};

const MAX_ITERATIONS: usize = 10;
const MAX_TOOL_OUTPUT: usize = 100_000;
const LOOP_TIMEOUT: Duration = Duration::from_secs(300);

/// Run the full tool-use loop until the model ends its turn.
///
/// `history` is prepended to the conversation; `user_message` is the new
/// turn. The returned [`ConversationState`] holds the transcript with the
/// final assistant message last.
pub async fn run_to_completion(
    provider: &dyn LlmProvider,
    system: &str,
    history: &[ChatMessage],
    user_message: &str,
    tools: &[ToolDefinition],
    executor: &dyn ToolExecutor,
) -> Result<ConversationState> {
    tokio::time::timeout(
        LOOP_TIMEOUT,
        run_inner(provider, system, history, user_message, tools, executor),
    )
    .await
    .map_err(|_| {
        anyhow!(
            "agent loop timed out after {} seconds",
            LOOP_TIMEOUT.as_secs()
        )
    })?
}

async fn run_inner(
    provider: &dyn LlmProvider,
    system: &str,
    history: &[ChatMessage],
    user_message: &str,
    tools: &[ToolDefinition],
    executor: &dyn ToolExecutor,
) -> Result<ConversationState> {
    let mut conversation: Vec<ChatMessage> = history.to_vec();
    conversation.push(ChatMessage::user(user_message));

    let mut iterations = 0;
    loop {
        iterations += 1;
        if iterations > MAX_ITERATIONS {
            warn!("Agent loop exceeded maximum iterations ({})", MAX_ITERATIONS);
            return Err(anyhow!("agent loop exceeded maximum iterations"));
        }

        debug!(
            "Agent loop iteration {} ({} messages)",
            iterations,
            conversation.len()
        );

        let response = provider.chat(&conversation, tools, system).await?;

        conversation.push(ChatMessage {
            role: ChatRole::Assistant,
            content: ChatMessageContent::Blocks(
                response
                    .blocks
                    .iter()
                    .map(|b| match b {
                        ChatResponseBlock::Text { text } => ChatBlock::Text { text: text.clone() },
                        ChatResponseBlock::ToolCall { id, name, input } => ChatBlock::ToolCall {
                            id: id.clone(),
                            name: name.clone(),
                            input: input.clone(),
                        },
                    })
                    .collect(),
            ),
        });

        match response.stop_reason {
            StopReason::ToolUse => {
                let mut tool_results = Vec::new();
                for block in &response.blocks {
                    if let ChatResponseBlock::ToolCall { id, name, input } = block {
                        info!("Executing tool: {}", name);
                        let mut result_content =
                            match executor.execute(name, input.clone()).await {
                                Ok(output) => output,
                                Err(e) => {
                                    warn!("Tool {} failed: {}", name, e);
                                    format!("Error: {}", e)
                                }
                            };
                        if result_content.len() > MAX_TOOL_OUTPUT {
                            result_content.truncate(MAX_TOOL_OUTPUT);
                            result_content.push_str("\n[Output truncated]");
                        }
                        tool_results.push(ChatBlock::ToolResult {
                            tool_call_id: id.clone(),
                            content: result_content,
                        });
                    }
                }

                if tool_results.is_empty() {
                    return Err(anyhow!("stop reason was tool use but no tool calls found"));
                }

                conversation.push(ChatMessage {
                    role: ChatRole::User,
                    content: ChatMessageContent::Blocks(tool_results),
                });
            }
            StopReason::EndTurn => {
                debug!("Agent loop completed after {} iterations", iterations);
                return Ok(transcript_state(&conversation));
            }
            StopReason::MaxTokens => {
                // Deliver the truncated reply rather than dropping it
                warn!("Model hit the output token limit; reply may be truncated");
                return Ok(transcript_state(&conversation));
            }
            StopReason::Unknown => {
                return Err(anyhow!("model stopped for an unrecognized reason"));
            }
        }
    }
}

/// Flatten the conversation into a transcript of typed message entries
fn transcript_state(conversation: &[ChatMessage]) -> ConversationState {
    ConversationState {
        messages: conversation
            .iter()
            .map(|m| {
                TranscriptEntry::Message(AssistantMessage {
                    content: flatten_content(&m.content),
                })
            })
            .collect(),
        text: None,
        content: None,
    }
}

fn flatten_content(content: &ChatMessageContent) -> String {
    match content {
        ChatMessageContent::Text(t) => t.clone(),
        ChatMessageContent::Blocks(blocks) => blocks
            .iter()
            .filter_map(|b| match b {
                ChatBlock::Text { text } => Some(text.as_str()),
                ChatBlock::ToolResult { content, .. } => Some(content.as_str()),
                ChatBlock::ToolCall { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}
