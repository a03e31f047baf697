//! Top-level assistant — turns an incoming message into a reply

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::chat;
use crate::memory::ConversationStore;
use crate::providers::{ChatMessage, LlmProvider};
use crate::reply::{AgentResponse, FALLBACK_REPLY};
use crate::tools::{ToolExecutor, ToolRegistry};
use crate::types::{IncomingMessage, MessageHandler, OutgoingMessage};

const DEFAULT_HISTORY_LIMIT: usize = 20;

/// The personal assistant: one model, a tool registry, and a conversation
/// thread
pub struct Assistant {
    provider: Box<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    store: Arc<ConversationStore>,
    thread_id: String,
    history_limit: usize,
}

impl Assistant {
    pub fn new(
        provider: Box<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        system_prompt: String,
        store: Arc<ConversationStore>,
        thread_id: String,
    ) -> Self {
        Self {
            provider,
            tools,
            system_prompt,
            store,
            thread_id,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Set how many stored turns are replayed into each invocation
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Generate a reply to one message.
    ///
    /// The reply is always a non-empty string: when the agent's response
    /// yields no text, the fixed fallback reply is substituted.
    pub async fn reply_to(&self, content: &str) -> Result<String> {
        let history: Vec<ChatMessage> = self
            .store
            .recent(&self.thread_id, self.history_limit)
            .context("Failed to load conversation history")?
            .iter()
            .map(|m| match m.role.as_str() {
                "assistant" => ChatMessage::assistant(m.content.clone()),
                _ => ChatMessage::user(m.content.clone()),
            })
            .collect();

        self.store
            .append(&self.thread_id, "user", content)
            .context("Failed to store incoming message")?;

        let prompt = format!(
            "Message: {}\nCurrent Date/time: {}",
            content,
            current_date_time()
        );

        let state = chat::run_to_completion(
            self.provider.as_ref(),
            &self.system_prompt,
            &history,
            &prompt,
            &self.tools.list_tools(),
            self.tools.as_ref(),
        )
        .await
        .context("Failed to run the agent loop")?;

        let text = AgentResponse::State(state)
            .resolve()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| FALLBACK_REPLY.to_string());

        self.store
            .append(&self.thread_id, "assistant", &text)
            .context("Failed to store reply")?;

        debug!("Generated reply ({} chars)", text.len());
        Ok(text)
    }
}

#[async_trait]
impl MessageHandler for Assistant {
    async fn handle_message(&self, msg: IncomingMessage) -> Result<OutgoingMessage> {
        info!(
            "Handling message from {} on channel {}",
            msg.sender, msg.channel
        );
        let content = self.reply_to(&msg.content).await?;
        Ok(OutgoingMessage {
            destination: msg.sender,
            content,
            channel: msg.channel,
        })
    }
}

/// Local wall-clock time in the format the prompt carries
fn current_date_time() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Utc;
    use tempfile::TempDir;

    use crate::providers::{ChatResponse, ChatResponseBlock, StopReason};
    use crate::tools::ToolDefinition;
    use crate::types::ChannelType;

    /// Mock provider that replies with fixed blocks
    #[derive(Debug)]
    struct FixedProvider {
        blocks: Vec<ChatResponseBlock>,
    }

    #[async_trait]
    impl LlmProvider for FixedProvider {
        fn provider_name(&self) -> &str {
            "mock"
        }
        fn model(&self) -> &str {
            "mock-model"
        }
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolDefinition],
            _system: &str,
        ) -> Result<ChatResponse> {
            Ok(ChatResponse {
                blocks: self.blocks.clone(),
                stop_reason: StopReason::EndTurn,
            })
        }
    }

    fn assistant_with(blocks: Vec<ChatResponseBlock>) -> (Assistant, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ConversationStore::open(&dir.path().join("test.db")).unwrap());
        let assistant = Assistant::new(
            Box::new(FixedProvider { blocks }),
            Arc::new(ToolRegistry::new()),
            "You are a test assistant.".to_string(),
            store,
            "1".to_string(),
        );
        (assistant, dir)
    }

    #[tokio::test]
    async fn test_reply_is_extracted_and_stored() {
        let (assistant, _dir) = assistant_with(vec![ChatResponseBlock::Text {
            text: "You have two meetings.".to_string(),
        }]);
        let reply = assistant.reply_to("What's on my calendar?").await.unwrap();
        assert_eq!(reply, "You have two meetings.");
        assert_eq!(assistant.store.count("1").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_empty_response_gets_fallback_reply() {
        let (assistant, _dir) = assistant_with(vec![]);
        let reply = assistant.reply_to("hello").await.unwrap();
        assert_eq!(reply, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_handle_message_routes_back_to_sender() {
        let (assistant, _dir) = assistant_with(vec![ChatResponseBlock::Text {
            text: "hi".to_string(),
        }]);
        let outgoing = assistant
            .handle_message(IncomingMessage {
                id: "m1".to_string(),
                sender: "+15551234567".to_string(),
                content: "hello".to_string(),
                channel: ChannelType::WhatsApp,
                timestamp: Utc::now(),
            })
            .await
            .unwrap();
        assert_eq!(outgoing.destination, "+15551234567");
        assert_eq!(outgoing.channel, ChannelType::WhatsApp);
        assert_eq!(outgoing.content, "hi");
    }

    #[test]
    fn test_current_date_time_format() {
        let stamp = current_date_time();
        // YYYY-MM-DD HH:MM
        assert_eq!(stamp.len(), 16);
        assert_eq!(&stamp[4..5], "-");
        assert_eq!(&stamp[10..11], " ");
        assert_eq!(&stamp[13..14], ":");
    }
}
