//! Sub-agent routing — deliver a message to a named sub-agent's model
//!
//! The router prefers a direct single-shot model call over the sub-agent's
//! own tool loop: a tool call issued inside a tool invocation can be left
//! without a matching follow-up message, which the surrounding loop treats
//! as a protocol error. The full loop remains available as a fallback when
//! the direct call fails.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::chat;
use crate::providers::{ChatMessage, ChatResponse, ProviderFactory};
use crate::reply::AgentResponse;
use crate::tools::{ToolExecutor, ToolRegistry};

/// A sub-agent: a named model/prompt configuration.
///
/// Immutable once constructed; owned by the router's registry keyed by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub name: String,
    /// Compound model identifier of the form `provider/model-name`
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    pub system_prompt: String,
}

fn default_temperature() -> f32 {
    0.1
}

/// Routes messages to named sub-agents
pub struct SubAgentRouter {
    agents: HashMap<String, AgentDescriptor>,
    providers: Arc<dyn ProviderFactory>,
    /// Tools available to a sub-agent's fallback loop. `send_message` is
    /// never registered here, so a sub-agent cannot re-enter dispatch.
    tools: Arc<ToolRegistry>,
}

impl SubAgentRouter {
    pub fn new(
        agents: impl IntoIterator<Item = AgentDescriptor>,
        providers: Arc<dyn ProviderFactory>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        let agents: HashMap<String, AgentDescriptor> = agents
            .into_iter()
            .map(|agent| (agent.name.clone(), agent))
            .collect();
        debug!("SubAgentRouter: {} sub-agents registered", agents.len());
        Self {
            agents,
            providers,
            tools,
        }
    }

    /// Names of all registered sub-agents
    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.keys().map(String::as_str).collect()
    }

    /// Deliver `message` to the named sub-agent and return its reply.
    ///
    /// Always returns a string: an unknown recipient and a failed invocation
    /// are result values, not errors.
    pub async fn dispatch(&self, recipient: &str, message: &str) -> String {
        let Some(agent) = self.agents.get(recipient) else {
            return format!("Invalid recipient: {recipient}");
        };

        match self.invoke_direct(agent, message).await {
            Ok(text) => text,
            Err(direct_err) => {
                warn!(
                    "Direct invocation of sub-agent '{}' failed ({:#}); falling back to the full loop",
                    recipient, direct_err
                );
                match self.invoke_full(agent, message).await {
                    Ok(text) => text,
                    Err(e) => {
                        error!("Sub-agent '{}' fallback invocation failed: {:#}", recipient, e);
                        format!("Error: {e:#}")
                    }
                }
            }
        }
    }

    /// Fast path: one model call with the descriptor's system prompt and the
    /// message as the single user turn. No tools.
    async fn invoke_direct(
        &self,
        agent: &AgentDescriptor,
        message: &str,
    ) -> anyhow::Result<String> {
        let provider = self.providers.build(&agent.model, agent.temperature)?;
        let messages = vec![ChatMessage::user(message)];
        let response = provider.chat(&messages, &[], &agent.system_prompt).await?;
        Ok(reply_or_rendered(&response))
    }

    /// Fallback: the sub-agent's full multi-step entry point, message wrapped
    /// as a single user turn.
    async fn invoke_full(&self, agent: &AgentDescriptor, message: &str) -> anyhow::Result<String> {
        let provider = self.providers.build(&agent.model, agent.temperature)?;
        let state = chat::run_to_completion(
            provider.as_ref(),
            &agent.system_prompt,
            &[],
            message,
            &self.tools.list_tools(),
            self.tools.as_ref(),
        )
        .await?;
        let reply = AgentResponse::State(state);
        Ok(reply
            .resolve()
            .unwrap_or_else(|| format!("{reply:?}")))
    }
}

/// The response's text blocks, or a stringified rendering when there are none
fn reply_or_rendered(response: &ChatResponse) -> String {
    let text = response.text();
    if text.is_empty() {
        format!("{:?}", response.blocks)
    } else {
        text
    }
}
