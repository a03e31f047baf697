//! wisp-core - the brain of the wisp assistant
//!
//! This crate provides:
//! - The top-level assistant loop that turns incoming messages into replies
//! - A multi-provider LLM abstraction (Anthropic, OpenAI, Google Gemini, Groq)
//! - Reply extraction from loosely-structured agent responses
//! - Sub-agent routing with a direct fast path and a tool-loop fallback
//! - A thread-keyed conversation store on SQLite
//! - Google API credential resolution for the `wisp auth` flow

pub mod assistant;
pub mod chat;
pub mod credentials;
pub mod memory;
pub mod providers;
pub mod reply;
pub mod router;
pub mod tools;
pub mod types;

// Re-export main types for convenience
pub use assistant::Assistant;
pub use memory::ConversationStore;
pub use providers::{ProviderFactory, ProviderRegistry};
pub use reply::{extract_text, AgentResponse, FALLBACK_REPLY};
pub use router::{AgentDescriptor, SubAgentRouter};
pub use tools::{ToolDefinition, ToolExecutor, ToolHandler, ToolRegistry};
pub use types::{ChannelType, IncomingMessage, MessageHandler, OutgoingMessage};
