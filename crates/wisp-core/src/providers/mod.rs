//! Multi-provider LLM abstraction layer
//!
//! Supports Anthropic, OpenAI, Google Gemini (alias `gemini`), and Groq.
//! Providers implement the [`LlmProvider`] trait and are constructed from
//! `provider/model-name` strings by the [`ProviderRegistry`].

pub mod anthropic;
pub mod google;
pub mod openai;
pub mod openai_compat;
pub mod registry;
pub mod types;

pub use registry::{
    first_present, split_model_string, ProviderError, ProviderFactory, ProviderKeys,
    ProviderRegistry,
};
pub use types::{
    ChatBlock, ChatMessage, ChatMessageContent, ChatResponse, ChatResponseBlock, ChatRole,
    LlmProvider, StopReason,
};
