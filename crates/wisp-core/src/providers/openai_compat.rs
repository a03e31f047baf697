//! OpenAI-compatible provider for Groq and similar endpoints
//!
//! Reuses the chat-completions wire format with a configurable base URL.

use anyhow::Result;
use async_trait::async_trait;

use crate::tools::ToolDefinition;

use super::openai::OpenAiProvider;
use super::types::{ChatMessage, ChatResponse, LlmProvider};

/// OpenAI-compatible provider — wraps [`OpenAiProvider`] with a custom name
pub struct OpenAiCompatProvider {
    inner: OpenAiProvider,
    name: String,
}

impl std::fmt::Debug for OpenAiCompatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatProvider")
            .field("name", &self.name)
            .field("inner", &self.inner)
            .finish()
    }
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    ///
    /// - `name`: provider token (e.g. "groq")
    /// - `base_url`: the endpoint root (e.g. `https://api.groq.com/openai/v1`)
    pub fn new(
        name: impl Into<String>,
        api_key: String,
        model: String,
        base_url: String,
        temperature: f32,
    ) -> Self {
        Self {
            inner: OpenAiProvider::new(api_key, model, temperature).with_base_url(base_url),
            name: name.into(),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn provider_name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        self.inner.model_name()
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        system: &str,
    ) -> Result<ChatResponse> {
        self.inner.request(messages, tools, system).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compat_provider_name_and_model() {
        let p = OpenAiCompatProvider::new(
            "groq",
            "gsk_key".to_string(),
            "llama-3.3-70b".to_string(),
            "https://api.groq.com/openai/v1".to_string(),
            0.1,
        );
        assert_eq!(p.provider_name(), "groq");
        assert_eq!(p.model(), "llama-3.3-70b");
    }

    #[test]
    fn test_compat_provider_debug_hides_key() {
        let p = OpenAiCompatProvider::new(
            "groq",
            "gsk_secret".to_string(),
            "llama-3.3-70b".to_string(),
            "https://api.groq.com/openai/v1".to_string(),
            0.1,
        );
        let debug = format!("{:?}", p);
        assert!(!debug.contains("gsk_secret"));
        assert!(debug.contains("groq"));
    }
}
