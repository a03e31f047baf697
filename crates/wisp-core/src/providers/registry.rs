//! Provider registry — maps provider tokens to client constructors
//!
//! Model strings are compound identifiers of the form `provider/model-name`,
//! split on the first `/`. The set of supported tokens is closed at registry
//! construction; an unregistered token is an explicit error naming it.

use std::collections::HashMap;

use thiserror::Error;

use super::anthropic::AnthropicProvider;
use super::google::GoogleProvider;
use super::openai::OpenAiProvider;
use super::openai_compat::OpenAiCompatProvider;
use super::types::LlmProvider;

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Errors from model-string resolution and client construction
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unsupported LLM provider: {0}")]
    UnsupportedProvider(String),
    #[error("model string {0:?} is not of the form provider/model-name")]
    InvalidModelString(String),
    #[error("no API key configured for provider {0}")]
    MissingApiKey(&'static str),
}

/// API keys resolved once at startup.
///
/// The Google key accepts two environment spellings; `GOOGLE_API_KEY` wins
/// over `GEMINI_API_KEY` when both are set. The choice happens here, not by
/// mutating the process environment.
#[derive(Clone, Default)]
pub struct ProviderKeys {
    pub anthropic: Option<String>,
    pub openai: Option<String>,
    pub google: Option<String>,
    pub groq: Option<String>,
}

impl std::fmt::Debug for ProviderKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn mark(key: &Option<String>) -> &'static str {
            if key.is_some() { "set" } else { "unset" }
        }
        f.debug_struct("ProviderKeys")
            .field("anthropic", &mark(&self.anthropic))
            .field("openai", &mark(&self.openai))
            .field("google", &mark(&self.google))
            .field("groq", &mark(&self.groq))
            .finish()
    }
}

impl ProviderKeys {
    /// Read keys from the process environment
    pub fn from_env() -> Self {
        Self {
            anthropic: env_key("ANTHROPIC_API_KEY"),
            openai: env_key("OPENAI_API_KEY"),
            google: first_present([env_key("GOOGLE_API_KEY"), env_key("GEMINI_API_KEY")]),
            groq: env_key("GROQ_API_KEY"),
        }
    }
}

/// First candidate that is present and non-empty
pub fn first_present<I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    candidates
        .into_iter()
        .flatten()
        .find(|key| !key.is_empty())
}

fn env_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Anything that can turn a model string into a provider client.
///
/// [`ProviderRegistry`] is the production implementation; tests substitute
/// factories that hand out mock providers.
pub trait ProviderFactory: Send + Sync {
    fn build(
        &self,
        model_string: &str,
        temperature: f32,
    ) -> Result<Box<dyn LlmProvider>, ProviderError>;
}

type Constructor = fn(&ProviderKeys, &str, f32) -> Result<Box<dyn LlmProvider>, ProviderError>;

/// Registry of provider constructors, closed over supported tokens at startup
pub struct ProviderRegistry {
    keys: ProviderKeys,
    constructors: HashMap<&'static str, Constructor>,
}

impl ProviderRegistry {
    pub fn new(keys: ProviderKeys) -> Self {
        let mut constructors: HashMap<&'static str, Constructor> = HashMap::new();
        constructors.insert("anthropic", build_anthropic);
        constructors.insert("openai", build_openai);
        // `google` and `gemini` are aliases for the same backend
        constructors.insert("google", build_google);
        constructors.insert("gemini", build_google);
        constructors.insert("groq", build_groq);
        Self { keys, constructors }
    }

    /// Whether a provider token is registered
    pub fn supports(&self, token: &str) -> bool {
        self.constructors.contains_key(token)
    }
}

impl ProviderFactory for ProviderRegistry {
    fn build(
        &self,
        model_string: &str,
        temperature: f32,
    ) -> Result<Box<dyn LlmProvider>, ProviderError> {
        let (provider, model) = split_model_string(model_string)?;
        let constructor = self
            .constructors
            .get(provider)
            .ok_or_else(|| ProviderError::UnsupportedProvider(provider.to_string()))?;
        constructor(&self.keys, model, temperature)
    }
}

/// Split `provider/model-name` on the first `/`
pub fn split_model_string(model_string: &str) -> Result<(&str, &str), ProviderError> {
    model_string
        .split_once('/')
        .ok_or_else(|| ProviderError::InvalidModelString(model_string.to_string()))
}

fn build_anthropic(
    keys: &ProviderKeys,
    model: &str,
    temperature: f32,
) -> Result<Box<dyn LlmProvider>, ProviderError> {
    let key = keys
        .anthropic
        .clone()
        .ok_or(ProviderError::MissingApiKey("anthropic"))?;
    Ok(Box::new(AnthropicProvider::new(
        key,
        model.to_string(),
        temperature,
    )))
}

fn build_openai(
    keys: &ProviderKeys,
    model: &str,
    temperature: f32,
) -> Result<Box<dyn LlmProvider>, ProviderError> {
    let key = keys
        .openai
        .clone()
        .ok_or(ProviderError::MissingApiKey("openai"))?;
    Ok(Box::new(OpenAiProvider::new(
        key,
        model.to_string(),
        temperature,
    )))
}

fn build_google(
    keys: &ProviderKeys,
    model: &str,
    temperature: f32,
) -> Result<Box<dyn LlmProvider>, ProviderError> {
    let key = keys
        .google
        .clone()
        .ok_or(ProviderError::MissingApiKey("google"))?;
    Ok(Box::new(GoogleProvider::new(
        key,
        model.to_string(),
        temperature,
    )))
}

fn build_groq(
    keys: &ProviderKeys,
    model: &str,
    temperature: f32,
) -> Result<Box<dyn LlmProvider>, ProviderError> {
    let key = keys
        .groq
        .clone()
        .ok_or(ProviderError::MissingApiKey("groq"))?;
    Ok(Box::new(OpenAiCompatProvider::new(
        "groq",
        key,
        model.to_string(),
        GROQ_BASE_URL.to_string(),
        temperature,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys_with_all() -> ProviderKeys {
        ProviderKeys {
            anthropic: Some("sk-ant-test".to_string()),
            openai: Some("sk-test".to_string()),
            google: Some("AIza-test".to_string()),
            groq: Some("gsk-test".to_string()),
        }
    }

    #[test]
    fn test_build_each_provider() {
        let registry = ProviderRegistry::new(keys_with_all());
        for (model_string, expected_name) in [
            ("anthropic/claude-sonnet-4-5", "anthropic"),
            ("openai/gpt-4o", "openai"),
            ("google/gemini-2.0-flash", "google"),
            ("groq/llama-3.3-70b", "groq"),
        ] {
            let provider = registry.build(model_string, 0.1).unwrap();
            assert_eq!(provider.provider_name(), expected_name);
        }
    }

    #[test]
    fn test_gemini_alias_builds_google_backend() {
        let registry = ProviderRegistry::new(keys_with_all());
        let a = registry.build("google/gemini-pro", 0.2).unwrap();
        let b = registry.build("gemini/gemini-pro", 0.2).unwrap();
        assert_eq!(a.provider_name(), b.provider_name());
        assert_eq!(a.model(), b.model());
        assert_eq!(a.model(), "gemini-pro");
    }

    #[test]
    fn test_unsupported_provider_names_token() {
        let registry = ProviderRegistry::new(keys_with_all());
        let err = registry.build("unknown/x", 0.1).unwrap_err();
        assert!(matches!(err, ProviderError::UnsupportedProvider(ref t) if t == "unknown"));
        assert!(err.to_string().contains("unknown"));
    }

    #[test]
    fn test_model_string_without_separator() {
        let registry = ProviderRegistry::new(keys_with_all());
        let err = registry.build("gpt-4o", 0.1).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidModelString(_)));
    }

    #[test]
    fn test_split_keeps_slashes_in_model_name() {
        let (provider, model) = split_model_string("openai/ft:gpt-4o/custom").unwrap();
        assert_eq!(provider, "openai");
        assert_eq!(model, "ft:gpt-4o/custom");
    }

    #[test]
    fn test_missing_key_is_an_error() {
        let registry = ProviderRegistry::new(ProviderKeys::default());
        let err = registry.build("anthropic/claude-sonnet-4-5", 0.1).unwrap_err();
        assert!(matches!(err, ProviderError::MissingApiKey("anthropic")));
    }

    #[test]
    fn test_supports() {
        let registry = ProviderRegistry::new(ProviderKeys::default());
        assert!(registry.supports("google"));
        assert!(registry.supports("gemini"));
        assert!(!registry.supports("mistral"));
    }

    #[test]
    fn test_first_present_skips_empty_and_none() {
        assert_eq!(
            first_present([None, Some(String::new()), Some("key".to_string())]),
            Some("key".to_string())
        );
        assert_eq!(first_present([None, None]), None);
        assert_eq!(
            first_present([Some("primary".to_string()), Some("alternate".to_string())]),
            Some("primary".to_string())
        );
    }

    #[test]
    fn test_keys_debug_hides_values() {
        let keys = keys_with_all();
        let debug = format!("{:?}", keys);
        assert!(!debug.contains("sk-ant-test"));
        assert!(debug.contains("set"));
    }
}
