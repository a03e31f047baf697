use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use wisp_core::providers::{ProviderKeys, first_present};
use wisp_core::router::AgentDescriptor;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WispConfig {
    pub agent: AgentConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub google: GoogleAuthConfig,
    #[serde(default)]
    pub subagents: Vec<AgentDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Compound model identifier of the form `provider/model-name`
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_system_prompt_file")]
    pub system_prompt_file: String,
    #[serde(default = "default_thread_id")]
    pub thread_id: String,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_temperature() -> f32 {
    0.1
}

fn default_system_prompt_file() -> String {
    "~/.config/wisp/PROMPT.md".to_string()
}

fn default_thread_id() -> String {
    "1".to_string()
}

fn default_history_limit() -> usize {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub anthropic: ProviderKeyConfig,
    #[serde(default)]
    pub openai: ProviderKeyConfig,
    #[serde(default)]
    pub google: ProviderKeyConfig,
    #[serde(default)]
    pub groq: ProviderKeyConfig,
}

#[derive(Clone, Serialize, Deserialize, Default)]
pub struct ProviderKeyConfig {
    #[serde(default)]
    pub api_key: String,
}

impl std::fmt::Debug for ProviderKeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderKeyConfig")
            .field("api_key", &mask_secret(&self.api_key))
            .finish()
    }
}

impl ProvidersConfig {
    /// Resolve the effective API keys once, at startup.
    ///
    /// Config values win over the environment; the Google key reads
    /// `GOOGLE_API_KEY` first and `GEMINI_API_KEY` as the alternate
    /// spelling. No environment mutation is involved.
    pub fn resolve_keys(&self) -> ProviderKeys {
        ProviderKeys {
            anthropic: first_present([
                config_key(&self.anthropic),
                env_key("ANTHROPIC_API_KEY"),
            ]),
            openai: first_present([config_key(&self.openai), env_key("OPENAI_API_KEY")]),
            google: first_present([
                config_key(&self.google),
                env_key("GOOGLE_API_KEY"),
                env_key("GEMINI_API_KEY"),
            ]),
            groq: first_present([config_key(&self.groq), env_key("GROQ_API_KEY")]),
        }
    }
}

fn config_key(config: &ProviderKeyConfig) -> Option<String> {
    let expanded = shellexpand_str(&config.api_key);
    if expanded.is_empty() { None } else { Some(expanded) }
}

fn env_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsConfig {
    pub whatsapp: WhatsAppConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub account_sid: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default)]
    pub from_number: String,
}

impl std::fmt::Debug for WhatsAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppConfig")
            .field("enabled", &self.enabled)
            .field("account_sid", &self.account_sid)
            .field("auth_token", &mask_secret(&self.auth_token))
            .field("from_number", &self.from_number)
            .finish()
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:5000".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "~/.config/wisp/wisp.db".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleAuthConfig {
    #[serde(default = "default_token_file")]
    pub token_file: String,
    #[serde(default = "default_client_secrets_file")]
    pub client_secrets_file: String,
}

impl Default for GoogleAuthConfig {
    fn default() -> Self {
        Self {
            token_file: default_token_file(),
            client_secrets_file: default_client_secrets_file(),
        }
    }
}

fn default_token_file() -> String {
    "~/.config/wisp/token.json".to_string()
}

fn default_client_secrets_file() -> String {
    "~/.config/wisp/credentials.json".to_string()
}

impl WispConfig {
    /// Load configuration from the given path, or the default location
    pub fn load(path: &Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => config_dir().join("config.toml"),
        };
        let raw = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config at {}", config_path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config at {}", config_path.display()))?;
        Ok(config)
    }
}

/// The wisp configuration directory
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wisp")
}

fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        "<unset>".to_string()
    } else if secret.starts_with("${") {
        secret.to_string()
    } else {
        "***".to_string()
    }
}

/// Expand `~/` and `${VAR}` patterns in a config value
pub fn shellexpand_str(s: &str) -> String {
    let mut result = s.to_string();
    if result.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            result = format!("{}{}", home.display(), &result[1..]);
        }
    }
    // Expand ${VAR} patterns with position tracking to avoid infinite loops
    let mut pos = 0;
    while pos < result.len() {
        if let Some(start) = result[pos..].find("${") {
            let abs_start = pos + start;
            if let Some(end) = result[abs_start..].find('}') {
                let var_name = &result[abs_start + 2..abs_start + end];
                let value = std::env::var(var_name).unwrap_or_default();
                let value_len = value.len();
                result = format!(
                    "{}{}{}",
                    &result[..abs_start],
                    value,
                    &result[abs_start + end + 1..]
                );
                pos = abs_start + value_len;
            } else {
                break;
            }
        } else {
            break;
        }
    }
    result
}

/// Expand a config value into a path
pub fn shellexpand(s: &str) -> PathBuf {
    PathBuf::from(shellexpand_str(s))
}
