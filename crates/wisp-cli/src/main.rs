use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{WispConfig, config_dir, shellexpand, shellexpand_str};
use wisp_channels::WhatsAppChannel;
use wisp_core::assistant::Assistant;
use wisp_core::credentials::{CredentialResolver, GoogleCredentials};
use wisp_core::memory::ConversationStore;
use wisp_core::providers::{ProviderFactory, ProviderRegistry};
use wisp_core::router::SubAgentRouter;
use wisp_core::tools::{SendMessageTool, ToolRegistry};
use wisp_gateway::WebhookServer;

const DEFAULT_SYSTEM_PROMPT: &str = "You are Wisp, a helpful personal assistant reached over \
     WhatsApp. Keep replies short and useful; they are read on a phone. Use the send_message \
     tool to consult your sub-agents when their specialty applies.";

#[derive(Parser)]
#[command(name = "wisp")]
#[command(version)]
#[command(about = "Wisp — a WhatsApp personal assistant")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook gateway and assistant
    Start,

    /// Send a one-shot message to the assistant
    Ask {
        /// The message to send
        message: String,
    },

    /// Resolve Google credentials (runs the consent flow when needed)
    Auth,

    /// Initialize config directory and default config
    Init,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Init => cmd_init().await,
        Commands::Config => cmd_config(&cli.config),
        Commands::Auth => cmd_auth(&cli.config).await,
        Commands::Ask { message } => cmd_ask(&cli.config, &message).await,
        Commands::Start => cmd_start(&cli.config).await,
    }
}

async fn cmd_init() -> Result<()> {
    let config_dir = config_dir();
    tokio::fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        warn!("Config already exists at {}", config_path.display());
    } else {
        let default_config = include_str!("../../../config/default.toml");
        tokio::fs::write(&config_path, default_config).await?;
        info!("Created default config at {}", config_path.display());
    }

    println!("Wisp initialized at {}", config_dir.display());
    println!(
        "Edit {} to configure your API keys and Twilio credentials.",
        config_path.display()
    );
    Ok(())
}

fn cmd_config(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = WispConfig::load(config_path)?;
    println!("{}", toml::to_string_pretty(&cfg)?);
    Ok(())
}

async fn cmd_auth(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = WispConfig::load(config_path)?;
    let resolver = CredentialResolver::from_env(
        shellexpand(&cfg.google.token_file),
        shellexpand(&cfg.google.client_secrets_file),
    );
    match resolver.resolve().await? {
        GoogleCredentials::User(token) => {
            println!("Authorized with a user token.");
            if let Some(expiry) = token.expiry {
                println!("Access token expires at {}.", expiry);
            }
        }
        GoogleCredentials::ServiceAccount(key) => {
            println!("Using service account {}.", key.client_email);
        }
    }
    Ok(())
}

async fn cmd_ask(config_path: &Option<PathBuf>, message: &str) -> Result<()> {
    let cfg = WispConfig::load(config_path)?;
    let assistant = build_assistant(&cfg)?;
    let reply = assistant.reply_to(message).await?;
    println!("{reply}");
    Ok(())
}

async fn cmd_start(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = WispConfig::load(config_path)?;
    info!("Starting wisp...");

    let assistant = Arc::new(build_assistant(&cfg)?);

    if !cfg.channels.whatsapp.enabled {
        bail!("The WhatsApp channel is disabled in the config; nothing to serve");
    }
    let channel = Arc::new(WhatsAppChannel::new(
        shellexpand_str(&cfg.channels.whatsapp.account_sid),
        shellexpand_str(&cfg.channels.whatsapp.auth_token),
        shellexpand_str(&cfg.channels.whatsapp.from_number),
    )?);
    info!("WhatsApp channel initialized");

    let bind: SocketAddr = cfg
        .gateway
        .bind
        .parse()
        .with_context(|| format!("Invalid gateway bind address: {}", cfg.gateway.bind))?;
    let server = WebhookServer::new(bind, assistant, channel);

    println!("Wisp is running on {bind}. Press Ctrl+C to stop.");
    tokio::select! {
        result = server.run() => result,
        _ = signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    }
}

/// Wire the assistant from configuration: providers, sub-agents, tools, store
fn build_assistant(cfg: &WispConfig) -> Result<Assistant> {
    let keys = cfg.providers.resolve_keys();
    let registry = Arc::new(ProviderRegistry::new(keys));

    let provider = registry.build(&cfg.agent.model, cfg.agent.temperature)?;
    info!("Model provider initialized ({})", cfg.agent.model);

    let store = Arc::new(ConversationStore::open(&shellexpand(&cfg.memory.db_path))?);

    let system_prompt = std::fs::read_to_string(shellexpand(&cfg.agent.system_prompt_file))
        .unwrap_or_else(|_| DEFAULT_SYSTEM_PROMPT.to_string());

    // Sub-agents run their fallback loop without tools; in particular,
    // send_message is never available to them.
    let subagent_tools = Arc::new(ToolRegistry::new());
    let router = Arc::new(SubAgentRouter::new(
        cfg.subagents.clone(),
        registry.clone() as Arc<dyn ProviderFactory>,
        subagent_tools,
    ));
    if !cfg.subagents.is_empty() {
        info!("Registered {} sub-agents", cfg.subagents.len());
    }

    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(SendMessageTool::new(router)));

    Ok(Assistant::new(
        provider,
        Arc::new(tools),
        system_prompt,
        store,
        cfg.agent.thread_id.clone(),
    )
    .with_history_limit(cfg.agent.history_limit))
}
