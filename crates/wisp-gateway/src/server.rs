//! Webhook server — receives WhatsApp messages and schedules replies

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::dispatch::Dispatcher;
use wisp_channels::whatsapp::normalize_destination;
use wisp_channels::MessageChannel;
use wisp_core::types::{ChannelType, IncomingMessage, MessageHandler};

/// Fixed acknowledgement body returned to every webhook call
pub const ACK_BODY: &str = "Message received";

/// Shared state for the webhook handlers
#[derive(Clone)]
pub struct GatewayState {
    pub handler: Arc<dyn MessageHandler>,
    pub outbound: Arc<dyn MessageChannel>,
    pub dispatcher: Dispatcher,
}

/// The webhook server
pub struct WebhookServer {
    state: GatewayState,
    bind: SocketAddr,
}

impl WebhookServer {
    /// Create a new webhook server
    pub fn new(
        bind: SocketAddr,
        handler: Arc<dyn MessageHandler>,
        outbound: Arc<dyn MessageChannel>,
    ) -> Self {
        let state = GatewayState {
            handler,
            outbound,
            dispatcher: Dispatcher::new(),
        };
        Self { state, bind }
    }

    /// Build the Axum router
    pub fn router(&self) -> Router {
        Router::new()
            .route("/whatsapp/webhook", post(webhook_handler))
            .route("/", get(root_handler))
            .with_state(self.state.clone())
    }

    /// Start the server (blocks until shutdown)
    pub async fn run(self) -> anyhow::Result<()> {
        let router = self.router();
        let listener = tokio::net::TcpListener::bind(self.bind).await?;
        info!("Webhook gateway listening on {}", self.bind);
        axum::serve(listener, router).await?;
        Ok(())
    }

    /// Start the server in the background, returning a handle
    pub fn spawn(self) -> tokio::task::JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

/// Form fields Twilio posts for an inbound message
#[derive(Debug, Deserialize)]
pub struct TwilioForm {
    #[serde(rename = "Body")]
    pub body: String,
    #[serde(rename = "From")]
    pub from: String,
}

/// Webhook endpoint: acknowledge immediately, process in the background.
/// The response is the fixed 200 regardless of downstream outcome.
async fn webhook_handler(
    State(state): State<GatewayState>,
    Form(form): Form<TwilioForm>,
) -> impl IntoResponse {
    info!(
        "Message received from {}: {}",
        form.from,
        preview(&form.body)
    );
    let label = format!("whatsapp-reply:{}", form.from);
    state
        .dispatcher
        .spawn(label, process_message(state.clone(), form.from, form.body));
    (StatusCode::OK, ACK_BODY)
}

/// The background unit: invoke the assistant and deliver the reply
async fn process_message(state: GatewayState, from: String, body: String) -> anyhow::Result<()> {
    let incoming = IncomingMessage {
        id: Uuid::new_v4().to_string(),
        sender: from,
        content: body,
        channel: ChannelType::WhatsApp,
        timestamp: Utc::now(),
    };

    let mut reply = state.handler.handle_message(incoming).await?;
    reply.destination = normalize_destination(&reply.destination);

    let sid = state.outbound.send(&reply).await?;
    info!("Reply delivered to {} (sid={})", reply.destination, sid);
    Ok(())
}

async fn root_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "service": "wisp",
    }))
}

/// First characters of a message for log lines, safe on multi-byte input
fn preview(content: &str) -> String {
    content.chars().take(100).collect()
}
