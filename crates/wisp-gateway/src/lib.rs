//! Webhook gateway for wisp — Axum-based HTTP server
//!
//! Receives Twilio WhatsApp webhooks, acknowledges immediately, and hands
//! the actual work to detached background units.

pub mod dispatch;
pub mod server;

pub use dispatch::Dispatcher;
pub use server::{WebhookServer, ACK_BODY};
