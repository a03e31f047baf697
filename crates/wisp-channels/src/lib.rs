//! Outbound channel adapters for wisp
//!
//! This crate provides the outbound delivery abstraction and the WhatsApp
//! adapter backed by Twilio's REST API.

pub mod outbound;
pub mod whatsapp;

// Re-export main types
pub use outbound::MessageChannel;
pub use whatsapp::{WhatsAppChannel, normalize_destination};
