//! Shared message types for wisp-core

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Incoming message from a channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub id: String,
    pub sender: String,
    pub content: String,
    pub channel: ChannelType,
    pub timestamp: DateTime<Utc>,
}

/// Outgoing message to be delivered through a channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Raw destination identifier; channels normalize it to their own form
    pub destination: String,
    pub content: String,
    pub channel: ChannelType,
}

/// Type of communication channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    WhatsApp,
    Internal, // for one-shot CLI invocations
}

impl ChannelType {
    /// Parse a channel type from a string
    pub fn from_string(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "whatsapp" => Self::WhatsApp,
            _ => Self::Internal,
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WhatsApp => write!(f, "whatsapp"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Anything that can turn an incoming message into a reply.
///
/// The gateway only depends on this seam, so tests can stand in a mock
/// without touching a model provider.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_message(&self, msg: IncomingMessage) -> Result<OutgoingMessage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_type_display() {
        assert_eq!(ChannelType::WhatsApp.to_string(), "whatsapp");
        assert_eq!(ChannelType::Internal.to_string(), "internal");
    }

    #[test]
    fn test_channel_type_from_string() {
        assert_eq!(ChannelType::from_string("whatsapp"), ChannelType::WhatsApp);
        assert_eq!(ChannelType::from_string("WhatsApp"), ChannelType::WhatsApp);
        assert_eq!(ChannelType::from_string("sms"), ChannelType::Internal);
    }
}
