//! Outbound delivery abstraction

use anyhow::Result;
use async_trait::async_trait;
use wisp_core::types::{ChannelType, OutgoingMessage};

/// Trait that all outbound channel adapters implement.
///
/// Inbound delivery is not part of this seam: messages arrive through the
/// webhook gateway, pushed by the provider.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Deliver a message, returning the provider-assigned message id
    async fn send(&self, msg: &OutgoingMessage) -> Result<String>;

    /// Which channel type this adapter handles
    fn channel_type(&self) -> ChannelType;
}
