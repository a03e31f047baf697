//! WhatsApp channel adapter backed by Twilio's REST API

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info};

use crate::outbound::MessageChannel;
use wisp_core::types::{ChannelType, OutgoingMessage};

const DEFAULT_BASE_URL: &str = "https://api.twilio.com";

/// The destination prefix Twilio expects for WhatsApp numbers
pub const WHATSAPP_PREFIX: &str = "whatsapp:";

/// Normalize a destination identifier to Twilio's WhatsApp form. Idempotent.
pub fn normalize_destination(number: &str) -> String {
    if number.starts_with(WHATSAPP_PREFIX) {
        number.to_string()
    } else {
        format!("{WHATSAPP_PREFIX}{number}")
    }
}

/// WhatsApp channel adapter
pub struct WhatsAppChannel {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
    base_url: String,
}

impl std::fmt::Debug for WhatsAppChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppChannel")
            .field("account_sid", &self.account_sid)
            .field("from_number", &self.from_number)
            .finish()
    }
}

impl WhatsAppChannel {
    /// Create a new WhatsApp channel adapter.
    ///
    /// `from_number` is normalized to the `whatsapp:` form; the Twilio
    /// credentials must be non-empty.
    pub fn new(account_sid: String, auth_token: String, from_number: String) -> Result<Self> {
        if account_sid.is_empty() || auth_token.is_empty() {
            bail!("Twilio credentials are not configured");
        }
        if from_number.is_empty() {
            bail!("Twilio WhatsApp sender number is not configured (should include 'whatsapp:+...')");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            account_sid,
            auth_token,
            from_number: normalize_destination(&from_number),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Override the endpoint root (tests)
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Send a WhatsApp message, returning the Twilio message SID
    async fn send_text(&self, to: &str, body: &str) -> Result<String> {
        let to = normalize_destination(to);
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        );
        let params = [
            ("To", to.as_str()),
            ("From", self.from_number.as_str()),
            ("Body", body),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await
            .with_context(|| format!("Twilio send failed to {to}"))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Twilio send to {} failed with status {}: {}", to, status, error_text);
            return Err(anyhow!(
                "Twilio send to {} failed with status {}: {}",
                to,
                status,
                error_text
            ));
        }

        let result: Value = response
            .json()
            .await
            .context("Failed to parse Twilio response")?;
        let sid = result
            .get("sid")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        info!("Twilio: message sent to {}, sid={}", to, sid);
        Ok(sid)
    }
}

#[async_trait]
impl MessageChannel for WhatsAppChannel {
    async fn send(&self, msg: &OutgoingMessage) -> Result<String> {
        self.send_text(&msg.destination, &msg.content).await
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::WhatsApp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_adds_prefix() {
        assert_eq!(normalize_destination("+15551234567"), "whatsapp:+15551234567");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        assert_eq!(
            normalize_destination("whatsapp:+15551234567"),
            "whatsapp:+15551234567"
        );
    }

    #[test]
    fn test_new_normalizes_from_number() {
        let channel = WhatsAppChannel::new(
            "AC123".to_string(),
            "token".to_string(),
            "+15550001111".to_string(),
        )
        .unwrap();
        assert_eq!(channel.from_number, "whatsapp:+15550001111");
        assert_eq!(channel.channel_type(), ChannelType::WhatsApp);
    }

    #[test]
    fn test_new_rejects_missing_configuration() {
        assert!(WhatsAppChannel::new(String::new(), "t".into(), "+1555".into()).is_err());
        assert!(WhatsAppChannel::new("AC123".into(), String::new(), "+1555".into()).is_err());
        assert!(WhatsAppChannel::new("AC123".into(), "t".into(), String::new()).is_err());
    }

    #[test]
    fn test_debug_hides_auth_token() {
        let channel = WhatsAppChannel::new(
            "AC123".to_string(),
            "very-secret-token".to_string(),
            "whatsapp:+15550001111".to_string(),
        )
        .unwrap();
        let debug = format!("{:?}", channel);
        assert!(!debug.contains("very-secret-token"));
        assert!(debug.contains("AC123"));
    }
}
