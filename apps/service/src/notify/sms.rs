use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{DeliveryError, Notifier};

const DEFAULT_API_BASE: &str = "https://api.twilio.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_BODY_CHARS: usize = 1600;

/// Credentials for the Twilio Messages API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsSettings {
    pub account_sid: String,
    pub auth_token: String,
    pub from_phone: String,
    /// Only overridden in tests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

/// Delivers alerts as text messages to `+1<phoneNumber>`.
pub struct SmsNotifier {
    client: reqwest::Client,
    settings: SmsSettings,
}

impl SmsNotifier {
    pub fn new(settings: SmsSettings) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, settings })
    }

    fn messages_url(&self) -> String {
        let base = self.settings.api_base.as_deref().unwrap_or(DEFAULT_API_BASE);
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            base.trim_end_matches('/'),
            self.settings.account_sid
        )
    }
}

/// Trimmed phone number and message, or why the pair cannot be sent.
fn prepare(destination: &str, message: &str) -> Result<(String, String), DeliveryError> {
    let destination = destination.trim();
    if destination.len() != 10 || !destination.chars().all(|c| c.is_ascii_digit()) {
        return Err(DeliveryError::InvalidMessage(format!("bad phone number {destination:?}")));
    }

    let message = message.trim();
    if message.is_empty() {
        return Err(DeliveryError::InvalidMessage("empty message".into()));
    }

    let body: String = message.chars().take(MAX_BODY_CHARS).collect();
    Ok((format!("+1{destination}"), body))
}

#[async_trait]
impl Notifier for SmsNotifier {
    async fn send(&self, destination: &str, message: &str) -> Result<(), DeliveryError> {
        let (to, body) = prepare(destination, message)?;
        let form = [("From", self.settings.from_phone.as_str()), ("To", to.as_str()), ("Body", body.as_str())];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.settings.account_sid, Some(&self.settings.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(destination, status = status.as_u16(), "SMS provider rejected alert");
            return Err(DeliveryError::Rejected(status.as_u16()));
        }

        tracing::debug!(destination, "Alert delivered by SMS");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::checker::test_server;

    fn settings(api_base: Option<String>) -> SmsSettings {
        SmsSettings {
            account_sid: "AC123".into(),
            auth_token: "secret".into(),
            from_phone: "+15005550006".into(),
            api_base,
        }
    }

    #[test]
    fn test_prepare() {
        let (to, body) = prepare(" 5551234567 ", " hello ").unwrap();
        assert_eq!(to, "+15551234567");
        assert_eq!(body, "hello");

        let (_, long) = prepare("5551234567", &"x".repeat(2000)).unwrap();
        assert_eq!(long.chars().count(), MAX_BODY_CHARS);

        assert!(matches!(prepare("555", "hi"), Err(DeliveryError::InvalidMessage(_))));
        assert!(matches!(prepare("555123456x", "hi"), Err(DeliveryError::InvalidMessage(_))));
        assert!(matches!(prepare("5551234567", "  "), Err(DeliveryError::InvalidMessage(_))));
    }

    #[test]
    fn test_messages_url() {
        let notifier = SmsNotifier::new(settings(Some("http://localhost:9999/".into()))).unwrap();
        assert_eq!(notifier.messages_url(), "http://localhost:9999/2010-04-01/Accounts/AC123/Messages.json");

        let notifier = SmsNotifier::new(settings(None)).unwrap();
        assert!(notifier.messages_url().starts_with("https://api.twilio.com/"));
    }

    #[tokio::test]
    async fn test_send_accepted() {
        let addr = test_server::spawn(201, Duration::ZERO).await;
        let notifier = SmsNotifier::new(settings(Some(format!("http://{addr}")))).unwrap();

        notifier.send("5551234567", "check is down").await.unwrap();
    }

    #[tokio::test]
    async fn test_send_rejected() {
        let addr = test_server::spawn(401, Duration::ZERO).await;
        let notifier = SmsNotifier::new(settings(Some(format!("http://{addr}")))).unwrap();

        let err = notifier.send("5551234567", "check is down").await.unwrap_err();
        assert!(matches!(err, DeliveryError::Rejected(401)));
    }
}
