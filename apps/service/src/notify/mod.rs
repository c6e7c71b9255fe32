//! Notification sinks for state-change alerts.
//!
//! Delivery is best-effort: callers log a [`DeliveryError`] and move on, no
//! sink retries.

pub mod sms;

pub use sms::{SmsNotifier, SmsSettings};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Refusing to send: {0}")]
    InvalidMessage(String),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Provider rejected the message with HTTP {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, destination: &str, message: &str) -> Result<(), DeliveryError>;
}

/// Sink used when no SMS provider is configured: alerts only reach the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, destination: &str, message: &str) -> Result<(), DeliveryError> {
        tracing::info!(destination, "Alert: {}", message);
        Ok(())
    }
}
