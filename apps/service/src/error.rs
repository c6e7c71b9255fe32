use thiserror::Error;

use crate::{config, notify::DeliveryError, store::StoreError};

/// Startup failures of the service binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0:#}")]
    Config(#[from] config::Error),
    #[error("Store initialization failed: {0}")]
    Store(#[from] StoreError),
    #[error("HTTP client setup failed: {0}")]
    Client(#[from] reqwest::Error),
    #[error("Notifier setup failed: {0}")]
    Notifier(#[from] DeliveryError),
    #[error("Invalid logging format: {0}")]
    LogFormat(String),
}
