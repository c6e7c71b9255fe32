//! Account operations behind the users, tokens and checks endpoints.
//!
//! Inputs are decoded JSON payloads as handed over by the request layer;
//! outputs are typed records or an [`AccountError`] for the router to map
//! onto a status code.
//!
//! The worker binary only sweeps checks and never builds [`Accounts`]; the
//! `[accounts]` config section is read by whatever embeds these operations
//! behind a request router (see `Config::account_settings`).

pub mod checks;
pub mod credentials;
pub mod error;
pub mod tokens;
pub mod users;

pub use credentials::{CredentialError, Credentials, HmacCredentials};
pub use error::AccountError;
pub use users::{UserDeletion, UserProfile};

use std::sync::Arc;
use std::time::Duration;

use crate::store::{KeyLocks, RecordStore};

pub const DEFAULT_MAX_CHECKS: usize = 5;
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
pub struct AccountSettings {
    pub max_checks: usize,
    pub token_ttl: Duration,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self { max_checks: DEFAULT_MAX_CHECKS, token_ttl: DEFAULT_TOKEN_TTL }
    }
}

/// Every operation that rewrites a user document holds that user's lock, so
/// the `checks` list and the `max_checks` gate see one writer at a time.
pub struct Accounts {
    store: Arc<dyn RecordStore>,
    credentials: Arc<dyn Credentials>,
    settings: AccountSettings,
    users: KeyLocks,
}

impl Accounts {
    pub fn new(store: Arc<dyn RecordStore>, credentials: Arc<dyn Credentials>, settings: AccountSettings) -> Self {
        Self { store, credentials, settings, users: KeyLocks::new() }
    }

    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn token_expiry(&self) -> i64 {
        let ttl_ms = i64::try_from(self.settings.token_ttl.as_millis()).unwrap_or(i64::MAX);
        Self::now_ms().saturating_add(ttl_ms)
    }

    async fn authorize(&self, token_id: &str, phone_number: &str) -> Result<(), AccountError> {
        if self.store.verify_token(token_id, phone_number).await {
            Ok(())
        } else {
            Err(AccountError::Auth("invalid, expired or foreign token"))
        }
    }
}
