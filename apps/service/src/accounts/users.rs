use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::{AccountError, Accounts};
use crate::monitoring::validation::{PHONE_NUMBER_LENGTH, confirm_fixed_len, confirm_non_empty};
use crate::store::models::User;
use crate::store::{Collection, RecordStoreExt};

/// A user as returned to its owner, without the password digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    pub checks: Vec<String>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            phone_number: user.phone_number,
            first_name: user.first_name,
            last_name: user.last_name,
            checks: user.checks,
        }
    }
}

/// Result of a cascading user delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserDeletion {
    pub checks_deleted: usize,
    pub checks_failed: usize,
}

impl UserDeletion {
    pub fn is_complete(&self) -> bool {
        self.checks_failed == 0
    }
}

fn phone_number(payload: &Value) -> Option<String> {
    confirm_fixed_len(payload.get("phoneNumber"), PHONE_NUMBER_LENGTH)
}

impl Accounts {
    /// Sign up. Requires names, a 10 character phone number, a password and
    /// `tosAgreement: true`.
    pub async fn create_user(&self, payload: &Value) -> Result<UserProfile, AccountError> {
        let first_name = confirm_non_empty(payload.get("firstName"));
        let last_name = confirm_non_empty(payload.get("lastName"));
        let phone_number = phone_number(payload);
        let password = confirm_non_empty(payload.get("password"));
        let tos_agreement = payload.get("tosAgreement").and_then(Value::as_bool) == Some(true);

        let (Some(first_name), Some(last_name), Some(phone_number), Some(password), true) =
            (first_name.clone(), last_name.clone(), phone_number.clone(), password.clone(), tos_agreement)
        else {
            let invalid: Vec<&str> = [
                ("firstName", first_name.is_none()),
                ("lastName", last_name.is_none()),
                ("phoneNumber", phone_number.is_none()),
                ("password", password.is_none()),
                ("tosAgreement", !tos_agreement),
            ]
            .into_iter()
            .filter_map(|(name, invalid)| invalid.then_some(name))
            .collect();
            return Err(AccountError::invalid(&invalid));
        };

        let user = User {
            password: self.credentials.hash(&password)?,
            phone_number,
            first_name,
            last_name,
            checks: Vec::new(),
        };

        self.store.create_from(Collection::Users, &user.phone_number, &user).await.map_err(|e| {
            if e.is_already_exists() { AccountError::AlreadyExists("User") } else { AccountError::Store(e) }
        })?;

        info!(phone_number = %user.phone_number, "User created");
        Ok(user.into())
    }

    pub async fn get_user(&self, token_id: &str, phone_number: &str) -> Result<UserProfile, AccountError> {
        self.authorize(token_id, phone_number).await?;
        let user: User = self.store.read_as(Collection::Users, phone_number).await.map_err(AccountError::missing("User"))?;
        Ok(user.into())
    }

    /// Change any of `firstName`, `lastName`, `password` for `phoneNumber`.
    pub async fn update_user(&self, token_id: &str, payload: &Value) -> Result<UserProfile, AccountError> {
        let phone_number = phone_number(payload).ok_or_else(|| AccountError::invalid(&["phoneNumber"]))?;
        let first_name = confirm_non_empty(payload.get("firstName"));
        let last_name = confirm_non_empty(payload.get("lastName"));
        let password = confirm_non_empty(payload.get("password"));
        if first_name.is_none() && last_name.is_none() && password.is_none() {
            return Err(AccountError::invalid(&["firstName", "lastName", "password"]));
        }

        self.authorize(token_id, &phone_number).await?;
        let _user_lock = self.users.lock(&phone_number).await;
        let mut user: User =
            self.store.read_as(Collection::Users, &phone_number).await.map_err(AccountError::missing("User"))?;

        if let Some(first_name) = first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = last_name {
            user.last_name = last_name;
        }
        if let Some(password) = password {
            user.password = self.credentials.hash(&password)?;
        }

        self.store.update_from(Collection::Users, &phone_number, &user).await.map_err(AccountError::missing("User"))?;
        Ok(user.into())
    }

    /// Delete a user and every check it owns.
    ///
    /// The user record goes first. Check deletions then run concurrently and
    /// failures are counted rather than aborting the rest; a check that is
    /// already gone counts as deleted.
    pub async fn delete_user(&self, token_id: &str, phone_number: &str) -> Result<UserDeletion, AccountError> {
        self.authorize(token_id, phone_number).await?;
        let _user_lock = self.users.lock(phone_number).await;
        let user: User = self.store.read_as(Collection::Users, phone_number).await.map_err(AccountError::missing("User"))?;
        self.store.delete(Collection::Users, phone_number).await.map_err(AccountError::missing("User"))?;

        let deletions = user.checks.iter().map(|check_id| async move {
            match self.store.delete(Collection::Checks, check_id).await {
                Ok(()) => true,
                Err(e) if e.is_not_found() => true,
                Err(e) => {
                    warn!(check_id = %check_id, "Failed to delete check of removed user: {}", e);
                    false
                }
            }
        });
        let results = join_all(deletions).await;

        let checks_deleted = results.iter().filter(|deleted| **deleted).count();
        let outcome = UserDeletion { checks_deleted, checks_failed: results.len() - checks_deleted };
        info!(phone_number, checks_deleted, checks_failed = outcome.checks_failed, "User deleted");
        Ok(outcome)
    }
}
