use serde_json::Value;
use tracing::{info, warn};

use super::{AccountError, Accounts};
use crate::monitoring::validation::{
    ID_LENGTH, confirm_fixed_len, confirm_method, confirm_protocol, confirm_success_codes, confirm_timeout_seconds,
    confirm_url,
};
use crate::store::models::{Check, Token, User};
use crate::store::{Collection, RecordStoreExt};

fn confirm_check_id(value: Option<&Value>) -> Result<String, AccountError> {
    confirm_fixed_len(value, ID_LENGTH).ok_or_else(|| AccountError::invalid(&["id"]))
}

impl Accounts {
    /// Register a new check for the token's owner, up to `max_checks` per user.
    pub async fn create_check(&self, token_id: &str, payload: &Value) -> Result<Check, AccountError> {
        let protocol = confirm_protocol(payload.get("protocol"));
        let url = confirm_url(payload.get("url"));
        let method = confirm_method(payload.get("method"));
        let success_codes = confirm_success_codes(payload.get("successCodes"));
        let timeout_seconds = confirm_timeout_seconds(payload.get("timeoutSeconds"));

        let (Some(protocol), Some(url), Some(method), Some(success_codes), Some(timeout_seconds)) =
            (protocol, url.clone(), method, success_codes.clone(), timeout_seconds)
        else {
            let invalid: Vec<&str> = [
                ("protocol", protocol.is_none()),
                ("url", url.is_none()),
                ("method", method.is_none()),
                ("successCodes", success_codes.is_none()),
                ("timeoutSeconds", timeout_seconds.is_none()),
            ]
            .into_iter()
            .filter_map(|(name, invalid)| invalid.then_some(name))
            .collect();
            return Err(AccountError::invalid(&invalid));
        };

        let token: Token = self
            .store
            .read_as(Collection::Tokens, token_id)
            .await
            .map_err(|_| AccountError::Auth("unknown token"))?;
        if !token.is_valid_at(Self::now_ms()) {
            return Err(AccountError::Auth("token expired"));
        }

        let _user_lock = self.users.lock(&token.phone_number).await;
        let mut user: User =
            self.store.read_as(Collection::Users, &token.phone_number).await.map_err(AccountError::missing("User"))?;
        if user.checks.len() >= self.settings.max_checks {
            return Err(AccountError::LimitReached { max: self.settings.max_checks });
        }

        let check = Check {
            id: self.credentials.random_id(ID_LENGTH),
            phone_number: user.phone_number.clone(),
            protocol,
            url,
            method,
            success_codes,
            timeout_seconds,
            state: None,
            last_checked: None,
        };
        self.store.create_from(Collection::Checks, &check.id, &check).await?;

        user.checks.push(check.id.clone());
        if let Err(e) = self.store.update_from(Collection::Users, &user.phone_number, &user).await {
            // Without the back-reference the check would be orphaned.
            if let Err(cleanup) = self.store.delete(Collection::Checks, &check.id).await {
                warn!(check_id = %check.id, "Failed to remove orphaned check: {}", cleanup);
            }
            return Err(AccountError::Store(e));
        }

        info!(check_id = %check.id, phone_number = %check.phone_number, "Check created");
        Ok(check)
    }

    /// Read a check owned by the token's user.
    pub async fn get_check(&self, token_id: &str, check_id: &str) -> Result<Check, AccountError> {
        let check_id = confirm_check_id(Some(&Value::from(check_id)))?;
        let check: Check = self.store.read_as(Collection::Checks, &check_id).await.map_err(AccountError::missing("Check"))?;
        self.authorize(token_id, &check.phone_number).await?;
        Ok(check)
    }

    /// Edit any of the probe settings of check `id`. Provided fields must be
    /// valid, at least one must be present.
    pub async fn update_check(&self, token_id: &str, payload: &Value) -> Result<Check, AccountError> {
        let check_id = confirm_check_id(payload.get("id"))?;

        let mut invalid = Vec::new();
        let mut provided = 0;
        macro_rules! optional {
            ($name:literal, $confirm:expr) => {
                match payload.get($name) {
                    None => None,
                    Some(raw) => {
                        provided += 1;
                        let confirmed = $confirm(Some(raw));
                        if confirmed.is_none() {
                            invalid.push($name);
                        }
                        confirmed
                    }
                }
            };
        }
        let protocol = optional!("protocol", confirm_protocol);
        let url = optional!("url", confirm_url);
        let method = optional!("method", confirm_method);
        let success_codes = optional!("successCodes", confirm_success_codes);
        let timeout_seconds = optional!("timeoutSeconds", confirm_timeout_seconds);

        if provided == 0 {
            return Err(AccountError::invalid(&["protocol", "url", "method", "successCodes", "timeoutSeconds"]));
        }
        if !invalid.is_empty() {
            return Err(AccountError::invalid(&invalid));
        }

        let mut check: Check =
            self.store.read_as(Collection::Checks, &check_id).await.map_err(AccountError::missing("Check"))?;
        self.authorize(token_id, &check.phone_number).await?;

        if let Some(protocol) = protocol {
            check.protocol = protocol;
        }
        if let Some(url) = url {
            check.url = url;
        }
        if let Some(method) = method {
            check.method = method;
        }
        if let Some(success_codes) = success_codes {
            check.success_codes = success_codes;
        }
        if let Some(timeout_seconds) = timeout_seconds {
            check.timeout_seconds = timeout_seconds;
        }

        self.store.update_from(Collection::Checks, &check_id, &check).await.map_err(AccountError::missing("Check"))?;
        Ok(check)
    }

    /// Delete a check and drop it from its owner's list.
    pub async fn delete_check(&self, token_id: &str, check_id: &str) -> Result<(), AccountError> {
        let check = self.get_check(token_id, check_id).await?;
        let _user_lock = self.users.lock(&check.phone_number).await;
        self.store.delete(Collection::Checks, &check.id).await.map_err(AccountError::missing("Check"))?;

        match self.store.read_as::<User>(Collection::Users, &check.phone_number).await {
            Ok(mut user) => {
                user.checks.retain(|id| *id != check.id);
                self.store.update_from(Collection::Users, &user.phone_number, &user).await?;
            }
            Err(e) if e.is_not_found() => {
                warn!(check_id = %check.id, "Deleted check had no owner record");
            }
            Err(e) => return Err(e.into()),
        }

        info!(check_id = %check.id, "Check deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::accounts::AccountSettings;
    use crate::accounts::HmacCredentials;
    use crate::accounts::testing::{PHONE, accounts, logged_in, new_check};
    use crate::monitoring::types::{HttpMethod, Protocol};
    use crate::store::{FileStore, MemoryStore, RecordStore};

    #[tokio::test]
    async fn test_create_check_links_owner() {
        let store = Arc::new(MemoryStore::new());
        let accounts = accounts(store.clone());
        let token = logged_in(&accounts).await;

        let check = accounts.create_check(&token, &new_check()).await.unwrap();

        assert_eq!(check.id.len(), ID_LENGTH);
        assert_eq!(check.phone_number, PHONE);
        assert_eq!(check.state, None);
        let user: User = store.read_as(Collection::Users, PHONE).await.unwrap();
        assert_eq!(user.checks, [check.id.clone()]);
        assert_eq!(accounts.get_check(&token, &check.id).await.unwrap(), check);
    }

    #[tokio::test]
    async fn test_create_check_enforces_limit() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let accounts = Accounts::new(
            store.clone(),
            Arc::new(HmacCredentials::new("k")),
            AccountSettings { max_checks: 2, ..AccountSettings::default() },
        );
        let token = logged_in(&accounts).await;

        accounts.create_check(&token, &new_check()).await.unwrap();
        accounts.create_check(&token, &new_check()).await.unwrap();
        let third = accounts.create_check(&token, &new_check()).await;

        assert!(matches!(third, Err(AccountError::LimitReached { max: 2 })));
        assert_eq!(store.list(Collection::Checks).await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_respect_limit_and_stay_linked() {
        let dir = tempfile::tempdir().unwrap();
        let file_store = FileStore::new(dir.path().join("data"));
        file_store.initialize().await.unwrap();
        let store: Arc<dyn RecordStore> = Arc::new(file_store);
        let accounts = Arc::new(Accounts::new(
            store.clone(),
            Arc::new(HmacCredentials::new("k")),
            AccountSettings { max_checks: 2, ..AccountSettings::default() },
        ));
        let token = logged_in(&accounts).await;

        let attempts = (0..8).map(|_| {
            let accounts = accounts.clone();
            let token = token.clone();
            tokio::spawn(async move { accounts.create_check(&token, &new_check()).await })
        });
        let results = futures::future::join_all(attempts).await;

        let created = results.iter().filter(|r| matches!(r, Ok(Ok(_)))).count();
        let limited = results.iter().filter(|r| matches!(r, Ok(Err(AccountError::LimitReached { max: 2 })))).count();
        assert_eq!((created, limited), (2, 6));

        let user: User = store.read_as(Collection::Users, PHONE).await.unwrap();
        let mut linked = user.checks.clone();
        linked.sort();
        assert_eq!(linked, store.list(Collection::Checks).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_deletes_keep_remaining_links() {
        let store = Arc::new(MemoryStore::new());
        let accounts = Arc::new(accounts(store.clone()));
        let token = logged_in(&accounts).await;
        let mut ids = Vec::new();
        for _ in 0..4 {
            ids.push(accounts.create_check(&token, &new_check()).await.unwrap().id);
        }
        let keep = ids.pop().unwrap();

        let deletions = ids.into_iter().map(|id| {
            let accounts = accounts.clone();
            let token = token.clone();
            tokio::spawn(async move { accounts.delete_check(&token, &id).await })
        });
        for result in futures::future::join_all(deletions).await {
            result.unwrap().unwrap();
        }

        let user: User = store.read_as(Collection::Users, PHONE).await.unwrap();
        assert_eq!(user.checks, [keep]);
    }

    #[tokio::test]
    async fn test_create_check_validation() {
        let accounts = accounts(Arc::new(MemoryStore::new()));
        let token = logged_in(&accounts).await;
        let mut payload = new_check();
        payload["timeoutSeconds"] = json!(10);
        payload["method"] = json!("head");

        match accounts.create_check(&token, &payload).await {
            Err(AccountError::Validation(fields)) => assert_eq!(fields, "method, timeoutSeconds"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_check_requires_token() {
        let accounts = accounts(Arc::new(MemoryStore::new()));
        logged_in(&accounts).await;
        let result = accounts.create_check(&"z".repeat(20), &new_check()).await;
        assert!(matches!(result, Err(AccountError::Auth(_))));
    }

    #[tokio::test]
    async fn test_foreign_token_cannot_read_check() {
        let accounts = accounts(Arc::new(MemoryStore::new()));
        let token = logged_in(&accounts).await;
        let check = accounts.create_check(&token, &new_check()).await.unwrap();

        let mut other = crate::accounts::testing::signup();
        other["phoneNumber"] = json!("5559876543");
        accounts.create_user(&other).await.unwrap();
        let intruder = accounts
            .issue_token(&json!({"phoneNumber": "5559876543", "password": "correct horse"}))
            .await
            .unwrap();

        assert!(matches!(accounts.get_check(&intruder.id, &check.id).await, Err(AccountError::Auth(_))));
        assert!(matches!(accounts.delete_check(&intruder.id, &check.id).await, Err(AccountError::Auth(_))));
    }

    #[tokio::test]
    async fn test_update_check() {
        let accounts = accounts(Arc::new(MemoryStore::new()));
        let token = logged_in(&accounts).await;
        let check = accounts.create_check(&token, &new_check()).await.unwrap();

        let updated = accounts
            .update_check(&token, &json!({"id": &check.id, "protocol": "https", "method": "post"}))
            .await
            .unwrap();
        assert_eq!(updated.protocol, Protocol::Https);
        assert_eq!(updated.method, HttpMethod::Post);
        assert_eq!(updated.url, "example.com");

        let bad = accounts.update_check(&token, &json!({"id": &check.id, "url": "ok.com", "timeoutSeconds": 0})).await;
        assert!(matches!(bad, Err(AccountError::Validation(fields)) if fields == "timeoutSeconds"));

        let empty = accounts.update_check(&token, &json!({"id": &check.id})).await;
        assert!(matches!(empty, Err(AccountError::Validation(_))));
    }

    #[tokio::test]
    async fn test_delete_check_unlinks_owner() {
        let store = Arc::new(MemoryStore::new());
        let accounts = accounts(store.clone());
        let token = logged_in(&accounts).await;
        let keep = accounts.create_check(&token, &new_check()).await.unwrap();
        let gone = accounts.create_check(&token, &new_check()).await.unwrap();

        accounts.delete_check(&token, &gone.id).await.unwrap();

        let user: User = store.read_as(Collection::Users, PHONE).await.unwrap();
        assert_eq!(user.checks, [keep.id]);
        assert!(matches!(accounts.get_check(&token, &gone.id).await, Err(AccountError::NotFound("Check"))));
    }
}
