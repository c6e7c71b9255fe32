use serde_json::Value;
use tracing::info;

use super::{AccountError, Accounts};
use crate::monitoring::validation::{ID_LENGTH, PHONE_NUMBER_LENGTH, confirm_fixed_len, confirm_non_empty};
use crate::store::models::{Token, User};
use crate::store::{Collection, RecordStoreExt};

impl Accounts {
    /// Log in with `phoneNumber` and `password`.
    pub async fn issue_token(&self, payload: &Value) -> Result<Token, AccountError> {
        let phone_number = confirm_fixed_len(payload.get("phoneNumber"), PHONE_NUMBER_LENGTH);
        let password = confirm_non_empty(payload.get("password"));
        let (Some(phone_number), Some(password)) = (phone_number, password) else {
            return Err(AccountError::invalid(&["phoneNumber", "password"]));
        };

        let user: User = self.store.read_as(Collection::Users, &phone_number).await.map_err(AccountError::missing("User"))?;
        if !self.credentials.verify(&password, &user.password) {
            return Err(AccountError::Auth("invalid credentials"));
        }

        let token = Token { id: self.credentials.random_id(ID_LENGTH), phone_number, expires: self.token_expiry() };
        self.store.create_from(Collection::Tokens, &token.id, &token).await?;

        info!(phone_number = %token.phone_number, "Token issued");
        Ok(token)
    }

    pub async fn get_token(&self, token_id: &str) -> Result<Token, AccountError> {
        let token_id = confirm_fixed_len(Some(&Value::from(token_id)), ID_LENGTH)
            .ok_or_else(|| AccountError::invalid(&["tokenId"]))?;
        self.store.read_as(Collection::Tokens, &token_id).await.map_err(AccountError::missing("Token"))
    }

    /// Push a live token's expiry one TTL from now. Requires `extend: true`.
    /// Expired tokens cannot be revived.
    pub async fn extend_token(&self, payload: &Value) -> Result<Token, AccountError> {
        let token_id = confirm_fixed_len(payload.get("tokenId"), ID_LENGTH);
        let extend = payload.get("extend").and_then(Value::as_bool) == Some(true);
        let (Some(token_id), true) = (token_id, extend) else {
            return Err(AccountError::invalid(&["tokenId", "extend"]));
        };

        let mut token: Token =
            self.store.read_as(Collection::Tokens, &token_id).await.map_err(AccountError::missing("Token"))?;
        if !token.is_valid_at(Self::now_ms()) {
            return Err(AccountError::Auth("token expired"));
        }

        token.expires = self.token_expiry();
        self.store.update_from(Collection::Tokens, &token_id, &token).await.map_err(AccountError::missing("Token"))?;
        Ok(token)
    }

    /// Log out.
    pub async fn revoke_token(&self, token_id: &str) -> Result<(), AccountError> {
        let token = self.get_token(token_id).await?;
        self.store.delete(Collection::Tokens, &token.id).await.map_err(AccountError::missing("Token"))
    }
}
