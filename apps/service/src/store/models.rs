//! Documents persisted in the record store.
//!
//! Field names are serialized in camelCase so the files stay readable by any
//! tooling that already knows the `phoneNumber` / `successCodes` layout.

use serde::{Deserialize, Serialize};

use crate::monitoring::types::{CheckState, HttpMethod, Protocol};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    /// Hex digest produced by the credential capability, never the secret.
    pub password: String,
    #[serde(default)]
    pub checks: Vec<String>,
}

/// Session token issued on login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub id: String,
    pub phone_number: String,
    /// Absolute expiry, epoch milliseconds.
    pub expires: i64,
}

impl Token {
    /// A token is usable strictly before its expiry.
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        self.expires > now_ms
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    pub id: String,
    pub phone_number: String,
    pub protocol: Protocol,
    pub url: String,
    pub method: HttpMethod,
    pub success_codes: Vec<u16>,
    pub timeout_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<CheckState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<i64>,
}

impl Check {
    /// `protocol://url`, the target the probe requests.
    pub fn target(&self) -> String {
        format!("{}://{}", self.protocol, self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn check_serializes_with_camel_case_and_omits_unprobed_fields() {
        let check = Check {
            id: "abcdefghij0123456789".into(),
            phone_number: "5551234567".into(),
            protocol: Protocol::Http,
            url: "example.com".into(),
            method: HttpMethod::Get,
            success_codes: vec![200],
            timeout_seconds: 3,
            state: None,
            last_checked: None,
        };

        let value = serde_json::to_value(&check).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "abcdefghij0123456789",
                "phoneNumber": "5551234567",
                "protocol": "http",
                "url": "example.com",
                "method": "get",
                "successCodes": [200],
                "timeoutSeconds": 3
            })
        );
        assert_eq!(check.target(), "http://example.com");
    }

    #[test]
    fn user_without_checks_field_defaults_to_empty() {
        let user: User = serde_json::from_value(json!({
            "phoneNumber": "5551234567",
            "firstName": "Ada",
            "lastName": "Lovelace",
            "password": "deadbeef"
        }))
        .unwrap();
        assert!(user.checks.is_empty());
    }

    #[test]
    fn token_expiry_is_strict() {
        let token = Token { id: "t".repeat(20), phone_number: "5551234567".into(), expires: 1_000 };
        assert!(token.is_valid_at(999));
        assert!(!token.is_valid_at(1_000));
    }
}
