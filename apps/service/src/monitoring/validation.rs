//! Sanitization of raw check records before they are scheduled.
//!
//! Records on disk may have been written by older builds or edited by hand,
//! so every field is confirmed independently. An invalid field is kept as
//! `None` and reported by name.

use std::fmt;

use serde_json::Value;

use super::types::{CheckState, HttpMethod, Protocol};
use crate::store::models::Check;

pub const ID_LENGTH: usize = 20;
pub const PHONE_NUMBER_LENGTH: usize = 10;
pub const MIN_TIMEOUT_SECONDS: u64 = 1;
pub const MAX_TIMEOUT_SECONDS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub id: Option<String>,
    pub fields: Vec<&'static str>,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Check {} is not schedulable, invalid fields: {}",
            self.id.as_deref().unwrap_or("<unknown>"),
            self.fields.join(", ")
        )
    }
}

impl std::error::Error for Rejection {}

/// A check record after field-by-field confirmation.
///
/// `None` in a required field means the stored value was invalid. For `state`
/// it means the check was never probed, for `last_checked` that it never ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizedCheck {
    pub id: Option<String>,
    pub phone_number: Option<String>,
    pub protocol: Option<Protocol>,
    pub url: Option<String>,
    pub method: Option<HttpMethod>,
    pub success_codes: Option<Vec<u16>>,
    pub timeout_seconds: Option<u64>,
    pub state: Option<CheckState>,
    pub last_checked: Option<i64>,
}

impl SanitizedCheck {
    pub fn from_record(raw: &Value) -> Self {
        let field = |name: &str| raw.get(name);

        Self {
            id: confirm_fixed_len(field("id"), ID_LENGTH),
            phone_number: confirm_fixed_len(field("phoneNumber"), PHONE_NUMBER_LENGTH),
            protocol: confirm_protocol(field("protocol")),
            url: confirm_url(field("url")),
            method: confirm_method(field("method")),
            success_codes: confirm_success_codes(field("successCodes")),
            timeout_seconds: confirm_timeout_seconds(field("timeoutSeconds")),
            state: confirm_state(field("state")),
            last_checked: confirm_last_checked(field("lastChecked")),
        }
    }

    pub fn invalid_fields(&self) -> Vec<&'static str> {
        let required = [
            ("id", self.id.is_none()),
            ("phoneNumber", self.phone_number.is_none()),
            ("protocol", self.protocol.is_none()),
            ("url", self.url.is_none()),
            ("method", self.method.is_none()),
            ("successCodes", self.success_codes.is_none()),
            ("timeoutSeconds", self.timeout_seconds.is_none()),
        ];
        required.into_iter().filter(|(_, invalid)| *invalid).map(|(name, _)| name).collect()
    }

    pub fn into_check(self) -> Result<Check, Rejection> {
        match self {
            SanitizedCheck {
                id: Some(id),
                phone_number: Some(phone_number),
                protocol: Some(protocol),
                url: Some(url),
                method: Some(method),
                success_codes: Some(success_codes),
                timeout_seconds: Some(timeout_seconds),
                state,
                last_checked,
            } => Ok(Check {
                id,
                phone_number,
                protocol,
                url,
                method,
                success_codes,
                timeout_seconds,
                state,
                last_checked,
            }),
            other => Err(Rejection { fields: other.invalid_fields(), id: other.id }),
        }
    }
}

/// Sanitize a raw record into a schedulable check.
pub fn validate_check(raw: &Value) -> Result<Check, Rejection> {
    SanitizedCheck::from_record(raw).into_check()
}

/// Trimmed string of exactly `len` characters.
pub fn confirm_fixed_len(value: Option<&Value>, len: usize) -> Option<String> {
    let trimmed = value?.as_str()?.trim();
    (trimmed.chars().count() == len).then(|| trimmed.to_string())
}

pub fn confirm_non_empty(value: Option<&Value>) -> Option<String> {
    let trimmed = value?.as_str()?.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn confirm_protocol(value: Option<&Value>) -> Option<Protocol> {
    value?.as_str()?.parse().ok()
}

pub fn confirm_url(value: Option<&Value>) -> Option<String> {
    confirm_non_empty(value)
}

pub fn confirm_method(value: Option<&Value>) -> Option<HttpMethod> {
    value?.as_str()?.parse().ok()
}

/// Non-empty list of HTTP status codes.
pub fn confirm_success_codes(value: Option<&Value>) -> Option<Vec<u16>> {
    let codes = value?.as_array()?;
    if codes.is_empty() {
        return None;
    }

    codes
        .iter()
        .map(|code| {
            code.as_u64()
                .filter(|code| (100..=599).contains(code))
                .map(|code| code as u16)
        })
        .collect()
}

/// Whole number of seconds in `[1, 5]`; `3.0` counts as whole.
pub fn confirm_timeout_seconds(value: Option<&Value>) -> Option<u64> {
    let value = value?;
    let seconds = value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|secs| secs.fract() == 0.0 && *secs >= 0.0)
            .map(|secs| secs as u64)
    })?;

    (MIN_TIMEOUT_SECONDS..=MAX_TIMEOUT_SECONDS).contains(&seconds).then_some(seconds)
}

pub fn confirm_state(value: Option<&Value>) -> Option<CheckState> {
    value?.as_str()?.parse().ok()
}

pub fn confirm_last_checked(value: Option<&Value>) -> Option<i64> {
    value?.as_i64().filter(|ms| *ms > 0)
}
