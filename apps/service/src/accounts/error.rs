use thiserror::Error;

use super::credentials::CredentialError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Missing or invalid fields: {0}")]
    Validation(String),

    #[error("Not authorized: {0}")]
    Auth(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} already exists")]
    AlreadyExists(&'static str),

    #[error("Check limit of {max} reached")]
    LimitReached { max: usize },

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AccountError {
    pub(crate) fn invalid(fields: &[&str]) -> Self {
        Self::Validation(fields.join(", "))
    }

    /// Turn a store `NotFound` into a domain one, keep everything else.
    pub(crate) fn missing(what: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |e| if e.is_not_found() { Self::NotFound(what) } else { Self::Store(e) }
    }
}
