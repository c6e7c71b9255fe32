use thiserror::Error;

use super::Collection;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No {collection} record with key {key}")]
    NotFound { collection: Collection, key: String },

    #[error("A {collection} record with key {key} already exists")]
    AlreadyExists { collection: Collection, key: String },

    #[error("Invalid record key: {0:?}")]
    InvalidKey(String),

    #[error("Stored {collection} record {key} is not valid JSON: {source}")]
    Corrupt {
        collection: Collection,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Record does not match the expected shape: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("{0:#}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}
