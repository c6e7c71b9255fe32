//! Record store
//!
//! Durable mapping from `(collection, key)` to a JSON document. This is the
//! only persistence surface: account operations and the monitoring engine
//! both go through [`RecordStore`] and never touch the file system directly.
//!
//! Every operation is atomic at single-document granularity. There are no
//! cross-document transactions and concurrent updates to the same key are
//! last-write-wins. Callers that read, modify and write back a document hold
//! a [`KeyLocks`] guard for its key.

pub mod error;
pub mod file;
pub mod locks;
pub mod memory;
pub mod models;

pub use error::StoreError;
pub use file::FileStore;
pub use locks::KeyLocks;
pub use memory::MemoryStore;

use std::fmt;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

/// A stored document, always an owned copy.
pub type Document = serde_json::Value;

/// The three record collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Users,
    Tokens,
    Checks,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Users, Collection::Tokens, Collection::Checks];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Tokens => "tokens",
            Collection::Checks => "checks",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keys become file names, so they are restricted to `[A-Za-z0-9_-]`.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && key.len() <= 128
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid { Ok(()) } else { Err(StoreError::InvalidKey(key.to_string())) }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a new document. Fails with `AlreadyExists` instead of overwriting.
    async fn create(&self, collection: Collection, key: &str, document: &Document)
    -> Result<(), StoreError>;

    /// Read a parsed copy of the document.
    async fn read(&self, collection: Collection, key: &str) -> Result<Document, StoreError>;

    /// Replace an existing document. Readers see either the old or the new
    /// document in full.
    async fn update(&self, collection: Collection, key: &str, document: &Document)
    -> Result<(), StoreError>;

    async fn delete(&self, collection: Collection, key: &str) -> Result<(), StoreError>;

    /// Every key in the collection, sorted. An empty collection is not an error.
    async fn list(&self, collection: Collection) -> Result<Vec<String>, StoreError>;

    /// True only if the token exists, belongs to `phone_number` and has not
    /// expired. Read or parse failures yield `false`.
    async fn verify_token(&self, token_id: &str, phone_number: &str) -> bool {
        if token_id.is_empty() || phone_number.is_empty() {
            return false;
        }

        match self.read_as::<models::Token>(Collection::Tokens, token_id).await {
            Ok(token) => {
                token.phone_number == phone_number
                    && token.is_valid_at(chrono::Utc::now().timestamp_millis())
            }
            Err(e) => {
                tracing::debug!(token_id, "Token verification failed: {}", e);
                false
            }
        }
    }
}

/// Typed access on top of [`RecordStore`] documents.
#[async_trait]
pub trait RecordStoreExt: RecordStore {
    async fn read_as<T>(&self, collection: Collection, key: &str) -> Result<T, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        let document = self.read(collection, key).await?;
        Ok(serde_json::from_value(document)?)
    }

    async fn create_from<T>(&self, collection: Collection, key: &str, record: &T) -> Result<(), StoreError>
    where
        T: Serialize + Sync,
    {
        let document = serde_json::to_value(record)?;
        self.create(collection, key, &document).await
    }

    async fn update_from<T>(&self, collection: Collection, key: &str, record: &T) -> Result<(), StoreError>
    where
        T: Serialize + Sync,
    {
        let document = serde_json::to_value(record)?;
        self.update(collection, key, &document).await
    }
}

impl<S: RecordStore + ?Sized> RecordStoreExt for S {}
