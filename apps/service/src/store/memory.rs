use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Collection, Document, RecordStore, StoreError, validate_key};

/// Volatile store with the same contract as [`super::FileStore`].
///
/// Documents are kept serialized so every read hands out a fresh copy.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(collection: Collection, key: &str) -> StoreError {
    StoreError::NotFound { collection, key: key.to_string() }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create(&self, collection: Collection, key: &str, document: &Document) -> Result<(), StoreError> {
        validate_key(key)?;
        let bytes = serde_json::to_vec(document)?;

        let mut collections = self.collections.write().await;
        let records = collections.entry(collection).or_default();
        if records.contains_key(key) {
            return Err(StoreError::AlreadyExists { collection, key: key.to_string() });
        }
        records.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn read(&self, collection: Collection, key: &str) -> Result<Document, StoreError> {
        validate_key(key)?;
        let collections = self.collections.read().await;
        let bytes = collections
            .get(&collection)
            .and_then(|records| records.get(key))
            .ok_or_else(|| not_found(collection, key))?;

        serde_json::from_slice(bytes).map_err(|source| StoreError::Corrupt {
            collection,
            key: key.to_string(),
            source,
        })
    }

    async fn update(&self, collection: Collection, key: &str, document: &Document) -> Result<(), StoreError> {
        validate_key(key)?;
        let bytes = serde_json::to_vec(document)?;

        let mut collections = self.collections.write().await;
        let slot = collections
            .get_mut(&collection)
            .and_then(|records| records.get_mut(key))
            .ok_or_else(|| not_found(collection, key))?;
        *slot = bytes;
        Ok(())
    }

    async fn delete(&self, collection: Collection, key: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        let mut collections = self.collections.write().await;
        collections
            .get_mut(&collection)
            .and_then(|records| records.remove(key))
            .map(|_| ())
            .ok_or_else(|| not_found(collection, key))
    }

    async fn list(&self, collection: Collection) -> Result<Vec<String>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|records| records.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_store_contract() {
        let store = MemoryStore::new();
        let doc = json!({"phoneNumber": "5551234567"});

        store.create(Collection::Users, "5551234567", &doc).await.unwrap();
        assert!(store.create(Collection::Users, "5551234567", &json!({})).await.unwrap_err().is_already_exists());
        assert_eq!(store.read(Collection::Users, "5551234567").await.unwrap(), doc);

        assert!(store.update(Collection::Users, "0000000000", &doc).await.unwrap_err().is_not_found());
        store.update(Collection::Users, "5551234567", &json!({"x": 1})).await.unwrap();
        assert_eq!(store.read(Collection::Users, "5551234567").await.unwrap(), json!({"x": 1}));

        assert_eq!(store.list(Collection::Users).await.unwrap(), ["5551234567"]);
        assert!(store.list(Collection::Checks).await.unwrap().is_empty());

        store.delete(Collection::Users, "5551234567").await.unwrap();
        assert!(store.delete(Collection::Users, "5551234567").await.unwrap_err().is_not_found());
    }
}
