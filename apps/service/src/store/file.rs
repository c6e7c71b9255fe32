//! File-backed record store: one JSON file per document at
//! `<base_dir>/<collection>/<key>.json`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::locks::{KeyGuard, KeyLocks};
use super::{Collection, Document, RecordStore, StoreError, validate_key};

const RECORD_EXTENSION: &str = "json";

/// Writes to one key are serialized within a store instance, so a `delete`
/// can never be undone by an `update` that checked for the file first.
/// Separate processes sharing a data directory are not coordinated.
pub struct FileStore {
    base_dir: PathBuf,
    writers: KeyLocks,
}

impl FileStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into(), writers: KeyLocks::new() }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Create the base directory and one directory per collection.
    /// Safe to call on an already initialized store.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        for collection in Collection::ALL {
            let dir = self.collection_dir(collection);
            fs::create_dir_all(&dir).await?;
            debug!("Collection directory ready: {}", dir.display());
        }
        info!("Record store initialized at {}", self.base_dir.display());
        Ok(())
    }

    fn collection_dir(&self, collection: Collection) -> PathBuf {
        self.base_dir.join(collection.as_str())
    }

    fn record_path(&self, collection: Collection, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.collection_dir(collection).join(format!("{key}.{RECORD_EXTENSION}")))
    }

    async fn lock_key(&self, collection: Collection, key: &str) -> KeyGuard<'_> {
        self.writers.lock(&format!("{collection}/{key}")).await
    }

    /// Hidden sibling of the record, unique per write.
    fn temp_path(&self, collection: Collection, key: &str) -> PathBuf {
        let nonce: u64 = rand::random();
        self.collection_dir(collection).join(format!(".{key}.{nonce:016x}.tmp"))
    }

    async fn write_temp(&self, collection: Collection, key: &str, document: &Document) -> Result<PathBuf, StoreError> {
        let bytes = serde_json::to_vec(document)?;
        let temp = self.temp_path(collection, key);

        let written = async {
            let mut file = fs::OpenOptions::new().write(true).create_new(true).open(&temp).await?;
            file.write_all(&bytes).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            discard_temp(&temp).await;
            return Err(e.into());
        }
        Ok(temp)
    }
}

async fn discard_temp(temp: &Path) {
    if let Err(e) = fs::remove_file(temp).await {
        if e.kind() != ErrorKind::NotFound {
            warn!("Failed to remove temp file {}: {}", temp.display(), e);
        }
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn create(&self, collection: Collection, key: &str, document: &Document) -> Result<(), StoreError> {
        let path = self.record_path(collection, key)?;
        let _writer = self.lock_key(collection, key).await;
        let temp = self.write_temp(collection, key, document).await?;

        // The link only succeeds if nothing lives at `path` yet, and the
        // document it exposes is already complete.
        let linked = fs::hard_link(&temp, &path).await;
        discard_temp(&temp).await;

        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StoreError::AlreadyExists { collection, key: key.to_string() })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn read(&self, collection: Collection, key: &str) -> Result<Document, StoreError> {
        let path = self.record_path(collection, key)?;

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound { collection, key: key.to_string() });
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            collection,
            key: key.to_string(),
            source,
        })
    }

    async fn update(&self, collection: Collection, key: &str, document: &Document) -> Result<(), StoreError> {
        let path = self.record_path(collection, key)?;
        let _writer = self.lock_key(collection, key).await;
        if !fs::try_exists(&path).await? {
            return Err(StoreError::NotFound { collection, key: key.to_string() });
        }

        let temp = self.write_temp(collection, key, document).await?;
        if let Err(e) = fs::rename(&temp, &path).await {
            discard_temp(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn delete(&self, collection: Collection, key: &str) -> Result<(), StoreError> {
        let path = self.record_path(collection, key)?;
        let _writer = self.lock_key(collection, key).await;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::NotFound { collection, key: key.to_string() })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, collection: Collection) -> Result<Vec<String>, StoreError> {
        let mut entries = match fs::read_dir(self.collection_dir(collection)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') {
                continue;
            }
            if let Some(key) = name.strip_suffix(".json") {
                keys.push(key.to_string());
            }
        }

        keys.sort();
        Ok(keys)
    }
}
