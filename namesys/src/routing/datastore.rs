use std::collections::HashMap;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::errors::DatastoreError;

/// Durable local key/value storage.
///
/// Holds the last record published or accepted for each key so the publisher can
/// recover its sequence number across restarts.
#[async_trait]
pub trait Datastore: Debug + Send + Sync {
    /// Value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DatastoreError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), DatastoreError>;
}

/// In-memory [Datastore]. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatastore {
    entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryDatastore {
    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or_default()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Datastore for MemoryDatastore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DatastoreError> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), DatastoreError> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// [Datastore] keeping one file per key in a directory.
///
/// File names are the z-base32 encoding of the key.
#[derive(Debug, Clone)]
pub struct FsDatastore {
    directory: PathBuf,
}

impl FsDatastore {
    /// Open (and create if needed) a datastore in `directory`.
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self, DatastoreError> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.directory
            .join(base32::encode(base32::Alphabet::Z, key.as_bytes()))
    }
}

#[async_trait]
impl Datastore for FsDatastore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DatastoreError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), DatastoreError> {
        let path = self.path_for(key);
        // Write then rename, so readers never see a partial record.
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}
