//! Blob-storage seam for generated download archives. Only listing and
//! deletion are needed here (the purge job); archive generation lives with
//! the photo pipeline, outside this service.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct ArchiveObject {
    pub path: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait ArchiveStorage: Send + Sync {
    /// Objects under `prefix`, with their creation timestamps.
    async fn list(&self, prefix: &str) -> Result<Vec<ArchiveObject>, StorageError>;

    async fn delete(&self, path: &str) -> Result<(), StorageError>;
}

/// Local-filesystem archive storage. Object paths are relative to `root`.
pub struct FsArchiveStorage {
    root: PathBuf,
}

impl FsArchiveStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl ArchiveStorage for FsArchiveStorage {
    async fn list(&self, prefix: &str) -> Result<Vec<ArchiveObject>, StorageError> {
        let dir = self.root.join(prefix);
        let mut objects = Vec::new();

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            // Nothing generated yet.
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(objects),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let created_at = metadata
                .created()
                .or_else(|_| metadata.modified())
                .map(DateTime::<Utc>::from)?;
            objects.push(ArchiveObject {
                path: format!("{prefix}{}", entry.file_name().to_string_lossy()),
                created_at,
            });
        }
        Ok(objects)
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        tokio::fs::remove_file(self.root.join(path)).await?;
        Ok(())
    }
}

/// In-memory archive storage for tests.
#[derive(Default)]
pub struct MemoryArchiveStorage {
    objects: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl MemoryArchiveStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: &str, created_at: DateTime<Utc>) {
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), created_at);
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.lock().unwrap().contains_key(path)
    }
}

#[async_trait]
impl ArchiveStorage for MemoryArchiveStorage {
    async fn list(&self, prefix: &str) -> Result<Vec<ArchiveObject>, StorageError> {
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .iter()
            .filter(|(path, _)| path.starts_with(prefix))
            .map(|(path, created_at)| ArchiveObject {
                path: path.clone(),
                created_at: *created_at,
            })
            .collect())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.objects.lock().unwrap().remove(path);
        Ok(())
    }
}
