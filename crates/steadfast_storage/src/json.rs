//! One JSON file per record, written atomically.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use steadfast_error::{StorageError, StorageErrorKind, SteadfastResult};

const EXTENSION: &str = "json";

/// Directory of JSON records keyed by file stem.
///
/// # Example Structure
///
/// ```text
/// problems/
/// ├── two-sum.json
/// ├── add-two-numbers.json
/// └── longest-substring.json
/// ```
///
/// Writes go to `{key}.json.tmp` and are renamed into place, so a reader
/// never observes a partially written record.
#[derive(Debug, Clone)]
pub struct JsonRecordStore {
    base_path: PathBuf,
}

impl JsonRecordStore {
    /// Open a store rooted at `base_path`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created.
    #[tracing::instrument(skip(base_path))]
    pub fn new(base_path: impl Into<PathBuf>) -> SteadfastResult<Self> {
        let base_path = base_path.into();

        std::fs::create_dir_all(&base_path).map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                base_path.display(),
                e
            )))
        })?;

        tracing::debug!(path = %base_path.display(), "Opened record store");
        Ok(Self { base_path })
    }

    /// Root directory of the store.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// File path for a record key.
    ///
    /// # Errors
    ///
    /// Keys must be a single non-empty path component.
    pub fn path_for(&self, key: &str) -> SteadfastResult<PathBuf> {
        let is_plain = !key.is_empty()
            && key != "."
            && key != ".."
            && !key.contains(['/', '\\'])
            && !key.contains('\0');
        if !is_plain {
            return Err(StorageError::new(StorageErrorKind::InvalidPath(format!(
                "record key {:?}",
                key
            )))
            .into());
        }
        Ok(self.base_path.join(format!("{}.{}", key, EXTENSION)))
    }

    /// Serialize and write a record, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns error if serialization, the temp write, or the rename fails.
    /// On failure the previous version of the record, if any, is untouched.
    #[tracing::instrument(skip(self, record))]
    pub async fn save<T>(&self, key: &str, record: &T) -> SteadfastResult<u64>
    where
        T: Serialize + ?Sized,
    {
        let path = self.path_for(key)?;
        let bytes = serde_json::to_vec_pretty(record)
            .map_err(|e| StorageError::new(StorageErrorKind::Serialize(format!("{}: {}", key, e))))?;

        // Write to temp file first, then rename for atomicity
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &bytes).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                temp_path.display(),
                e
            )))
        })?;

        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StorageError::new(StorageErrorKind::FileWrite(format!(
                "rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            )))
            .into());
        }

        tracing::debug!(path = %path.display(), size = bytes.len(), "Saved record");
        Ok(bytes.len() as u64)
    }

    /// Read and deserialize a record.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no record exists under `key`.
    #[tracing::instrument(skip(self))]
    pub async fn load<T>(&self, key: &str) -> SteadfastResult<T>
    where
        T: DeserializeOwned,
    {
        let path = self.path_for(key)?;
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::new(StorageErrorKind::NotFound(path.display().to_string()))
            } else {
                StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            }
        })?;

        let record = serde_json::from_slice(&bytes).map_err(|e| {
            StorageError::new(StorageErrorKind::Deserialize(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })?;
        Ok(record)
    }

    /// Whether a record exists under `key`.
    pub async fn exists(&self, key: &str) -> bool {
        match self.path_for(key) {
            Ok(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Keys of every stored record, sorted.
    ///
    /// Leftover temp files are not records and are skipped.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be read.
    pub async fn keys(&self) -> SteadfastResult<Vec<String>> {
        let read_err = |e: std::io::Error| {
            StorageError::new(StorageErrorKind::FileRead(format!(
                "{}: {}",
                self.base_path.display(),
                e
            )))
        };

        let mut entries = tokio::fs::read_dir(&self.base_path).await.map_err(read_err)?;
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}
