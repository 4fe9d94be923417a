use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Result;
use chrono::Utc;
use fs4::tokio::AsyncFileExt;
use serde_json::Value;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tracing::{debug, warn};

use super::{KeyValueStorage, StoredValues};

pub const STORAGE_FILE_NAME: &str = "storage.json";

/// The main realization of [KeyValueStorage]. All keys live in one JSON object on disk, which is
/// rewritten as a whole on every `set`.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&dir)?;

        Ok(Self {
            path: dir.join(STORAGE_FILE_NAME),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<StoredValues> {
        async fn extract(path: &Path) -> std::result::Result<String, std::io::Error> {
            debug!("Reading {path:?}");
            let mut file = File::open(path).await?;
            file.lock_shared()?;
            let mut content = String::new();
            let result = file.read_to_string(&mut content).await;
            file.unlock_async().await?;
            result?;
            Ok(content)
        }

        match extract(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(StoredValues::new()),
            Ok(content) => Ok(parse_values(&content).unwrap_or_else(|| {
                warn!("Storage file {:?} is corrupted, treating it as empty", self.path);
                StoredValues::new()
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(StoredValues::new()),
            Err(e) => Err(e)?,
        }
    }

    async fn write_with_file(&self, file: &mut File, values: StoredValues) -> Result<()> {
        // The process of setting values is as such.
        // 1. Read whatever is currently stored.
        // 2. Merge new values over it.
        // 3. Rewrite the whole file.

        let mut content = String::new();
        file.read_to_string(&mut content).await?;

        let mut stored = if content.trim().is_empty() {
            StoredValues::new()
        } else {
            match parse_values(&content) {
                Some(v) => v,
                None => {
                    let backup = self.corrupted_backup_path();
                    warn!(
                        "Storage file {:?} is corrupted, moving its content to {:?}",
                        self.path, backup
                    );
                    tokio::fs::write(&backup, content.as_bytes()).await?;
                    StoredValues::new()
                }
            }
        };

        for (key, value) in values {
            stored.insert(key, value);
        }

        let buffer = serde_json::to_vec(&stored)?;

        file.set_len(0).await?;
        file.rewind().await?;
        file.write_all(&buffer).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }

    fn corrupted_backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".corrupt-{}", Utc::now().timestamp()));
        PathBuf::from(name)
    }
}

impl KeyValueStorage for FileStorage {
    async fn get(&self, keys: &[&str]) -> Result<StoredValues> {
        let mut stored = self.read_all().await?;
        Ok(keys
            .iter()
            .filter_map(|key| stored.remove(*key).map(|value| (key.to_string(), value)))
            .collect())
    }

    async fn set(&self, values: StoredValues) -> Result<()> {
        let mut file = File::options()
            .write(true)
            .create(true)
            .read(true)
            .truncate(false)
            .open(&self.path)
            .await?;

        // Semi-safe acquire-release for a file
        file.lock_exclusive()?;
        let result = self.write_with_file(&mut file, values).await;
        file.unlock_async().await?;
        result
    }
}

/// Only a JSON object is a valid storage document.
fn parse_values(content: &str) -> Option<StoredValues> {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(values)) => Some(values),
        Ok(_) => None,
        Err(e) => {
            debug!("Failed to parse storage document: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use anyhow::Result;
    use serde_json::json;
    use tempfile::tempdir;

    use crate::storage::{KeyValueStorage, StoredValues};

    use super::{FileStorage, STORAGE_FILE_NAME};

    fn values(value: serde_json::Value) -> StoredValues {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("test values should be an object"),
        }
    }

    #[tokio::test]
    async fn test_get_missing_file() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileStorage::new(dir.path().to_owned())?;

        let stored = storage.get(&["logs"]).await?;

        assert!(stored.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_set_then_get() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileStorage::new(dir.path().to_owned())?;

        storage
            .set(values(json!({ "logs": { "2024-01-15": { "09:00:00": "a" } } })))
            .await?;

        let stored = storage.get(&["logs", "currentLog"]).await?;

        assert_eq!(stored.len(), 1);
        assert_eq!(stored["logs"], json!({ "2024-01-15": { "09:00:00": "a" } }));
        Ok(())
    }

    #[tokio::test]
    async fn test_set_merges_keys() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileStorage::new(dir.path().to_owned())?;

        storage.set(values(json!({ "a": 1, "b": 2 }))).await?;
        storage.set(values(json!({ "b": 3 }))).await?;

        let stored = storage.get(&["a", "b"]).await?;
        assert_eq!(stored["a"], json!(1));
        assert_eq!(stored["b"], json!(3));
        Ok(())
    }

    #[tokio::test]
    async fn test_shorter_write_truncates() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileStorage::new(dir.path().to_owned())?;

        storage
            .set(values(json!({ "a": "a very long value that takes space" })))
            .await?;
        storage.set(values(json!({ "a": "" }))).await?;

        let content = fs::read_to_string(storage.path())?;
        assert_eq!(content, r#"{"a":""}"#);
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupted_file_reads_empty_and_is_kept_aside() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join(STORAGE_FILE_NAME), "{\"logs\": {\"2024-01")?;
        let storage = FileStorage::new(dir.path().to_owned())?;

        assert!(storage.get(&["logs"]).await?.is_empty());

        storage.set(values(json!({ "logs": {} }))).await?;

        let backups = fs::read_dir(dir.path())?
            .filter_map(|v| v.ok())
            .filter(|v| v.file_name().to_string_lossy().contains(".corrupt-"))
            .collect::<Vec<_>>();
        assert_eq!(backups.len(), 1);
        assert_eq!(
            fs::read_to_string(backups[0].path())?,
            "{\"logs\": {\"2024-01"
        );
        assert_eq!(storage.get(&["logs"]).await?["logs"], json!({}));
        Ok(())
    }

    #[tokio::test]
    async fn test_non_object_document_is_corrupted() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join(STORAGE_FILE_NAME), "[1, 2, 3]")?;
        let storage = FileStorage::new(dir.path().to_owned())?;

        assert!(storage.get(&["logs"]).await?.is_empty());
        Ok(())
    }
}
