use super::record::QueuedWrite;
use crate::types::{RealtimeError, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// Durable backing for the offline queue. `save` replaces the whole list.
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn load(&self) -> Result<Vec<QueuedWrite>>;
    async fn save(&self, entries: &[QueuedWrite]) -> Result<()>;
}

/// Keeps the queue in process memory only.
#[derive(Debug, Default)]
pub struct MemoryQueueStore {
    entries: Mutex<Vec<QueuedWrite>>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Vec<QueuedWrite> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn load(&self) -> Result<Vec<QueuedWrite>> {
        Ok(self.entries.lock().await.clone())
    }

    async fn save(&self, entries: &[QueuedWrite]) -> Result<()> {
        *self.entries.lock().await = entries.to_vec();
        Ok(())
    }
}

/// Stores the queue as a JSON array in one file.
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so a crash mid-write leaves the previous list intact.
#[derive(Debug, Clone)]
pub struct JsonFileQueueStore {
    path: PathBuf,
}

impl JsonFileQueueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "offline-queue".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl QueueStore for JsonFileQueueStore {
    async fn load(&self) -> Result<Vec<QueuedWrite>> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&raw).map_err(|e| {
            RealtimeError::Storage(format!(
                "failed parsing offline queue {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    async fn save(&self, entries: &[QueuedWrite]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let encoded = serde_json::to_vec(entries)?;
        let temp_path = self.temp_path();
        fs::write(&temp_path, encoded).await?;

        if let Err(rename_err) = fs::rename(&temp_path, &self.path).await {
            // Some platforms refuse to rename over an existing file.
            match fs::remove_file(&self.path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    let _ = fs::remove_file(&temp_path).await;
                    return Err(RealtimeError::Storage(format!(
                        "failed replacing {} after rename error ({}): {}",
                        self.path.display(),
                        rename_err,
                        e
                    )));
                }
            }
            fs::rename(&temp_path, &self.path).await?;
        }

        tracing::debug!(
            "Persisted {} offline writes to {}",
            entries.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::record::WriteMethod;

    fn write(url: &str) -> QueuedWrite {
        QueuedWrite {
            url: url.to_string(),
            method: WriteMethod::Post,
            body: None,
            timestamp: 1,
        }
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("queue.json");

        let store = JsonFileQueueStore::new(&path);
        assert!(store.load().await.unwrap().is_empty());

        store.save(&[write("a"), write("b")]).await.unwrap();
        store.save(&[write("b")]).await.unwrap();

        let reopened = JsonFileQueueStore::new(&path);
        assert_eq!(reopened.load().await.unwrap(), vec![write("b")]);
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");
        std::fs::write(&path, b"{not json").unwrap();

        let result = JsonFileQueueStore::new(&path).load().await;
        assert!(matches!(result, Err(RealtimeError::Storage(_))));
    }

    #[tokio::test]
    async fn test_memory_store_replaces_contents() {
        let store = MemoryQueueStore::new();
        store.save(&[write("a"), write("b")]).await.unwrap();
        store.save(&[write("c")]).await.unwrap();
        assert_eq!(store.snapshot().await, vec![write("c")]);
    }
}
