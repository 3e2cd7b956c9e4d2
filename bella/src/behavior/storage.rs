use async_trait::async_trait;
use std::{io, path::PathBuf};
use tokio::sync::Mutex;

/// Durable home of the behavior document. Reads return `None` when no document exists yet.
#[async_trait]
pub trait BehaviorStorage: Send + Sync {
    async fn read(&self) -> io::Result<Option<Vec<u8>>>;
    async fn write(&self, contents: &[u8]) -> io::Result<()>;
}

/// A JSON document on the local filesystem.
///
/// Writes go to a sibling temporary file that is then renamed over the target, so readers in
/// other processes never observe a half written document.
#[derive(Clone, Debug)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl BehaviorStorage for JsonFile {
    async fn read(&self) -> io::Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn write(&self, contents: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp = self.temp_path();
        tokio::fs::write(&temp, contents).await?;
        tokio::fs::rename(&temp, &self.path).await
    }
}

/// Keeps the document in memory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    contents: Mutex<Option<Vec<u8>>>,
    writes: Mutex<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: impl Into<Vec<u8>>) -> Self {
        Self {
            contents: Mutex::new(Some(contents.into())),
            writes: Mutex::new(0),
        }
    }

    pub async fn contents(&self) -> Option<Vec<u8>> {
        self.contents.lock().await.clone()
    }

    /// Number of completed writes.
    pub async fn write_count(&self) -> usize {
        *self.writes.lock().await
    }
}

#[async_trait]
impl BehaviorStorage for MemoryStorage {
    async fn read(&self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.contents.lock().await.clone())
    }

    async fn write(&self, contents: &[u8]) -> io::Result<()> {
        *self.contents.lock().await = Some(contents.to_vec());
        *self.writes.lock().await += 1;
        Ok(())
    }
}

#[async_trait]
impl<T: BehaviorStorage + ?Sized> BehaviorStorage for std::sync::Arc<T> {
    async fn read(&self) -> io::Result<Option<Vec<u8>>> {
        (**self).read().await
    }

    async fn write(&self, contents: &[u8]) -> io::Result<()> {
        (**self).write(contents).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let file = JsonFile::new(dir.path().join("behaviors.json"));
        assert!(file.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let file = JsonFile::new(dir.path().join("nested").join("behaviors.json"));
        file.write(b"{}").await.unwrap();
        assert_eq!(file.read().await.unwrap(), Some(b"{}".to_vec()));

        file.write(b"{\"a\": 1}").await.unwrap();
        assert_eq!(file.read().await.unwrap(), Some(b"{\"a\": 1}".to_vec()));
        assert!(!dir.path().join("nested").join("behaviors.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_memory_storage_counts_writes() {
        let storage = MemoryStorage::new();
        assert!(storage.read().await.unwrap().is_none());
        storage.write(b"one").await.unwrap();
        storage.write(b"two").await.unwrap();
        assert_eq!(storage.contents().await, Some(b"two".to_vec()));
        assert_eq!(storage.write_count().await, 2);
    }
}
