use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::defaults;
use crate::errors::{HelloError, Result};
use crate::store::NameValueStore;

type ValueMap = BTreeMap<String, String>;

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(20);

/// File-backed name/value store
///
/// Every namespace lives in its own JSON file so several stores can share a
/// directory. Reads always go to disk, which lets separate processes pointed
/// at the same directory see each other's writes.
///
/// # Directory Structure
/// ```text
/// <storage_dir>/
/// ├── com.microsoft.common.ipc.hello.cache.json   # key -> value map
/// └── com.microsoft.common.ipc.hello.cache.lock   # advisory write lock
/// ```
#[derive(Debug)]
pub struct FileNameValueStore {
    data_file: PathBuf,
    lock_file: PathBuf,
    lock_timeout: Duration,
    /// Serializes writers inside this process; the file lock covers the rest
    write_guard: Mutex<()>,
}

impl FileNameValueStore {
    /// Create a store for `namespace` under `storage_dir`
    pub async fn new(storage_dir: impl AsRef<Path>, namespace: &str) -> Result<Self> {
        if namespace.is_empty() || namespace.contains(['/', '\\']) {
            return Err(HelloError::Config(format!(
                "Invalid store namespace: '{}'",
                namespace
            )));
        }

        let storage_dir = storage_dir.as_ref().to_path_buf();
        fs::create_dir_all(&storage_dir).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            std::fs::set_permissions(&storage_dir, perms)?;
        }

        Ok(Self {
            data_file: storage_dir.join(format!("{}.json", namespace)),
            lock_file: storage_dir.join(format!("{}.lock", namespace)),
            lock_timeout: defaults::LOCK_TIMEOUT,
            write_guard: Mutex::new(()),
        })
    }

    /// Get default storage directory for the current platform
    pub fn default_storage_dir() -> Result<PathBuf> {
        let project_dirs = directories::ProjectDirs::from("", "", "brokerlink").ok_or_else(|| {
            HelloError::Config("Could not determine cache directory".to_string())
        })?;

        Ok(project_dirs.cache_dir().join("hello"))
    }

    /// Set how long writes wait for a lock held by another process
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    pub fn lock_file(&self) -> &Path {
        &self.lock_file
    }

    /// Acquire an exclusive lock on the namespace, polling until `lock_timeout`
    async fn acquire_lock(&self) -> Result<std::fs::File> {
        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_file)?;

        let deadline = Instant::now() + self.lock_timeout;
        loop {
            if lock_file.try_lock_exclusive().is_ok() {
                return Ok(lock_file);
            }
            if Instant::now() >= deadline {
                return Err(HelloError::LockUnavailable);
            }
            debug!("Store lock {} busy, retrying", self.lock_file.display());
            tokio::time::sleep(LOCK_RETRY_INTERVAL).await;
        }
    }

    async fn read_from_disk(&self) -> Result<ValueMap> {
        if fs::metadata(&self.data_file).await.is_err() {
            return Ok(ValueMap::new());
        }

        let content = fs::read_to_string(&self.data_file).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Read the namespace, treating an unreadable file as empty
    async fn load_map(&self) -> ValueMap {
        match self.read_from_disk().await {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable store file {}: {}",
                    self.data_file.display(),
                    e
                );
                ValueMap::new()
            }
        }
    }

    async fn write_to_disk(&self, map: &ValueMap) -> Result<()> {
        let json = serde_json::to_string_pretty(map)?;

        // Atomic write: write to temp file, then rename
        let temp_path = self.data_file.with_extension("tmp");
        fs::write(&temp_path, json).await?;

        let file = std::fs::File::open(&temp_path)?;
        file.sync_all()?;

        fs::rename(&temp_path, &self.data_file).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.data_file, perms)?;
        }

        Ok(())
    }

    /// Apply `update` to the stored map under both locks
    async fn modify<F>(&self, update: F) -> Result<()>
    where
        F: FnOnce(&mut ValueMap) -> bool,
    {
        let _guard = self.write_guard.lock().await;
        let _lock = self.acquire_lock().await?;

        let mut map = self.load_map().await;
        if update(&mut map) {
            self.write_to_disk(&map).await?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl NameValueStore for FileNameValueStore {
    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.modify(|map| {
            map.insert(key.to_string(), value.to_string());
            true
        })
        .await
    }

    async fn get(&self, key: &str) -> Option<String> {
        self.load_map().await.remove(key)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.modify(|map| map.remove(key).is_some()).await
    }

    async fn keys(&self) -> Vec<String> {
        self.load_map().await.into_keys().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_store() -> (FileNameValueStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileNameValueStore::new(temp_dir.path(), "test.namespace")
            .await
            .unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let (store, _temp) = create_test_store().await;

        store.put("proto[1.0,2.5]:broker[7]", "value").await.unwrap();

        assert_eq!(
            store.get("proto[1.0,2.5]:broker[7]").await.as_deref(),
            Some("value")
        );
        assert!(store.data_file().exists());
    }

    #[tokio::test]
    async fn test_remove() {
        let (store, _temp) = create_test_store().await;

        store.put("key", "value").await.unwrap();
        assert!(store.get("key").await.is_some());

        store.remove("key").await.unwrap();
        assert!(store.get("key").await.is_none());

        store.remove("never-written").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_keys() {
        let (store, _temp) = create_test_store().await;

        for i in 0..3 {
            store.put(&format!("key-{}", i), "v").await.unwrap();
        }

        let keys = store.keys().await;
        assert_eq!(keys, vec!["key-0", "key-1", "key-2"]);
    }

    #[tokio::test]
    async fn test_second_instance_sees_writes() {
        let (store, temp) = create_test_store().await;
        let other = FileNameValueStore::new(temp.path(), "test.namespace")
            .await
            .unwrap();

        store.put("shared", "yes").await.unwrap();
        assert_eq!(other.get("shared").await.as_deref(), Some("yes"));
    }

    #[tokio::test]
    async fn test_namespaces_are_separate_files() {
        let (store, temp) = create_test_store().await;
        let other = FileNameValueStore::new(temp.path(), "other.namespace")
            .await
            .unwrap();

        store.put("key", "value").await.unwrap();
        assert!(other.get("key").await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_as_empty() {
        let (store, _temp) = create_test_store().await;
        tokio::fs::write(store.data_file(), "not json {{{")
            .await
            .unwrap();

        assert!(store.get("key").await.is_none());
        assert!(store.keys().await.is_empty());

        store.put("key", "value").await.unwrap();
        assert_eq!(store.get("key").await.as_deref(), Some("value"));
    }

    fn hold_lock(store: &FileNameValueStore) -> std::fs::File {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(store.lock_file())
            .unwrap();
        file.lock_exclusive().unwrap();
        file
    }

    #[tokio::test]
    async fn test_waits_for_briefly_held_lock() {
        let (store, _temp) = create_test_store().await;
        store.put("key", "value").await.unwrap();

        let held = hold_lock(&store);
        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            held.unlock().unwrap();
        });

        store.remove("key").await.unwrap();
        store.put("other", "value").await.unwrap();
        release.await.unwrap();

        assert!(store.get("key").await.is_none());
        assert_eq!(store.get("other").await.as_deref(), Some("value"));
    }

    #[tokio::test]
    async fn test_lock_timeout_reports_unavailable() {
        let (store, _temp) = create_test_store().await;
        let store = store.with_lock_timeout(Duration::from_millis(50));
        let _held = hold_lock(&store);

        assert!(matches!(
            store.put("key", "value").await,
            Err(HelloError::LockUnavailable)
        ));
        assert!(store.get("key").await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_namespace() {
        let temp_dir = TempDir::new().unwrap();
        let result = FileNameValueStore::new(temp_dir.path(), "../escape").await;
        assert!(matches!(result, Err(HelloError::Config(_))));
    }
}
