use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::errors::{HelloError, Result};

/// Durable string-to-string mapping backing the hello cache
///
/// Implementations must make single-key reads and writes atomic; nothing
/// else is assumed. Several caches share one store and stay apart purely by
/// their key composition.
#[async_trait::async_trait]
pub trait NameValueStore: Send + Sync {
    /// Store a value, replacing any previous one
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Get a value by key
    async fn get(&self, key: &str) -> Option<String>;

    /// Remove a value by key; removing an absent key is not an error
    async fn remove(&self, key: &str) -> Result<()>;

    /// List all stored keys
    async fn keys(&self) -> Vec<String>;
}

/// In-memory store for tests and single-process callers
#[derive(Debug, Clone, Default)]
pub struct MemoryNameValueStore {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryNameValueStore {
    pub fn new() -> Self {
        Self {
            values: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait::async_trait]
impl NameValueStore for MemoryNameValueStore {
    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .map_err(|_| HelloError::Store("Lock poisoned".to_string()))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Option<String> {
        self.values.read().ok()?.get(key).cloned()
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values
            .write()
            .map_err(|_| HelloError::Store("Lock poisoned".to_string()))?
            .remove(key);
        Ok(())
    }

    async fn keys(&self) -> Vec<String> {
        self.values
            .read()
            .ok()
            .map(|v| v.keys().cloned().collect())
            .unwrap_or_default()
    }
}
