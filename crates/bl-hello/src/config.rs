use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{HelloError, Result};

/// Built-in defaults
pub mod defaults {
    use std::time::Duration;

    /// Name of the shared store holding hello results
    pub const STORE_NAMESPACE: &str = "com.microsoft.common.ipc.hello.cache";

    /// How long a negotiated protocol version stays valid (4 hours)
    pub const TIMEOUT: Duration = Duration::from_secs(4 * 60 * 60);

    pub const CONFIG_FILE_NAME: &str = "hello.toml";

    /// How long a store write waits for another process holding the lock
    pub const LOCK_TIMEOUT: Duration = Duration::from_secs(2);
}

/// Expiry rules applied when reading cached hello results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Maximum age of a successful negotiation
    pub timeout: Duration,

    /// Maximum age of a cached handshake error; falls back to `timeout`
    pub handshake_error_timeout: Option<Duration>,
}

impl CachePolicy {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            handshake_error_timeout: None,
        }
    }

    pub fn error_timeout(&self) -> Duration {
        self.handshake_error_timeout.unwrap_or(self.timeout)
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::with_timeout(defaults::TIMEOUT)
    }
}

/// On-disk configuration (`hello.toml`)
///
/// ```toml
/// timeout_secs = 14400
/// handshake_error_timeout_secs = 900
/// store_namespace = "com.microsoft.common.ipc.hello.cache"
/// storage_dir = "/var/lib/brokerlink"
/// lock_timeout_ms = 2000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HelloConfig {
    pub timeout_secs: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub handshake_error_timeout_secs: Option<u64>,

    pub store_namespace: String,

    /// Directory of the file-backed store; platform cache dir when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,

    pub lock_timeout_ms: u64,
}

impl Default for HelloConfig {
    fn default() -> Self {
        Self {
            timeout_secs: defaults::TIMEOUT.as_secs(),
            handshake_error_timeout_secs: None,
            store_namespace: defaults::STORE_NAMESPACE.to_string(),
            storage_dir: None,
            lock_timeout_ms: defaults::LOCK_TIMEOUT.as_millis() as u64,
        }
    }
}

impl HelloConfig {
    /// Load and validate a config file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            HelloError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;

        debug!("Loaded hello config from {}", path.display());
        Ok(config)
    }

    /// Load a config file, or the defaults if it does not exist
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if tokio::fs::metadata(path).await.is_err() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path).await
    }

    /// Get default config file location for the current platform
    pub fn default_config_path() -> Result<PathBuf> {
        let project_dirs = directories::ProjectDirs::from("", "", "brokerlink").ok_or_else(|| {
            HelloError::Config("Could not determine config directory".to_string())
        })?;

        Ok(project_dirs.config_dir().join(defaults::CONFIG_FILE_NAME))
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(HelloError::Config("timeout_secs must be positive".to_string()));
        }
        if self.handshake_error_timeout_secs == Some(0) {
            return Err(HelloError::Config(
                "handshake_error_timeout_secs must be positive".to_string(),
            ));
        }
        if self.store_namespace.trim().is_empty() {
            return Err(HelloError::Config("store_namespace must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            timeout: Duration::from_secs(self.timeout_secs),
            handshake_error_timeout: self.handshake_error_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Storage directory to use, resolving the platform default when unset
    pub fn resolve_storage_dir(&self) -> Result<PathBuf> {
        match &self.storage_dir {
            Some(dir) => Ok(dir.clone()),
            None => crate::file_store::FileNameValueStore::default_storage_dir(),
        }
    }
}
