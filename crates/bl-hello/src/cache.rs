use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::CachePolicy;
use crate::entry::{HelloCacheEntry, HelloCacheResult, StoredEntry};
use crate::errors::Result;
use crate::key::{self, CacheKey};
use crate::store::NameValueStore;
use crate::version::AppVersionResolver;

/// Cache of hello handshake outcomes for one protocol and one target app build
///
/// The target app's version is part of every key, so upgrading, downgrading
/// or reinstalling the target silently orphans earlier entries. When the
/// version cannot be resolved at all, reads always miss.
///
/// Expiry is evaluated lazily on read; nothing is evicted in the background.
pub struct HelloCache {
    store: Arc<dyn NameValueStore>,
    clock: Arc<dyn Clock>,
    protocol_name: String,
    target_app_package_name: String,
    target_app_version: Option<String>,
    policy: CachePolicy,
}

impl HelloCache {
    pub fn new(
        store: Arc<dyn NameValueStore>,
        clock: Arc<dyn Clock>,
        protocol_name: impl Into<String>,
        target_app_package_name: impl Into<String>,
        resolver: &dyn AppVersionResolver,
        policy: CachePolicy,
    ) -> Self {
        let target_app_package_name = target_app_package_name.into();
        let target_app_version = resolver.version_code(&target_app_package_name);
        if target_app_version.is_none() {
            debug!(
                "Version of {} is unknown, hello cache reads will miss",
                target_app_package_name
            );
        }

        Self {
            store,
            clock,
            protocol_name: protocol_name.into(),
            target_app_package_name,
            target_app_version,
            policy,
        }
    }

    pub fn protocol_name(&self) -> &str {
        &self.protocol_name
    }

    pub fn target_app_version(&self) -> Option<&str> {
        self.target_app_version.as_deref()
    }

    pub fn key(&self, minimum_version: Option<&str>, maximum_version: &str) -> CacheKey {
        CacheKey::new(
            &self.protocol_name,
            minimum_version,
            maximum_version,
            &self.target_app_package_name,
            self.target_app_version.as_deref(),
        )
    }

    /// Record a successful negotiation
    ///
    /// A failed write is logged and costs at most one repeated hello.
    pub async fn save_negotiated_protocol_version(
        &self,
        minimum_version: Option<&str>,
        maximum_version: &str,
        negotiated_protocol_version: &str,
    ) {
        if let Err(e) = self
            .try_save_negotiated_protocol_version(
                minimum_version,
                maximum_version,
                negotiated_protocol_version,
            )
            .await
        {
            warn!("Failed to save negotiated protocol version: {}", e);
        }
    }

    pub async fn try_save_negotiated_protocol_version(
        &self,
        minimum_version: Option<&str>,
        maximum_version: &str,
        negotiated_protocol_version: &str,
    ) -> Result<()> {
        self.save(
            minimum_version,
            maximum_version,
            HelloCacheEntry::Negotiated {
                protocol_version: negotiated_protocol_version.to_string(),
            },
        )
        .await
    }

    /// Record that the broker rejected the version range
    pub async fn save_handshake_error(
        &self,
        minimum_version: Option<&str>,
        maximum_version: &str,
        error_code: Option<&str>,
        error_message: Option<&str>,
    ) {
        if let Err(e) = self
            .try_save_handshake_error(minimum_version, maximum_version, error_code, error_message)
            .await
        {
            warn!("Failed to save hello handshake error: {}", e);
        }
    }

    pub async fn try_save_handshake_error(
        &self,
        minimum_version: Option<&str>,
        maximum_version: &str,
        error_code: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<()> {
        self.save(
            minimum_version,
            maximum_version,
            HelloCacheEntry::HandshakeError {
                error_code: error_code.map(str::to_string),
                error_message: error_message.map(str::to_string),
            },
        )
        .await
    }

    /// Look up a fresh result; `None` on miss, expiry or an unreadable entry
    ///
    /// Expired entries are removed on the way out.
    pub async fn get_hello_cache_result(
        &self,
        minimum_version: Option<&str>,
        maximum_version: &str,
    ) -> Option<HelloCacheResult> {
        if self.target_app_version.is_none() {
            return None;
        }

        let key = self.key(minimum_version, maximum_version).to_storage_key();
        let raw = self.store.get(&key).await?;

        let Some(stored) = StoredEntry::decode(&raw) else {
            debug!("Ignoring malformed hello cache entry for {}", key);
            return None;
        };

        let ttl = match stored.entry {
            HelloCacheEntry::Negotiated { .. } => self.policy.timeout,
            HelloCacheEntry::HandshakeError { .. } => self.policy.error_timeout(),
        };
        if is_expired(stored.age_ms(self.clock.now()), ttl) {
            debug!("Hello cache entry for {} expired", key);
            if let Err(e) = self.store.remove(&key).await {
                debug!("Failed to drop expired entry {}: {}", key, e);
            }
            return None;
        }

        debug!("Hello cache hit for {}", key);
        Some(stored.entry.into())
    }

    /// Remove every entry of this cache's scope, leaving other protocols,
    /// targets and target versions untouched
    pub async fn clear_cache(&self) {
        if let Err(e) = self.try_clear_cache().await {
            warn!("Failed to clear hello cache for {}: {}", self.protocol_name, e);
        }
    }

    /// Like [`clear_cache`](Self::clear_cache), stopping at the first failed removal
    pub async fn try_clear_cache(&self) -> Result<()> {
        let prefix = key::scope_prefix(&self.protocol_name);
        let suffix = key::scope_suffix(
            &self.target_app_package_name,
            self.target_app_version.as_deref(),
        );

        for stored_key in self.store.keys().await {
            if stored_key.starts_with(&prefix) && stored_key.ends_with(&suffix) {
                self.store.remove(&stored_key).await?;
            }
        }
        Ok(())
    }

    async fn save(
        &self,
        minimum_version: Option<&str>,
        maximum_version: &str,
        entry: HelloCacheEntry,
    ) -> Result<()> {
        let key = self.key(minimum_version, maximum_version).to_storage_key();
        let value = StoredEntry::new(entry, self.clock.now()).encode()?;

        self.store.put(&key, &value).await?;
        debug!("Saved hello cache entry for {}", key);
        Ok(())
    }
}

impl std::fmt::Debug for HelloCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HelloCache")
            .field("protocol_name", &self.protocol_name)
            .field("target_app_package_name", &self.target_app_package_name)
            .field("target_app_version", &self.target_app_version)
            .field("policy", &self.policy)
            .finish()
    }
}

/// An entry is stale once its age reaches the TTL
fn is_expired(age_ms: i64, ttl: Duration) -> bool {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    age_ms >= ttl_ms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryNameValueStore;
    use crate::version::StaticVersionResolver;

    const PROTOCOL_A: &str = "MOCK_PROTOCOL_A";
    const PROTOCOL_B: &str = "MOCK_PROTOCOL_B";
    const BROKER_APP: &str = "MOCK_BROKER_APP_NAME";

    struct Fixture {
        store: Arc<MemoryNameValueStore>,
        clock: ManualClock,
        resolver: StaticVersionResolver,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: Arc::new(MemoryNameValueStore::new()),
                clock: ManualClock::default(),
                resolver: StaticVersionResolver::with_version(BROKER_APP, "1.0"),
            }
        }

        fn cache(&self, protocol: &str) -> HelloCache {
            self.cache_with_policy(protocol, CachePolicy::default())
        }

        fn cache_with_policy(&self, protocol: &str, policy: CachePolicy) -> HelloCache {
            HelloCache::new(
                self.store.clone(),
                Arc::new(self.clock.clone()),
                protocol,
                BROKER_APP,
                &self.resolver,
                policy,
            )
        }
    }

    #[tokio::test]
    async fn test_read_write() {
        let fx = Fixture::new();
        let writer = fx.cache(PROTOCOL_A);
        let reader = fx.cache(PROTOCOL_A);

        writer
            .save_negotiated_protocol_version(Some("1.0"), "2.5", "2.0")
            .await;

        let result = reader.get_hello_cache_result(Some("1.0"), "2.5").await.unwrap();
        assert_eq!(result.negotiated_protocol_version(), Some("2.0"));
    }

    #[tokio::test]
    async fn test_read_write_without_minimum() {
        let fx = Fixture::new();
        let cache = fx.cache(PROTOCOL_A);

        cache.save_negotiated_protocol_version(None, "2.5", "2.0").await;

        let result = cache.get_hello_cache_result(None, "2.5").await.unwrap();
        assert_eq!(result.negotiated_protocol_version(), Some("2.0"));
        assert!(cache.get_hello_cache_result(Some("1.0"), "2.5").await.is_none());
    }

    #[tokio::test]
    async fn test_changed_bounds_miss() {
        let fx = Fixture::new();
        let cache = fx.cache(PROTOCOL_A);

        cache
            .save_negotiated_protocol_version(Some("1.0"), "2.5", "2.0")
            .await;

        assert!(cache.get_hello_cache_result(Some("1.2"), "2.5").await.is_none());
        assert!(cache.get_hello_cache_result(Some("1.0"), "2.7").await.is_none());
        assert!(cache.get_hello_cache_result(Some("1.0"), "2.5").await.is_some());
    }

    #[tokio::test]
    async fn test_protocols_are_isolated() {
        let fx = Fixture::new();
        let cache_a = fx.cache(PROTOCOL_A);
        let cache_b = fx.cache(PROTOCOL_B);

        cache_a
            .save_negotiated_protocol_version(Some("1.0"), "2.5", "2.0")
            .await;
        cache_b
            .save_negotiated_protocol_version(Some("100.0"), "200.5", "200.0")
            .await;

        let result_a = cache_a.get_hello_cache_result(Some("1.0"), "2.5").await.unwrap();
        assert_eq!(result_a.negotiated_protocol_version(), Some("2.0"));
        assert!(cache_a
            .get_hello_cache_result(Some("100.0"), "200.5")
            .await
            .is_none());

        let result_b = cache_b
            .get_hello_cache_result(Some("100.0"), "200.5")
            .await
            .unwrap();
        assert_eq!(result_b.negotiated_protocol_version(), Some("200.0"));
        assert!(cache_b.get_hello_cache_result(Some("1.0"), "2.5").await.is_none());
    }

    #[tokio::test]
    async fn test_target_app_update_invalidates() {
        let fx = Fixture::new();
        fx.cache(PROTOCOL_A)
            .save_negotiated_protocol_version(Some("1.0"), "2.5", "2.0")
            .await;

        fx.resolver.set_version(BROKER_APP, "2.0");
        let after_update = fx.cache(PROTOCOL_A);
        assert!(after_update
            .get_hello_cache_result(Some("1.0"), "2.5")
            .await
            .is_none());
        // The old entry is still physically present
        assert_eq!(fx.store.keys().await.len(), 1);
    }

    #[tokio::test]
    async fn test_target_app_uninstall_invalidates() {
        let fx = Fixture::new();
        fx.cache(PROTOCOL_A)
            .save_negotiated_protocol_version(Some("1.0"), "2.5", "2.0")
            .await;

        fx.resolver.remove(BROKER_APP);
        let after_uninstall = fx.cache(PROTOCOL_A);
        assert_eq!(after_uninstall.target_app_version(), None);
        assert!(after_uninstall
            .get_hello_cache_result(Some("1.0"), "2.5")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_unknown_version_never_reads() {
        let fx = Fixture::new();
        fx.resolver.remove(BROKER_APP);
        let cache = fx.cache(PROTOCOL_A);

        cache
            .save_negotiated_protocol_version(Some("1.0"), "2.5", "2.0")
            .await;

        // The write happened but is unreadable
        assert_eq!(
            fx.store.keys().await,
            vec!["MOCK_PROTOCOL_A[1.0,2.5]:MOCK_BROKER_APP_NAME[UNKNOWN_VERSION]".to_string()]
        );
        assert!(cache.get_hello_cache_result(Some("1.0"), "2.5").await.is_none());
    }

    #[tokio::test]
    async fn test_expiry_boundary() {
        let fx = Fixture::new();
        let cache = fx.cache_with_policy(PROTOCOL_A, CachePolicy::with_timeout(Duration::from_secs(1)));

        cache
            .save_negotiated_protocol_version(Some("1.0"), "2.5", "2.0")
            .await;

        fx.clock.advance(Duration::from_millis(999));
        assert!(cache.get_hello_cache_result(Some("1.0"), "2.5").await.is_some());

        fx.clock.advance(Duration::from_millis(1));
        assert!(cache.get_hello_cache_result(Some("1.0"), "2.5").await.is_none());

        fx.clock.advance(Duration::from_secs(1));
        assert!(cache.get_hello_cache_result(Some("1.0"), "2.5").await.is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_is_dropped_on_read() {
        let fx = Fixture::new();
        let cache = fx.cache_with_policy(PROTOCOL_A, CachePolicy::with_timeout(Duration::from_secs(1)));

        cache
            .save_negotiated_protocol_version(Some("1.0"), "2.5", "2.0")
            .await;
        cache.save_negotiated_protocol_version(None, "3.0", "3.0").await;

        fx.clock.advance(Duration::from_secs(1));
        assert!(cache.get_hello_cache_result(Some("1.0"), "2.5").await.is_none());

        // Only the entry that was read is dropped
        assert_eq!(
            fx.store.keys().await,
            vec!["MOCK_PROTOCOL_A[null,3.0]:MOCK_BROKER_APP_NAME[1.0]".to_string()]
        );
    }

    #[tokio::test]
    async fn test_handshake_error_read_write() {
        let fx = Fixture::new();
        let cache = fx.cache(PROTOCOL_A);

        cache
            .save_handshake_error(Some("1.0"), "2.5", Some("unsupported"), Some("too old"))
            .await;

        let result = cache.get_hello_cache_result(Some("1.0"), "2.5").await.unwrap();
        assert!(result.is_handshake_error());
        assert_eq!(result.negotiated_protocol_version(), None);
        assert_eq!(
            result,
            HelloCacheResult::HandshakeError {
                error_code: Some("unsupported".to_string()),
                error_message: Some("too old".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_handshake_error_expiry() {
        let fx = Fixture::new();
        let cache = fx.cache_with_policy(PROTOCOL_A, CachePolicy::with_timeout(Duration::from_secs(1)));

        cache.save_handshake_error(Some("1.0"), "2.5", None, None).await;
        assert!(cache
            .get_hello_cache_result(Some("1.0"), "2.5")
            .await
            .unwrap()
            .is_handshake_error());

        fx.clock.advance(Duration::from_secs(2));
        assert!(cache.get_hello_cache_result(Some("1.0"), "2.5").await.is_none());
    }

    #[tokio::test]
    async fn test_shorter_error_ttl() {
        let fx = Fixture::new();
        let policy = CachePolicy {
            timeout: Duration::from_secs(60),
            handshake_error_timeout: Some(Duration::from_secs(5)),
        };
        let cache = fx.cache_with_policy(PROTOCOL_A, policy);

        cache
            .save_negotiated_protocol_version(Some("1.0"), "2.5", "2.0")
            .await;
        cache.save_handshake_error(Some("3.0"), "4.0", None, None).await;

        fx.clock.advance(Duration::from_secs(10));
        assert!(cache.get_hello_cache_result(Some("1.0"), "2.5").await.is_some());
        assert!(cache.get_hello_cache_result(Some("3.0"), "4.0").await.is_none());
    }

    #[tokio::test]
    async fn test_renegotiation_overwrites() {
        let fx = Fixture::new();
        let cache = fx.cache(PROTOCOL_A);

        cache.save_handshake_error(Some("1.0"), "2.5", None, None).await;
        cache
            .save_negotiated_protocol_version(Some("1.0"), "2.5", "2.1")
            .await;

        let result = cache.get_hello_cache_result(Some("1.0"), "2.5").await.unwrap();
        assert_eq!(result.negotiated_protocol_version(), Some("2.1"));
        assert_eq!(fx.store.keys().await.len(), 1);
    }

    #[tokio::test]
    async fn test_legacy_value_is_a_miss() {
        let fx = Fixture::new();
        fx.store
            .put("MOCK_PROTOCOL_A[1.0,2.5]:MOCK_BROKER_APP_NAME[1.0]", "2.0")
            .await
            .unwrap();

        let cache = fx.cache(PROTOCOL_A);
        assert!(cache.get_hello_cache_result(Some("1.0"), "2.5").await.is_none());

        cache
            .save_negotiated_protocol_version(Some("1.0"), "2.5", "2.0")
            .await;
        let result = cache.get_hello_cache_result(Some("1.0"), "2.5").await.unwrap();
        assert_eq!(result.negotiated_protocol_version(), Some("2.0"));
    }

    #[tokio::test]
    async fn test_clear_cache_only_touches_own_scope() {
        let fx = Fixture::new();
        let cache_a = fx.cache(PROTOCOL_A);
        let cache_b = fx.cache(PROTOCOL_B);

        cache_a
            .save_negotiated_protocol_version(Some("1.0"), "2.5", "2.0")
            .await;
        cache_a.save_negotiated_protocol_version(None, "3.0", "3.0").await;
        cache_b
            .save_negotiated_protocol_version(Some("1.0"), "2.5", "2.0")
            .await;
        fx.store.put("unrelated", "value").await.unwrap();

        cache_a.clear_cache().await;

        assert!(cache_a.get_hello_cache_result(Some("1.0"), "2.5").await.is_none());
        assert!(cache_a.get_hello_cache_result(None, "3.0").await.is_none());
        assert!(cache_b.get_hello_cache_result(Some("1.0"), "2.5").await.is_some());
        assert_eq!(fx.store.get("unrelated").await.as_deref(), Some("value"));
    }

    struct ReadOnlyStore(MemoryNameValueStore);

    #[async_trait::async_trait]
    impl NameValueStore for ReadOnlyStore {
        async fn put(&self, _key: &str, _value: &str) -> Result<()> {
            Err(crate::errors::HelloError::LockUnavailable)
        }

        async fn get(&self, key: &str) -> Option<String> {
            self.0.get(key).await
        }

        async fn remove(&self, _key: &str) -> Result<()> {
            Err(crate::errors::HelloError::LockUnavailable)
        }

        async fn keys(&self) -> Vec<String> {
            self.0.keys().await
        }
    }

    #[tokio::test]
    async fn test_try_variants_surface_store_failures() {
        let fx = Fixture::new();
        fx.cache(PROTOCOL_A)
            .save_negotiated_protocol_version(Some("1.0"), "2.5", "2.0")
            .await;

        let cache = HelloCache::new(
            Arc::new(ReadOnlyStore((*fx.store).clone())),
            Arc::new(fx.clock.clone()),
            PROTOCOL_A,
            BROKER_APP,
            &fx.resolver,
            CachePolicy::default(),
        );

        assert!(cache
            .try_save_negotiated_protocol_version(Some("1.0"), "3.0", "3.0")
            .await
            .is_err());
        assert!(cache
            .try_save_handshake_error(Some("1.0"), "3.0", None, None)
            .await
            .is_err());
        assert!(cache.try_clear_cache().await.is_err());

        // The swallowing variants only log
        cache.save_negotiated_protocol_version(Some("1.0"), "3.0", "3.0").await;
        cache.clear_cache().await;
        assert!(cache.get_hello_cache_result(Some("1.0"), "2.5").await.is_some());
    }
}
