//! Broker protocol negotiation ("hello") with a persistent result cache
//!
//! Before talking to an authentication broker a client agrees with it on a
//! wire-protocol version. That round trip goes over IPC and is expensive, so
//! its outcome is cached per protocol, version range and target broker build.
//!
//! # Handshake Flow
//!
//! 1. Build the [`HelloCache`] for the protocol and the broker's current build
//! 2. Serve a fresh cached version, or fail with a fresh cached rejection
//! 3. Otherwise send one hello request through the IPC transport
//! 4. Cache the negotiated version or the broker's rejection
//! 5. Transport failures are returned as-is and never cached
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use bl_hello::{
//!     CachePolicy, HelloExecutor, HelloRequest, MemoryNameValueStore, StaticVersionResolver,
//!     SystemClock,
//! };
//! use bl_ipc::{BrokerOperationBundle, Bundle, IpcTransport};
//!
//! struct LoopbackBroker;
//!
//! #[async_trait::async_trait]
//! impl IpcTransport for LoopbackBroker {
//!     async fn communicate(&self, _request: &BrokerOperationBundle) -> bl_ipc::Result<Bundle> {
//!         let mut reply = Bundle::new();
//!         reply.put_string(bl_hello::handshake::keys::NEGOTIATED_BP_VERSION, "2.0");
//!         Ok(reply)
//!     }
//! }
//!
//! # async fn example() -> bl_hello::Result<()> {
//! let executor = HelloExecutor::new(
//!     Arc::new(MemoryNameValueStore::new()),
//!     Arc::new(SystemClock),
//!     Arc::new(StaticVersionResolver::with_version("com.example.broker", "42")),
//!     CachePolicy::default(),
//! );
//!
//! let request = HelloRequest::new("msal.broker", Some("1.0"), "2.5");
//! let version = executor.hello(&LoopbackBroker, "com.example.broker", &request).await?;
//! assert_eq!(version, "2.0");
//!
//! // Served from cache this time
//! let cached = executor
//!     .hello_cache("msal.broker", "com.example.broker")
//!     .get_hello_cache_result(Some("1.0"), "2.5")
//!     .await;
//! assert_eq!(cached.unwrap().negotiated_protocol_version(), Some("2.0"));
//! # Ok(())
//! # }
//! # tokio_test::block_on(example()).unwrap();
//! ```
//!
//! # Storage
//!
//! The cache sits on any [`NameValueStore`]. [`MemoryNameValueStore`] suits
//! tests; [`FileNameValueStore`] persists to a JSON file per namespace and is
//! safe to share between processes.

pub mod cache;
pub mod clock;
pub mod config;
pub mod entry;
pub mod errors;
pub mod file_store;
pub mod handshake;
pub mod key;
pub mod store;
pub mod version;

// Re-export main types
pub use cache::HelloCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CachePolicy, HelloConfig};
pub use entry::{HelloCacheEntry, HelloCacheResult};
pub use errors::{HelloError, Result};
pub use file_store::FileNameValueStore;
pub use handshake::{HelloExecutor, HelloRequest, HelloResponse};
pub use key::CacheKey;
pub use store::{MemoryNameValueStore, NameValueStore};
pub use version::{AppVersionResolver, StaticVersionResolver};
