use std::sync::Arc;

use bl_ipc::{BrokerOperation, BrokerOperationBundle, Bundle, IpcTransport};
use tracing::{debug, info, instrument};

use crate::cache::HelloCache;
use crate::clock::Clock;
use crate::config::CachePolicy;
use crate::entry::HelloCacheResult;
use crate::errors::{HelloError, Result};
use crate::store::NameValueStore;
use crate::version::AppVersionResolver;

/// Result bag and request keys understood by the broker
pub mod keys {
    pub const PROTOCOL_NAME: &str = "broker.protocol.name";
    pub const CLIENT_ADVERTISED_MAXIMUM_BP_VERSION: &str = "broker.protocol.version.name";
    pub const CLIENT_CONFIGURED_MINIMUM_BP_VERSION: &str = "required.broker.protocol.version.name";
    pub const NEGOTIATED_BP_VERSION: &str = "common.broker.protocol.version.name";
    pub const HELLO_ERROR_CODE: &str = "HELLO_ERROR_CODE";
    pub const HELLO_ERROR_MESSAGE: &str = "HELLO_ERROR_MESSAGE";
}

/// Version range a client asks the broker to agree on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloRequest {
    pub protocol_name: String,
    pub minimum_version: Option<String>,
    pub maximum_version: String,
}

impl HelloRequest {
    pub fn new(
        protocol_name: impl Into<String>,
        minimum_version: Option<&str>,
        maximum_version: impl Into<String>,
    ) -> Self {
        Self {
            protocol_name: protocol_name.into(),
            minimum_version: minimum_version.map(str::to_string),
            maximum_version: maximum_version.into(),
        }
    }

    pub fn to_bundle(&self) -> Bundle {
        let mut bundle = Bundle::new();
        bundle
            .put_string(keys::PROTOCOL_NAME, &self.protocol_name)
            .put_string(keys::CLIENT_ADVERTISED_MAXIMUM_BP_VERSION, &self.maximum_version);
        if let Some(minimum) = self.minimum_version.as_deref().filter(|m| !m.is_empty()) {
            bundle.put_string(keys::CLIENT_CONFIGURED_MINIMUM_BP_VERSION, minimum);
        }
        bundle
    }
}

/// Broker reply to a hello, decoded once at the transport boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelloResponse {
    Negotiated(String),
    HandshakeError {
        error_code: Option<String>,
        error_message: Option<String>,
    },
}

impl HelloResponse {
    /// Decode the broker's result bag
    ///
    /// An error code or message wins over a negotiated version when both are
    /// present. A bag carrying neither is rejected.
    pub fn from_bundle(bundle: &Bundle) -> Result<Self> {
        let error_code = bundle.get_string(keys::HELLO_ERROR_CODE);
        let error_message = bundle.get_string(keys::HELLO_ERROR_MESSAGE);
        if error_code.is_some() || error_message.is_some() {
            return Ok(Self::HandshakeError {
                error_code: error_code.map(str::to_string),
                error_message: error_message.map(str::to_string),
            });
        }

        match bundle.get_string(keys::NEGOTIATED_BP_VERSION) {
            Some(version) if !version.is_empty() => Ok(Self::Negotiated(version.to_string())),
            _ => Err(HelloError::InvalidResponse(
                "Broker reply has neither a negotiated version nor an error".to_string(),
            )),
        }
    }
}

/// Runs hello handshakes, consulting and filling the hello cache
///
/// Two sequential calls with the same protocol, bounds and target build hit
/// the transport at most once within the cache TTL, whether the first call
/// succeeded or was rejected. Concurrent callers racing on a cold key may
/// both reach the broker; the last write wins.
pub struct HelloExecutor {
    store: Arc<dyn NameValueStore>,
    clock: Arc<dyn Clock>,
    resolver: Arc<dyn AppVersionResolver>,
    policy: CachePolicy,
}

impl HelloExecutor {
    pub fn new(
        store: Arc<dyn NameValueStore>,
        clock: Arc<dyn Clock>,
        resolver: Arc<dyn AppVersionResolver>,
        policy: CachePolicy,
    ) -> Self {
        Self {
            store,
            clock,
            resolver,
            policy,
        }
    }

    /// Build the cache scoped to `protocol_name` and the target's current build
    pub fn hello_cache(&self, protocol_name: &str, target_app_package_name: &str) -> HelloCache {
        HelloCache::new(
            self.store.clone(),
            self.clock.clone(),
            protocol_name,
            target_app_package_name,
            self.resolver.as_ref(),
            self.policy,
        )
    }

    /// Negotiate a protocol version with the broker in `target_app_package_name`
    #[instrument(skip(self, transport), fields(protocol = %request.protocol_name))]
    pub async fn hello(
        &self,
        transport: &dyn IpcTransport,
        target_app_package_name: &str,
        request: &HelloRequest,
    ) -> Result<String> {
        let cache = self.hello_cache(&request.protocol_name, target_app_package_name);
        let minimum = request.minimum_version.as_deref();
        let maximum = request.maximum_version.as_str();

        match cache.get_hello_cache_result(minimum, maximum).await {
            Some(HelloCacheResult::Negotiated(version)) => {
                debug!("Using cached negotiated protocol version {}", version);
                return Ok(version);
            }
            Some(HelloCacheResult::HandshakeError {
                error_code,
                error_message,
            }) => {
                debug!("Using cached hello handshake error");
                return Err(HelloError::unsupported(
                    error_code.as_deref(),
                    error_message.as_deref(),
                ));
            }
            None => {}
        }

        debug!("Hello cache miss, contacting broker");
        let operation = BrokerOperationBundle::new(
            BrokerOperation::Hello,
            target_app_package_name,
            request.to_bundle(),
        );
        let reply = transport.communicate(&operation).await?;

        match HelloResponse::from_bundle(&reply)? {
            HelloResponse::Negotiated(version) => {
                info!("Negotiated broker protocol version {}", version);
                cache
                    .save_negotiated_protocol_version(minimum, maximum, &version)
                    .await;
                Ok(version)
            }
            HelloResponse::HandshakeError {
                error_code,
                error_message,
            } => {
                info!(
                    "Broker rejected protocol range: {}",
                    error_code.as_deref().unwrap_or("<no code>")
                );
                cache
                    .save_handshake_error(
                        minimum,
                        maximum,
                        error_code.as_deref(),
                        error_message.as_deref(),
                    )
                    .await;
                Err(HelloError::unsupported(
                    error_code.as_deref(),
                    error_message.as_deref(),
                ))
            }
        }
    }
}

impl std::fmt::Debug for HelloExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HelloExecutor")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
