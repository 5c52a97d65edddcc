use std::fmt;

use crate::bundle::Bundle;
use crate::errors::Result;
use crate::operation::BrokerOperationBundle;

/// Channel used to reach the broker process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpcStrategyType {
    ContentProvider,
    BoundService,
    AccountManager,
}

impl fmt::Display for IpcStrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ContentProvider => "content_provider",
            Self::BoundService => "bound_service",
            Self::AccountManager => "account_manager",
        };
        f.write_str(s)
    }
}

/// Anything that can carry one request to the broker and bring back its reply
#[async_trait::async_trait]
pub trait IpcTransport: Send + Sync {
    /// Send the operation and wait for the broker's result bag
    async fn communicate(&self, request: &BrokerOperationBundle) -> Result<Bundle>;
}

/// A concrete IPC channel
pub trait IpcStrategy: IpcTransport {
    fn strategy_type(&self) -> IpcStrategyType;

    /// Whether the targeted broker exposes this channel at all
    fn is_supported_by_targeted_broker(&self, _target_broker_package: &str) -> bool {
        true
    }
}
