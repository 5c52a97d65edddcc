use std::fmt;

use thiserror::Error;

use crate::strategy::IpcStrategyType;

/// Why an IPC call to the broker failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Channel unavailable, remote crashed or the reply could not be read
    ConnectionError,
    /// The client has no way to issue this call (e.g. no usable strategy)
    OperationNotSupportedOnClientSide,
    /// The broker does not implement the requested operation
    OperationNotSupportedOnServerSide,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ConnectionError => "connection_error",
            Self::OperationNotSupportedOnClientSide => "operation_not_supported_on_client_side",
            Self::OperationNotSupportedOnServerSide => "operation_not_supported_on_server_side",
        };
        f.write_str(s)
    }
}

/// Transport-level failure talking to the broker
///
/// These are transient by nature and must never be cached by callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "IPC failed{} ({category}): {message}",
    .strategy.as_ref().map(|s| format!(" via {s}")).unwrap_or_default()
)]
pub struct CommunicationError {
    pub category: Category,
    /// Strategy that produced the failure; `None` when no strategy was tried
    pub strategy: Option<IpcStrategyType>,
    pub message: String,
}

impl CommunicationError {
    pub fn new(category: Category, strategy: IpcStrategyType, message: impl Into<String>) -> Self {
        Self {
            category,
            strategy: Some(strategy),
            message: message.into(),
        }
    }

    pub fn connection(strategy: IpcStrategyType, message: impl Into<String>) -> Self {
        Self::new(Category::ConnectionError, strategy, message)
    }

    /// The broker answered but does not implement the operation
    pub fn not_supported_on_server(strategy: IpcStrategyType, message: impl Into<String>) -> Self {
        Self::new(Category::OperationNotSupportedOnServerSide, strategy, message)
    }

    /// No strategy on this side can reach the broker
    pub fn no_usable_strategy(message: impl Into<String>) -> Self {
        Self {
            category: Category::OperationNotSupportedOnClientSide,
            strategy: None,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CommunicationError>;
