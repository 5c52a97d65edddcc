use bl_ipc::CommunicationError;
use thiserror::Error;

/// Error code used when the broker rejects the version range without saying why
pub const UNSUPPORTED_BROKER_VERSION_ERROR_CODE: &str = "unsupported_broker_version";
pub const UNSUPPORTED_BROKER_VERSION_ERROR_MESSAGE: &str =
    "The version of broker installed on the device is not compatible with this app version.";

/// Hello handshake error types
#[derive(Error, Debug)]
pub enum HelloError {
    /// The IPC call itself failed; never cached, safe to retry
    #[error("Broker communication failed: {0}")]
    Communication(#[from] CommunicationError),

    /// The broker rejected the requested protocol version range
    #[error("Unsupported broker protocol ({error_code}): {error_message}")]
    UnsupportedProtocol {
        error_code: String,
        error_message: String,
    },

    #[error("Invalid hello response: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Cache store error: {0}")]
    Store(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Cache store is locked by another process")]
    LockUnavailable,
}

impl HelloError {
    /// Build an [`HelloError::UnsupportedProtocol`], filling in defaults for
    /// whatever the broker left out
    pub fn unsupported(error_code: Option<&str>, error_message: Option<&str>) -> Self {
        Self::UnsupportedProtocol {
            error_code: error_code
                .filter(|c| !c.is_empty())
                .unwrap_or(UNSUPPORTED_BROKER_VERSION_ERROR_CODE)
                .to_string(),
            error_message: error_message
                .filter(|m| !m.is_empty())
                .unwrap_or(UNSUPPORTED_BROKER_VERSION_ERROR_MESSAGE)
                .to_string(),
        }
    }

    /// Whether repeating the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Communication(_))
    }
}

pub type Result<T> = std::result::Result<T, HelloError>;
