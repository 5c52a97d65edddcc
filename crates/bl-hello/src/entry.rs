use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a negotiation as persisted in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HelloCacheEntry {
    Negotiated {
        protocol_version: String,
    },
    HandshakeError {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_code: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },
}

/// Stored value: the entry plus the time it was written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    #[serde(flatten)]
    pub entry: HelloCacheEntry,
    pub written_at_ms: i64,
}

impl StoredEntry {
    pub fn new(entry: HelloCacheEntry, written_at: DateTime<Utc>) -> Self {
        Self {
            entry,
            written_at_ms: written_at.timestamp_millis(),
        }
    }

    /// Parse a stored value; anything unrecognized is `None`
    pub fn decode(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Milliseconds elapsed between the write and `now`
    pub fn age_ms(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp_millis().saturating_sub(self.written_at_ms)
    }
}

/// What a cache read hands back to callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelloCacheResult {
    Negotiated(String),
    HandshakeError {
        error_code: Option<String>,
        error_message: Option<String>,
    },
}

impl HelloCacheResult {
    pub fn negotiated_protocol_version(&self) -> Option<&str> {
        match self {
            Self::Negotiated(version) => Some(version),
            Self::HandshakeError { .. } => None,
        }
    }

    pub fn is_handshake_error(&self) -> bool {
        matches!(self, Self::HandshakeError { .. })
    }
}

impl From<HelloCacheEntry> for HelloCacheResult {
    fn from(entry: HelloCacheEntry) -> Self {
        match entry {
            HelloCacheEntry::Negotiated { protocol_version } => Self::Negotiated(protocol_version),
            HelloCacheEntry::HandshakeError {
                error_code,
                error_message,
            } => Self::HandshakeError {
                error_code,
                error_message,
            },
        }
    }
}
