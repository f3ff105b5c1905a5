//! Error types for the LitLayer trading key system.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Key generation error: {message}")]
    KeyGeneration { message: String },

    #[error("Encoding error: {message}")]
    Encoding { message: String },

    #[error("Invalid key: {message}")]
    InvalidKey { message: String },

    #[error("Invalid signature: {message}")]
    InvalidSignature { message: String },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Session record error: {0}")]
    Record(#[from] serde_json::Error),

    #[error("Storage operation `{operation}` timed out after {timeout:?}")]
    StorageTimeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    #[error("Expiry time {expiry_time} is not after signing time {now}")]
    InvalidExpiry { expiry_time: u64, now: u64 },

    #[error("Session {session_id} expired at {expiry_time}")]
    SessionExpired { session_id: String, expiry_time: u64 },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl Error {
    pub(crate) fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_signature(message: impl Into<String>) -> Self {
        Self::InvalidSignature {
            message: message.into(),
        }
    }

    /// Whether the error came from the storage backend rather than the
    /// cryptographic path.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Error::Storage(_)
                | Error::Record(_)
                | Error::StorageTimeout { .. }
                | Error::InvalidSessionId(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
