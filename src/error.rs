//! Error types for the toolkit
//!
//! Two layers: [`TransportError`] is produced by [`Transport`](crate::Transport)
//! implementations and stays opaque to the core; [`ToolboxError`] is the
//! bounded taxonomy the decoding/polling engine itself can produce.

use thiserror::Error;

/// Result type for toolkit operations
pub type ToolboxResult<T> = std::result::Result<T, ToolboxError>;

/// Transport-level errors
///
/// The wire protocol (framing, sockets, transaction handling) is owned by the
/// transport implementation; the core only distinguishes these broad classes
/// to decide whether a retry makes sense.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// Request timed out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(String),

    /// Protocol-level errors (exception responses, malformed frames)
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}

// Helper methods for creating errors
impl TransportError {
    pub fn connection(msg: impl Into<String>) -> Self {
        TransportError::Connection(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        TransportError::Timeout(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        TransportError::Io(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        TransportError::Protocol(msg.into())
    }
}

/// Core toolkit errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolboxError {
    /// Transport failure, propagated opaquely
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A read or write gave up after the configured attempt budget
    #[error("Retries exhausted for address {address} after {attempts} attempts")]
    RetriesExhausted { address: u32, attempts: u32 },

    /// Raw registers could not be decoded into a value
    #[error("Decode error: {reason}")]
    Decode { reason: String },

    /// Logical index maps outside the device's address space
    #[error("Address out of range: logical index {index}")]
    AddressOutOfRange { index: u32 },

    /// Profile rejected at construction time
    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    /// Sentinel pre-flight read failed, batch short-circuited
    #[error("Sentinel read failed at address {address}")]
    SentinelFailure { address: u32 },
}

impl ToolboxError {
    pub fn decode(reason: impl Into<String>) -> Self {
        ToolboxError::Decode {
            reason: reason.into(),
        }
    }

    pub fn invalid_profile(msg: impl Into<String>) -> Self {
        ToolboxError::InvalidProfile(msg.into())
    }

    /// Check if this error is absorbed into an absent slot during a batch poll
    pub fn is_absorbable(&self) -> bool {
        matches!(
            self,
            ToolboxError::Transport(_)
                | ToolboxError::RetriesExhausted { .. }
                | ToolboxError::Decode { .. }
        )
    }
}
