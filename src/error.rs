//! Error types for iotdm-client.

use thiserror::Error;

/// Main error type for all device-management operations.
#[derive(Debug, Error)]
pub enum DmError {
    /// Unknown object, instance or property.
    #[error("Not found")]
    NotFound,

    /// The property exists but does not permit the requested operation.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Bad caller input or an unparsable typed value.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A callback declined to support the operation.
    #[error("Not implemented")]
    NotImplemented,

    /// Unexpected internal state.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Token or credential construction failed.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Transport could not be opened within the retry budget.
    #[error("Failed to connect after {attempts} attempts")]
    ConnectFailure { attempts: u32 },

    /// Reassembly discarded a frame larger than the receive buffer.
    ///
    /// Only ever logged by the reassembler, never returned from `push`.
    #[error("Frame of {declared} bytes exceeds buffer capacity {capacity}")]
    FrameTooLarge { declared: usize, capacity: usize },

    /// The server rejected the registration or never answered it.
    #[error("Registration failed")]
    RegistrationFailed,

    /// The LWM2M Server and Device objects must be registered before connecting.
    #[error("Mandatory objects (server, device) are not registered")]
    MissingMandatoryObjects,

    /// Malformed configuration or connection string.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error (configuration only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The client is shutting down and accepts no more work.
    #[error("Client is shutting down")]
    ShuttingDown,
}

/// Result type alias using DmError.
pub type Result<T> = std::result::Result<T, DmError>;

/// Outcome reported by a user resource callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackError {
    /// The callback does not support this property.
    #[error("not implemented")]
    NotImplemented,

    /// The value or arguments were rejected.
    #[error("invalid argument")]
    InvalidArgument,

    /// Any other failure.
    #[error("callback failed: {0}")]
    Failed(String),
}

/// Result type for user resource callbacks.
pub type CallbackResult<T> = std::result::Result<T, CallbackError>;
