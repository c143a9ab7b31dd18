use thiserror::Error;

/// Result type for Shelly operations
pub type Result<T> = std::result::Result<T, ShellyError>;

/// Errors that can occur when talking to Shelly devices
#[derive(Error, Debug)]
pub enum ShellyError {
    /// WebSocket protocol or I/O error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A connection attempt failed before the socket opened
    #[error("Failed to connect to {url}: {reason}")]
    ConnectFailed {
        /// Endpoint that was being dialled
        url: String,
        /// Underlying failure
        reason: String,
    },

    /// The connection was closed, or the client was destroyed
    #[error("Connection closed")]
    ConnectionClosed,

    /// Request timed out waiting for a response
    #[error("Request timeout: {method}")]
    Timeout {
        /// RPC method that timed out
        method: String,
    },

    /// The device answered with an error object
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// Error code reported by the device
        code: i64,
        /// Error message reported by the device
        message: String,
    },

    /// The device requires authentication but no password is configured
    #[error("Unauthorized")]
    Unauthorized,

    /// The device rejected the computed authentication response
    #[error("Invalid password")]
    InvalidPassword,

    /// The authentication challenge could not be parsed
    #[error("Invalid authentication challenge: {0}")]
    InvalidChallenge(String),

    /// The challenge asks for an auth type or algorithm we do not implement
    #[error("Unsupported authentication: {0}")]
    UnsupportedAuth(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A discovered device came without a hostname
    #[error("Device {0} has no hostname")]
    MissingHostname(String),

    /// The device reports a model that is not in the registry
    #[error("Unknown model {model} for device {device_id}")]
    UnknownModel {
        /// Device that reported the model
        device_id: String,
        /// Model identifier as reported by the device
        model: String,
    },

    /// A model with the same identifier is already registered
    #[error("Model already registered: {0}")]
    DuplicateModel(String),

    /// A model declares a component key that cannot be parsed
    #[error("Invalid model {model}: {reason}")]
    InvalidModel {
        /// Model identifier
        model: String,
        /// What is wrong with it
        reason: String,
    },

    /// Invalid or unexpected response from the device
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Channel receive error
    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl ShellyError {
    /// Whether the device reported an authentication challenge
    pub fn is_auth_challenge(&self) -> bool {
        matches!(self, ShellyError::Rpc { code, .. } if *code == crate::protocol::UNAUTHORIZED_CODE)
    }
}
