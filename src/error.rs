use thiserror::Error;

/// Result type for ceiling light operations
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Errors that can occur when talking to the ceiling light
#[derive(Error, Debug)]
pub enum DeviceError {
    /// TCP connection could not be established (refused, unreachable)
    #[error("Connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// Command could not be written to the socket
    #[error("Send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Device did not answer within the configured timeout
    #[error("Request timeout")]
    Timeout,

    /// Device closed the connection without sending a response
    #[error("Connection closed by peer")]
    ClosedByPeer,

    /// Response was malformed or missing expected fields
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Value outside the range the protocol accepts
    #[error("Value {value} out of range [{min}, {max}]")]
    InvalidRange {
        /// Rejected value
        value: i64,
        /// Minimum accepted value
        min: i64,
        /// Maximum accepted value
        max: i64,
    },

    /// Invalid configuration value
    #[error("Config error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (snapshot files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeviceError {
    /// Whether the error means the device could not be reached at all,
    /// as opposed to a device that accepted the connection and then hung.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, DeviceError::ConnectFailed(_))
    }
}
