//! Error types for connectors

/// Main error type for connector operations
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("Channel is closed")]
    ChannelClosed,

    #[error("Serialization error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type for connector operations
pub type ConnectorResult<T> = Result<T, ConnectorError>;
