//! Error types and handling for plexus-stream
//!
//! This module provides the error type carried on the failure track of
//! streams and connectors.

use std::fmt;

/// Main error type for plexus-stream operations
#[derive(Debug, Clone, PartialEq)]
pub enum StreamError {
    /// The underlying channel or stream is closed
    Closed,
    /// A payload could not be encoded or decoded
    Codec(String),
    /// Transport-level failure reported by a channel
    Channel(String),
    /// Custom error with message
    Custom(String),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Closed => write!(f, "Stream closed"),
            StreamError::Codec(msg) => write!(f, "Codec error: {}", msg),
            StreamError::Channel(msg) => write!(f, "Channel error: {}", msg),
            StreamError::Custom(msg) => write!(f, "Stream error: {}", msg),
        }
    }
}

impl std::error::Error for StreamError {}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::Channel(err.to_string())
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(err: serde_json::Error) -> Self {
        StreamError::Codec(err.to_string())
    }
}

/// Result type for plexus-stream operations
pub type StreamResult<T> = Result<T, StreamError>;
