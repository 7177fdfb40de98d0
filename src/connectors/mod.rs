//! Connectors for feeding streams from external transports

pub mod connector_errors;
pub mod message_channel;

pub mod loopback;
pub mod socket;

// Re-export main types
pub use connector_errors::{ConnectorError, ConnectorResult};
pub use message_channel::{ChannelEvent, ListenerId, MessageChannel};

// Re-export connector implementations
pub use loopback::LoopbackChannel;
pub use socket::{SocketConfig, SocketConnector};
