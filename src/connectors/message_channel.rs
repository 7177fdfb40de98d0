//! Core trait for message channels feeding streams

use super::connector_errors::ConnectorResult;

/// A lifecycle or payload notification from a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The transport came up
    Opened,
    /// A raw text payload arrived
    Message(String),
    /// The transport went down
    Closed,
}

/// Identity of one listener attached to a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// A bidirectional text transport that connectors adapt into streams.
///
/// Implementations own the underlying socket or pipe and fan incoming
/// events out to attached listeners. Listener callbacks run synchronously
/// on the delivering call; an implementation must tolerate listeners that
/// attach or detach other listeners during delivery.
pub trait MessageChannel {
    /// Attach a listener for every subsequent channel event.
    fn attach(&self, listener: Box<dyn FnMut(&ChannelEvent)>) -> ListenerId;

    /// Detach a previously attached listener. Unknown identifiers are
    /// ignored.
    fn detach(&self, id: ListenerId);

    /// Send a raw text payload over the transport.
    fn send(&self, payload: &str) -> ConnectorResult<()>;
}
