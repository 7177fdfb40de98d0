//! Socket connector adapting a message channel into typed streams
//!
//! Wraps any [`MessageChannel`] and exposes its inbound payloads as lazy
//! [`Stream`]s of decoded messages. The channel listener is attached only
//! while somebody observes the stream and detached again when the last
//! observer leaves.

use std::cell::Cell;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StreamError;
use crate::stream::{Emitter, Stream};

use super::connector_errors::ConnectorResult;
use super::message_channel::{ChannelEvent, ListenerId, MessageChannel};

/// Socket connector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketConfig {
    /// Name used in log output
    pub name: String,
    /// Fail the message stream on the first undecodable payload instead of
    /// skipping it
    pub strict_decode: bool,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            name: "socket".to_string(),
            strict_decode: false,
        }
    }
}

/// Adapter between a [`MessageChannel`] and typed message streams.
///
/// Tracks whether the transport is up and lets callers send serializable
/// messages and observe decoded inbound ones.
pub struct SocketConnector<C: MessageChannel> {
    channel: Rc<C>,
    config: SocketConfig,
    online: Rc<Cell<bool>>,
    status_listener: ListenerId,
}

impl<C: MessageChannel + 'static> SocketConnector<C> {
    /// Wrap a channel, immediately tracking its open state.
    pub fn new(channel: C, config: SocketConfig) -> Self {
        let channel = Rc::new(channel);
        let online = Rc::new(Cell::new(false));
        let tracker = Rc::clone(&online);
        let name = config.name.clone();
        let status_listener = channel.attach(Box::new(move |event| match event {
            ChannelEvent::Opened => {
                tracker.set(true);
                log::info!("{}: channel opened", name);
            }
            ChannelEvent::Closed => {
                tracker.set(false);
                log::info!("{}: channel closed", name);
            }
            ChannelEvent::Message(_) => {}
        }));
        SocketConnector {
            channel,
            config,
            online,
            status_listener,
        }
    }

    /// Check whether the transport is currently up.
    pub fn is_online(&self) -> bool {
        self.online.get()
    }

    /// Get the connector configuration.
    pub fn config(&self) -> &SocketConfig {
        &self.config
    }

    /// Get the wrapped channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Lazy stream of decoded inbound messages.
    ///
    /// A channel listener is attached per activation and detached when the
    /// stream closes. Payloads that fail to decode are skipped with a
    /// warning, or fail the stream when
    /// [`strict_decode`](SocketConfig::strict_decode) is set.
    pub fn messages<M>(&self) -> Stream<M>
    where
        M: DeserializeOwned + Clone + 'static,
    {
        let channel = Rc::clone(&self.channel);
        let name = self.config.name.clone();
        let strict = self.config.strict_decode;
        Stream::new(move |emitter: Emitter<M, (), StreamError>| {
            let decode_name = name.clone();
            let id = channel.attach(Box::new(move |event| {
                if let ChannelEvent::Message(payload) = event {
                    match serde_json::from_str::<M>(payload) {
                        Ok(message) => emitter.push(message),
                        Err(err) if strict => {
                            log::warn!(
                                "{}: failing message stream on decode error: {}",
                                decode_name,
                                err
                            );
                            emitter.fail(StreamError::from(err));
                        }
                        Err(err) => {
                            log::warn!("{}: skipping undecodable message: {}", decode_name, err);
                        }
                    }
                }
            }));
            log::debug!("{}: message listener attached", name);
            let channel = Rc::clone(&channel);
            Some(Box::new(move || channel.detach(id)))
        })
    }

    /// Serialize a message and send it over the channel.
    pub fn send<M: Serialize>(&self, message: &M) -> ConnectorResult<()> {
        let payload = serde_json::to_string(message)?;
        self.channel.send(&payload)
    }
}

impl<C: MessageChannel> Drop for SocketConnector<C> {
    fn drop(&mut self) {
        self.channel.detach(self.status_listener);
    }
}
