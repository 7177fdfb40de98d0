//! Event type delivered to stream observers

use crate::error::StreamError;

/// A single notification delivered to an observer.
///
/// Every stream emits any number of `Data` events followed by at most one
/// terminal event. `Success` carries the resolution value, `Failure` the
/// error. After a terminal event no further events are delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent<T, R = (), E = StreamError> {
    /// An intermediate value pushed by the producer
    Data(T),
    /// The stream finished and resolved with a value
    Success(R),
    /// The stream finished with an error
    Failure(E),
}

impl<T, R, E> StreamEvent<T, R, E> {
    /// Check whether this event ends the stream
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Data(_))
    }

    /// Get the data value, if this is a `Data` event
    pub fn data(&self) -> Option<&T> {
        match self {
            StreamEvent::Data(value) => Some(value),
            _ => None,
        }
    }
}
