//! Lazy, multicast, push-based event streams
//!
//! This module provides the [`Stream`] primitive and its combinators. A
//! stream stays cold until observed, shares one producer activation among
//! all observers, and settles exactly once with a success value or an
//! error. Delivery is synchronous and single-threaded.

pub mod core;
pub mod deferred;
pub mod event;
pub mod registry;

mod combinators;
mod constructors;

// Re-export core types
pub use core::{CloseHandle, Emitter, Publisher, Stream};
pub use deferred::Deferred;
pub use event::StreamEvent;
pub use registry::Disposer;
