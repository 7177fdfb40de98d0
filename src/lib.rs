pub mod connectors;
pub mod error;
pub mod stream;

// Re-export the stream core at the crate root
pub use error::{StreamError, StreamResult};
pub use stream::{CloseHandle, Deferred, Disposer, Emitter, Publisher, Stream, StreamEvent};
