//! Core stream type: lazy activation, multicast delivery, settlement
//!
//! A [`Stream`] is a cheap clonable handle onto shared state. The producer
//! callback is held until the first observer arrives, every event fans out
//! to all current observers synchronously, and the stream settles exactly
//! once with a success value or an error.
//!
//! All callbacks run on the caller's stack. Internal cells are never kept
//! borrowed across a callback invocation, so observers may dispose
//! themselves, add further observers, or settle other streams mid-delivery.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::StreamError;

use super::deferred::Deferred;
use super::event::StreamEvent;
use super::registry::{Disposer, ObserverFn, ObserverId, ObserverRegistry};

/// Cleanup action returned by a publisher, run once when the activation ends.
pub type CloseHandle = Box<dyn FnOnce()>;

/// Producer callback driving a stream.
///
/// Invoked when the stream gains its first observer, and again on every
/// reactivation after a transient close. May push any number of values
/// through the [`Emitter`] before or after returning, and may hand back a
/// [`CloseHandle`] to release resources when the activation ends.
pub type Publisher<T, R = (), E = StreamError> =
    Box<dyn FnMut(Emitter<T, R, E>) -> Option<CloseHandle>>;

pub(crate) enum CompletionMode<R, E> {
    /// The stream owns its settlement cell.
    Owned,
    /// The stream reports completion through another stream's cell and
    /// never delivers terminal events of its own.
    Inherited(Deferred<R, E>),
}

pub(crate) struct StreamState<T, R, E> {
    publisher: RefCell<Option<Publisher<T, R, E>>>,
    active: Cell<bool>,
    terminated: Cell<bool>,
    pinned: Cell<bool>,
    registry: RefCell<ObserverRegistry<T, R, E>>,
    close_handle: RefCell<Option<CloseHandle>>,
    pub(crate) completion: Deferred<R, E>,
}

/// A lazy, multicast, push-based event stream.
///
/// Cloning the handle shares the underlying stream. Nothing happens until
/// the first observer subscribes; once all observers leave the stream closes
/// transiently and the next observer starts it again. Settlement through
/// [`Emitter::settle`] or [`Emitter::fail`] is permanent.
///
/// `Stream` is deliberately single-threaded and is not `Send`.
///
/// # Examples
///
/// ```
/// use plexus_stream::Stream;
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let stream: Stream<i32> = Stream::new(|emitter| {
///     emitter.push(1);
///     emitter.push(2);
///     emitter.settle(());
///     None
/// });
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let sink = Rc::clone(&seen);
/// stream.for_each(move |value| sink.borrow_mut().push(value));
/// assert_eq!(*seen.borrow(), vec![1, 2]);
/// ```
pub struct Stream<T, R = (), E = StreamError> {
    pub(crate) state: Rc<StreamState<T, R, E>>,
}

impl<T, R, E> Clone for Stream<T, R, E> {
    fn clone(&self) -> Self {
        Stream {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T, R, E> Stream<T, R, E>
where
    T: Clone + 'static,
    R: Clone + 'static,
    E: Clone + 'static,
{
    /// Create a stream driven by `publisher`.
    ///
    /// The publisher is not invoked here; it runs when the first observer
    /// subscribes.
    pub fn new(publisher: impl FnMut(Emitter<T, R, E>) -> Option<CloseHandle> + 'static) -> Self {
        Self::with_completion(Box::new(publisher), CompletionMode::Owned)
    }

    pub(crate) fn with_completion(
        publisher: Publisher<T, R, E>,
        mode: CompletionMode<R, E>,
    ) -> Self {
        let completion = match mode {
            CompletionMode::Owned => Deferred::new(),
            CompletionMode::Inherited(shared) => shared,
        };
        Stream {
            state: Rc::new(StreamState {
                publisher: RefCell::new(Some(publisher)),
                active: Cell::new(false),
                terminated: Cell::new(false),
                pinned: Cell::new(false),
                registry: RefCell::new(ObserverRegistry::new()),
                close_handle: RefCell::new(None),
                completion,
            }),
        }
    }

    /// Subscribe to every event, data and terminal alike.
    ///
    /// The callback also receives a [`Disposer`] for its own subscription so
    /// it can unsubscribe from inside a delivery. The returned disposer
    /// keeps the stream reachable, so a subscription taken on a temporary
    /// stream handle stays deliverable. Subscribing to a terminated stream
    /// is a no-op and returns an inert disposer.
    pub fn observe(
        &self,
        callback: impl FnMut(StreamEvent<T, R, E>, Disposer) + 'static,
    ) -> Disposer {
        if self.state.terminated.get() {
            return Disposer::noop();
        }

        let disposer = {
            let mut registry = self.state.registry.borrow_mut();
            let id = registry.next_id();
            let state = Rc::downgrade(&self.state);
            let disposer = Disposer::live(move || {
                if let Some(state) = state.upgrade() {
                    state.unsubscribe(id);
                }
            });
            let shared: ObserverFn<T, R, E> = Rc::new(RefCell::new(callback));
            // The registry's copy stays unanchored; only the caller's
            // handle holds the state, so the stream cannot cycle back to
            // itself through its own records.
            registry.insert(shared, disposer.clone());
            disposer.anchored(Rc::clone(&self.state) as Rc<dyn Any>)
        };

        StreamState::activate(&self.state);
        disposer
    }

    /// Subscribe to data values only.
    pub fn for_each(&self, mut subscriber: impl FnMut(T) + 'static) -> Disposer {
        self.observe(move |event, _disposer| {
            if let StreamEvent::Data(value) = event {
                subscriber(value);
            }
        })
    }

    /// Subscribe to the terminal event only.
    ///
    /// Counts as a regular observer, so it keeps the stream active even
    /// while data values pass it by.
    pub fn on_finish(&self, mut callback: impl FnMut(Result<R, E>) + 'static) -> Disposer {
        self.observe(move |event, _disposer| match event {
            StreamEvent::Data(_) => {}
            StreamEvent::Success(value) => callback(Ok(value)),
            StreamEvent::Failure(error) => callback(Err(error)),
        })
    }

    /// Wait for the final outcome without consuming data events.
    ///
    /// Activates the stream and pins it open: the stream no longer closes
    /// when its last observer leaves, only when it terminates. If the
    /// outcome is already known the matching continuation runs immediately.
    pub fn await_completion(
        &self,
        on_success: impl FnOnce(R) + 'static,
        on_failure: impl FnOnce(E) + 'static,
    ) {
        self.state.pinned.set(true);
        StreamState::activate(&self.state);
        self.state.completion.subscribe(on_success, on_failure);
    }

    /// Check whether the stream has settled or failed.
    pub fn is_terminated(&self) -> bool {
        self.state.terminated.get()
    }
}

impl<T, R, E> StreamState<T, R, E>
where
    T: Clone + 'static,
    R: Clone + 'static,
    E: Clone + 'static,
{
    /// Run the publisher if the stream is currently closed and not settled.
    fn activate(this: &Rc<Self>) {
        if this.active.get() || this.terminated.get() {
            return;
        }
        this.active.set(true);
        log::trace!("activating stream publisher");

        let taken = this.publisher.borrow_mut().take();
        let Some(mut publisher) = taken else {
            return;
        };

        let emitter = Emitter {
            state: Rc::downgrade(this),
        };
        let handle = publisher(emitter);

        if !this.terminated.get() {
            *this.publisher.borrow_mut() = Some(publisher);
        }

        if let Some(handle) = handle {
            if this.terminated.get() || !this.active.get() {
                // The activation ended while the publisher was still
                // running; its cleanup is due immediately.
                handle();
            } else {
                *this.close_handle.borrow_mut() = Some(handle);
            }
        }
    }

    fn push(&self, value: T) {
        assert!(
            !self.terminated.get(),
            "value emitted after stream termination"
        );
        self.notify(StreamEvent::Data(value));
    }

    fn settle(&self, value: R) {
        if self.terminated.get() {
            return;
        }
        self.terminated.set(true);
        log::trace!("stream settled");
        self.notify(StreamEvent::Success(value.clone()));
        self.finalize();
        self.completion.settle(value);
    }

    fn fail(&self, error: E) {
        if self.terminated.get() {
            return;
        }
        self.terminated.set(true);
        log::trace!("stream failed");
        self.notify(StreamEvent::Failure(error.clone()));
        self.finalize();
        self.completion.fail(error);
    }

    /// Deliver one event to every observer present when delivery started.
    ///
    /// Iterates over a snapshot so observers may subscribe or dispose during
    /// delivery: removed observers are skipped via an identity re-check, and
    /// newly added ones first see the next event. A callback that re-enters
    /// the stream and triggers delivery to itself is skipped for the nested
    /// event rather than aborting the whole fan-out.
    fn notify(&self, event: StreamEvent<T, R, E>) {
        let snapshot = self.registry.borrow().snapshot();
        for (id, callback, disposer) in snapshot {
            if !self.registry.borrow().still_holds(id, &callback) {
                continue;
            }
            match callback.try_borrow_mut() {
                Ok(mut callback) => (*callback)(event.clone(), disposer),
                Err(_) => log::trace!("skipping re-entrant delivery to running observer"),
            }
        }
    }

    /// Tear down after the terminal event went out. Cleanup runs first,
    /// then observers and the publisher are dropped outside any borrow.
    fn finalize(&self) {
        self.transient_close();
        let observers = self.registry.borrow_mut().clear();
        let publisher = self.publisher.borrow_mut().take();
        drop(observers);
        drop(publisher);
    }

    /// Close the current activation, keeping the publisher for a restart.
    ///
    /// Skipped while a completion waiter pins the stream open.
    fn transient_close(&self) {
        if self.pinned.get() && !self.terminated.get() {
            return;
        }
        self.active.set(false);
        let handle = self.close_handle.borrow_mut().take();
        if let Some(handle) = handle {
            log::trace!("stream closed");
            handle();
        }
    }

    fn close_if_unobserved(&self) {
        let unobserved = self.registry.borrow().is_empty();
        if unobserved {
            self.transient_close();
        }
    }

    fn unsubscribe(&self, id: ObserverId) {
        let removed = self.registry.borrow_mut().remove(id);
        drop(removed);
        self.close_if_unobserved();
    }
}

impl<T, R, E> Drop for StreamState<T, R, E> {
    fn drop(&mut self) {
        // Abandoned while open: give the publisher its cleanup.
        if let Some(handle) = self.close_handle.get_mut().take() {
            handle();
        }
    }
}

impl<T, R, E> fmt::Debug for Stream<T, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("active", &self.state.active.get())
            .field("terminated", &self.state.terminated.get())
            .field("pinned", &self.state.pinned.get())
            .field("observers", &self.state.registry.borrow().len())
            .finish()
    }
}

/// Producer-side handle for pushing values into a stream and settling it.
///
/// Holds only a weak reference to the stream, so a producer retaining its
/// emitter does not keep an abandoned stream alive. Calls on an emitter
/// whose stream has been dropped are silently ignored.
pub struct Emitter<T, R = (), E = StreamError> {
    state: Weak<StreamState<T, R, E>>,
}

impl<T, R, E> Clone for Emitter<T, R, E> {
    fn clone(&self) -> Self {
        Emitter {
            state: Weak::clone(&self.state),
        }
    }
}

impl<T, R, E> Emitter<T, R, E>
where
    T: Clone + 'static,
    R: Clone + 'static,
    E: Clone + 'static,
{
    /// Push a data value to every current observer.
    ///
    /// # Panics
    ///
    /// Panics if the stream has already terminated. Producers that may
    /// outlive their stream should stop pushing from the close handle or
    /// check [`is_terminated`](Self::is_terminated) first.
    pub fn push(&self, value: T) {
        if let Some(state) = self.state.upgrade() {
            state.push(value);
        }
    }

    /// Permanently settle the stream with a success value.
    ///
    /// The first settlement wins; later calls are ignored.
    pub fn settle(&self, value: R) {
        if let Some(state) = self.state.upgrade() {
            state.settle(value);
        }
    }

    /// Permanently settle the stream with an error.
    ///
    /// The first settlement wins; later calls are ignored.
    pub fn fail(&self, error: E) {
        if let Some(state) = self.state.upgrade() {
            state.fail(error);
        }
    }

    /// Check whether the stream is gone or settled.
    pub fn is_terminated(&self) -> bool {
        match self.state.upgrade() {
            Some(state) => state.terminated.get(),
            None => true,
        }
    }
}
