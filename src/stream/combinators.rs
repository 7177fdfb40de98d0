//! Derived streams: map, filter, map_result, reduce, to_array, some, take
//!
//! Every combinator builds a new lazy stream whose publisher subscribes to
//! the parent on activation and unsubscribes when the derived stream closes.
//! Activation therefore chains upward on first subscription and interest is
//! withdrawn downward on last unsubscribe.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::core::{CloseHandle, CompletionMode, Emitter, Stream};
use super::event::StreamEvent;
use super::registry::Disposer;

/// How a derived stream's subscription to its parent ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpstreamState {
    /// Still observing the parent.
    Subscribed,
    /// The derived stream settled itself and already withdrew from the
    /// parent during delivery.
    SelfTerminated,
    /// The close handle withdrew from the parent.
    Disposed,
}

/// Close handle for combinators that may dispose their parent subscription
/// from inside a delivery. The handle only disposes when the subscription
/// is still standing, so early self-termination does not lead to a second
/// dispose when the derived stream later closes.
fn sever_on_close(link: Rc<Cell<UpstreamState>>, upstream: Disposer) -> CloseHandle {
    Box::new(move || {
        if link.get() == UpstreamState::Subscribed {
            link.set(UpstreamState::Disposed);
            upstream.dispose();
        }
    })
}

impl<T, R, E> Stream<T, R, E>
where
    T: Clone + 'static,
    R: Clone + 'static,
    E: Clone + 'static,
{
    /// Transform every data value.
    ///
    /// The derived stream completes together with its parent: awaiting its
    /// completion yields the parent's resolution value, and the transform is
    /// never applied to it.
    ///
    /// # Examples
    ///
    /// ```
    /// use plexus_stream::Stream;
    /// use std::cell::RefCell;
    /// use std::rc::Rc;
    ///
    /// let doubled = Stream::from_iter(vec![1, 2, 3]).map(|value| value * 2);
    ///
    /// let seen = Rc::new(RefCell::new(Vec::new()));
    /// let sink = Rc::clone(&seen);
    /// doubled.for_each(move |value| sink.borrow_mut().push(value));
    /// assert_eq!(*seen.borrow(), vec![2, 4, 6]);
    /// ```
    pub fn map<U>(&self, transform: impl FnMut(T) -> U + 'static) -> Stream<U, R, E>
    where
        U: Clone + 'static,
    {
        let parent = self.clone();
        let transform = Rc::new(RefCell::new(transform));
        Stream::with_completion(
            Box::new(move |emitter: Emitter<U, R, E>| {
                let transform = Rc::clone(&transform);
                let upstream = parent.for_each(move |value| {
                    let mapped = (*transform.borrow_mut())(value);
                    emitter.push(mapped);
                });
                Some(upstream.into_close_handle())
            }),
            CompletionMode::Inherited(self.state.completion.clone()),
        )
    }

    /// Keep only data values matching the predicate.
    ///
    /// Completes together with its parent, like [`map`](Self::map).
    pub fn filter(&self, predicate: impl FnMut(&T) -> bool + 'static) -> Stream<T, R, E> {
        let parent = self.clone();
        let predicate = Rc::new(RefCell::new(predicate));
        Stream::with_completion(
            Box::new(move |emitter: Emitter<T, R, E>| {
                let predicate = Rc::clone(&predicate);
                let upstream = parent.for_each(move |value| {
                    if (*predicate.borrow_mut())(&value) {
                        emitter.push(value);
                    }
                });
                Some(upstream.into_close_handle())
            }),
            CompletionMode::Inherited(self.state.completion.clone()),
        )
    }

    /// Transform the terminal outcome while passing data values through.
    ///
    /// When the parent terminates, the transform receives its outcome and
    /// the returned `Result` settles or fails the derived stream.
    pub fn map_result<R2>(
        &self,
        transform: impl FnMut(Result<R, E>) -> Result<R2, E> + 'static,
    ) -> Stream<T, R2, E>
    where
        R2: Clone + 'static,
    {
        let parent = self.clone();
        let transform = Rc::new(RefCell::new(transform));
        Stream::new(move |emitter: Emitter<T, R2, E>| {
            let transform = Rc::clone(&transform);
            let upstream = parent.observe(move |event, _disposer| {
                let outcome = match event {
                    StreamEvent::Data(value) => {
                        emitter.push(value);
                        return;
                    }
                    StreamEvent::Success(value) => Ok(value),
                    StreamEvent::Failure(error) => Err(error),
                };
                match (*transform.borrow_mut())(outcome) {
                    Ok(value) => emitter.settle(value),
                    Err(error) => emitter.fail(error),
                }
            });
            Some(upstream.into_close_handle())
        })
    }

    /// Fold data values, emitting every intermediate accumulator.
    ///
    /// Resolves with the final accumulator when the parent terminates. The
    /// accumulator persists across close and reopen, so a rejoining observer
    /// continues from the running total rather than restarting the fold.
    pub fn reduce<A>(&self, reducer: impl FnMut(A, T) -> A + 'static, initial: A) -> Stream<A, A, E>
    where
        A: Clone + 'static,
    {
        let parent = self.clone();
        let reducer = Rc::new(RefCell::new(reducer));
        let accumulator = Rc::new(RefCell::new(initial));
        Stream::new(move |emitter: Emitter<A, A, E>| {
            let reducer = Rc::clone(&reducer);
            let accumulator = Rc::clone(&accumulator);
            let upstream = parent.observe(move |event, _disposer| match event {
                StreamEvent::Data(value) => {
                    let folded = {
                        let current = accumulator.borrow().clone();
                        (*reducer.borrow_mut())(current, value)
                    };
                    *accumulator.borrow_mut() = folded.clone();
                    emitter.push(folded);
                }
                StreamEvent::Success(_) | StreamEvent::Failure(_) => {
                    let folded = accumulator.borrow().clone();
                    emitter.settle(folded);
                }
            });
            Some(upstream.into_close_handle())
        })
    }

    /// Collect every data value, resolving with the full list when the
    /// parent terminates. Values are also re-emitted as they arrive.
    pub fn to_array(&self) -> Stream<T, Vec<T>, E> {
        let parent = self.clone();
        let collected = Rc::new(RefCell::new(Vec::new()));
        Stream::new(move |emitter: Emitter<T, Vec<T>, E>| {
            let collected = Rc::clone(&collected);
            let upstream = parent.observe(move |event, _disposer| match event {
                StreamEvent::Data(value) => {
                    emitter.push(value.clone());
                    collected.borrow_mut().push(value);
                }
                StreamEvent::Success(_) | StreamEvent::Failure(_) => {
                    let values = collected.borrow().clone();
                    emitter.settle(values);
                }
            });
            Some(upstream.into_close_handle())
        })
    }

    /// Resolve with `true` as soon as a value matches the predicate.
    ///
    /// Data values are forwarded, each checked after forwarding. On the
    /// first match the derived stream settles with `true` and withdraws
    /// from the parent; if the parent terminates first it settles with
    /// `false`.
    pub fn some(&self, predicate: impl FnMut(&T) -> bool + 'static) -> Stream<T, bool, E> {
        let parent = self.clone();
        let predicate = Rc::new(RefCell::new(predicate));
        Stream::new(move |emitter: Emitter<T, bool, E>| {
            let predicate = Rc::clone(&predicate);
            let link = Rc::new(Cell::new(UpstreamState::Subscribed));
            let observer_link = Rc::clone(&link);
            let upstream = parent.observe(move |event, upstream_disposer| match event {
                StreamEvent::Data(value) => {
                    emitter.push(value.clone());
                    if (*predicate.borrow_mut())(&value) {
                        // Pushing the match may have closed the derived
                        // stream and severed the subscription already.
                        let standing = observer_link.get() == UpstreamState::Subscribed;
                        if standing {
                            observer_link.set(UpstreamState::SelfTerminated);
                        }
                        emitter.settle(true);
                        if standing {
                            upstream_disposer.dispose();
                        }
                    }
                }
                StreamEvent::Success(_) | StreamEvent::Failure(_) => emitter.settle(false),
            });
            Some(sever_on_close(link, upstream))
        })
    }

    /// Pass through at most `amount` data values, then settle.
    ///
    /// The budget persists across close and reopen. `take(0)` yields a
    /// stream that settles on first subscription without consuming the
    /// parent at all.
    pub fn take(&self, amount: usize) -> Stream<T, (), E> {
        if amount == 0 {
            return Stream::new(|emitter: Emitter<T, (), E>| {
                emitter.settle(());
                None
            });
        }
        let parent = self.clone();
        let remaining = Rc::new(Cell::new(amount));
        Stream::new(move |emitter: Emitter<T, (), E>| {
            let remaining = Rc::clone(&remaining);
            let link = Rc::new(Cell::new(UpstreamState::Subscribed));
            let observer_link = Rc::clone(&link);
            let upstream = parent.observe(move |event, upstream_disposer| match event {
                StreamEvent::Data(value) => {
                    emitter.push(value);
                    let left = remaining.get() - 1;
                    remaining.set(left);
                    if left == 0 {
                        // The push of the last value may have closed the
                        // derived stream and severed the subscription.
                        let standing = observer_link.get() == UpstreamState::Subscribed;
                        if standing {
                            observer_link.set(UpstreamState::SelfTerminated);
                        }
                        emitter.settle(());
                        if standing {
                            upstream_disposer.dispose();
                        }
                    }
                }
                StreamEvent::Success(_) | StreamEvent::Failure(_) => emitter.settle(()),
            });
            Some(sever_on_close(link, upstream))
        })
    }
}
