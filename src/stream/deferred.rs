//! One-shot settlement cell shared between a stream and its observers
//!
//! A [`Deferred`] records the final outcome of a stream exactly once and
//! replays it synchronously to continuations added after settlement.

use std::cell::RefCell;
use std::rc::Rc;

struct Continuation<R, E> {
    on_success: Box<dyn FnOnce(R)>,
    on_failure: Box<dyn FnOnce(E)>,
}

enum DeferredState<R, E> {
    Pending(Vec<Continuation<R, E>>),
    Settled(Result<R, E>),
}

/// A write-once container for the terminal outcome of a stream.
///
/// The first call to [`settle`](Deferred::settle) or [`fail`](Deferred::fail)
/// wins; every later call is ignored. Continuations registered before
/// settlement run when the outcome arrives, continuations registered after
/// settlement run immediately, still on the caller's stack.
pub struct Deferred<R, E> {
    inner: Rc<RefCell<DeferredState<R, E>>>,
}

impl<R, E> Clone for Deferred<R, E> {
    fn clone(&self) -> Self {
        Deferred {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<R, E> Deferred<R, E>
where
    R: Clone + 'static,
    E: Clone + 'static,
{
    /// Create an unsettled cell
    pub fn new() -> Self {
        Deferred {
            inner: Rc::new(RefCell::new(DeferredState::Pending(Vec::new()))),
        }
    }

    /// Settle with a success value; ignored if already settled
    pub fn settle(&self, value: R) {
        self.resolve(Ok(value));
    }

    /// Settle with an error; ignored if already settled
    pub fn fail(&self, error: E) {
        self.resolve(Err(error));
    }

    /// Check whether an outcome has been recorded
    pub fn is_settled(&self) -> bool {
        matches!(&*self.inner.borrow(), DeferredState::Settled(_))
    }

    fn resolve(&self, outcome: Result<R, E>) {
        // Swap state under the borrow, run continuations after releasing it
        // so they may subscribe or settle again without tripping the cell.
        let pending = {
            let mut state = self.inner.borrow_mut();
            match &mut *state {
                DeferredState::Settled(_) => return,
                DeferredState::Pending(continuations) => {
                    let drained = std::mem::take(continuations);
                    *state = DeferredState::Settled(outcome.clone());
                    drained
                }
            }
        };

        for continuation in pending {
            match outcome.clone() {
                Ok(value) => (continuation.on_success)(value),
                Err(error) => (continuation.on_failure)(error),
            }
        }
    }

    /// Register a pair of continuations for the outcome.
    ///
    /// If the cell is already settled the matching continuation runs before
    /// this call returns.
    pub fn subscribe(
        &self,
        on_success: impl FnOnce(R) + 'static,
        on_failure: impl FnOnce(E) + 'static,
    ) {
        let settled = match &*self.inner.borrow() {
            DeferredState::Settled(outcome) => Some(outcome.clone()),
            DeferredState::Pending(_) => None,
        };

        match settled {
            Some(Ok(value)) => on_success(value),
            Some(Err(error)) => on_failure(error),
            None => {
                if let DeferredState::Pending(continuations) = &mut *self.inner.borrow_mut() {
                    continuations.push(Continuation {
                        on_success: Box::new(on_success),
                        on_failure: Box::new(on_failure),
                    });
                }
            }
        }
    }
}

impl<R, E> Default for Deferred<R, E>
where
    R: Clone + 'static,
    E: Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
