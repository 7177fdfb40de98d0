//! Observer bookkeeping for a single stream
//!
//! Observers live in a slot arena indexed by [`ObserverId`]. Removal clears
//! the slot in place so identifiers handed to disposers stay stable, freed
//! trailing slots are trimmed so churn does not grow the arena, and the
//! arena compacts once the last observer leaves. Identifiers carry the arena
//! epoch, so a disposer kept across a compaction can never remove a slot it
//! does not own; delivery re-checks record identity, so a trimmed index
//! reused by a newcomer never stands in for the observer that left.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use super::event::StreamEvent;

/// Shared, mutable observer callback.
pub(crate) type ObserverFn<T, R, E> = Rc<RefCell<dyn FnMut(StreamEvent<T, R, E>, Disposer)>>;

/// Identity of one subscription within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ObserverId {
    epoch: u64,
    index: usize,
}

pub(crate) struct ObserverRecord<T, R, E> {
    pub(crate) callback: ObserverFn<T, R, E>,
    pub(crate) disposer: Disposer,
}

/// Slot arena holding the observers of one stream.
pub(crate) struct ObserverRegistry<T, R, E> {
    slots: Vec<Option<ObserverRecord<T, R, E>>>,
    live: usize,
    epoch: u64,
}

impl<T, R, E> ObserverRegistry<T, R, E> {
    pub(crate) fn new() -> Self {
        ObserverRegistry {
            slots: Vec::new(),
            live: 0,
            epoch: 0,
        }
    }

    /// Identifier the next call to [`insert`](Self::insert) will assign.
    pub(crate) fn next_id(&self) -> ObserverId {
        ObserverId {
            epoch: self.epoch,
            index: self.slots.len(),
        }
    }

    pub(crate) fn insert(&mut self, callback: ObserverFn<T, R, E>, disposer: Disposer) -> ObserverId {
        let id = self.next_id();
        self.slots.push(Some(ObserverRecord { callback, disposer }));
        self.live += 1;
        id
    }

    /// Remove a subscription, returning its record for the caller to drop
    /// outside any registry borrow.
    pub(crate) fn remove(&mut self, id: ObserverId) -> Option<ObserverRecord<T, R, E>> {
        if id.epoch != self.epoch {
            return None;
        }
        let record = self.slots.get_mut(id.index)?.take()?;
        self.live -= 1;
        if self.live == 0 {
            // Compact: stale identifiers from before this point now carry a
            // dead epoch and can never alias a future slot.
            self.slots.clear();
            self.epoch += 1;
        } else {
            // Trim freed trailing slots so subscribe/dispose churn against a
            // long-lived observer does not grow the arena.
            while self.slots.last().is_some_and(|slot| slot.is_none()) {
                self.slots.pop();
            }
        }
        Some(record)
    }

    /// Check that `id` still names a live record holding exactly `callback`.
    /// A trimmed index reclaimed by a later registration fails the identity
    /// comparison even though the slot is occupied again.
    pub(crate) fn still_holds(&self, id: ObserverId, callback: &ObserverFn<T, R, E>) -> bool {
        id.epoch == self.epoch
            && self
                .slots
                .get(id.index)
                .and_then(|slot| slot.as_ref())
                .is_some_and(|record| Rc::ptr_eq(&record.callback, callback))
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }

    /// Drain every record, bumping the epoch so outstanding identifiers die.
    pub(crate) fn clear(&mut self) -> Vec<ObserverRecord<T, R, E>> {
        self.live = 0;
        self.epoch += 1;
        self.slots.drain(..).flatten().collect()
    }

    /// Clone the live records for iteration outside the registry borrow.
    pub(crate) fn snapshot(&self) -> Vec<(ObserverId, ObserverFn<T, R, E>, Disposer)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.as_ref().map(|record| {
                    (
                        ObserverId {
                            epoch: self.epoch,
                            index,
                        },
                        Rc::clone(&record.callback),
                        record.disposer.clone(),
                    )
                })
            })
            .collect()
    }
}

enum DisposerInner {
    /// Inert disposer handed out by terminated streams. Calling it any
    /// number of times is allowed and does nothing.
    Noop,
    /// Single-use removal action. The slot is emptied on first dispose.
    Live(RefCell<Option<Box<dyn FnOnce()>>>),
}

/// Handle that removes one subscription from its stream.
///
/// Cloning a `Disposer` shares the underlying subscription; whichever clone
/// disposes first consumes it, and a second dispose through any clone panics.
/// A disposer handed back from subscribing also keeps the stream state
/// reachable, so delivery continues while the subscription is held even
/// after every `Stream` handle is gone; the copies delivered to observer
/// callbacks carry no such reference. Disposers obtained from an already
/// terminated stream are inert and may be called freely.
pub struct Disposer {
    inner: Rc<DisposerInner>,
    anchor: Option<Rc<dyn Any>>,
}

impl Clone for Disposer {
    fn clone(&self) -> Self {
        Disposer {
            inner: Rc::clone(&self.inner),
            anchor: self.anchor.clone(),
        }
    }
}

impl Disposer {
    pub(crate) fn noop() -> Self {
        Disposer {
            inner: Rc::new(DisposerInner::Noop),
            anchor: None,
        }
    }

    pub(crate) fn live(action: impl FnOnce() + 'static) -> Self {
        Disposer {
            inner: Rc::new(DisposerInner::Live(RefCell::new(Some(Box::new(action))))),
            anchor: None,
        }
    }

    /// Attach a strong reference held for as long as this handle or one of
    /// its clones is around. Registry-held copies stay unanchored so a
    /// stream never keeps itself alive through its own records.
    pub(crate) fn anchored(mut self, anchor: Rc<dyn Any>) -> Self {
        self.anchor = Some(anchor);
        self
    }

    /// Remove the subscription.
    ///
    /// # Panics
    ///
    /// Panics if the subscription was already removed through this disposer
    /// or one of its clones.
    pub fn dispose(&self) {
        match &*self.inner {
            DisposerInner::Noop => {}
            DisposerInner::Live(slot) => {
                let action = slot.borrow_mut().take();
                match action {
                    Some(action) => action(),
                    None => panic!("listener already removed: dispose() may only be called once"),
                }
            }
        }
    }

    /// Convert into a close handle that disposes when invoked.
    pub(crate) fn into_close_handle(self) -> Box<dyn FnOnce()> {
        Box::new(move || self.dispose())
    }
}

impl std::fmt::Debug for Disposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.inner {
            DisposerInner::Noop => "noop",
            DisposerInner::Live(slot) => {
                if slot.borrow().is_some() {
                    "armed"
                } else {
                    "spent"
                }
            }
        };
        f.debug_tuple("Disposer").field(&state).finish()
    }
}
