//! In-process message channel for tests and demos

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::connector_errors::{ConnectorError, ConnectorResult};
use super::message_channel::{ChannelEvent, ListenerId, MessageChannel};

type ListenerSlot = Rc<RefCell<Box<dyn FnMut(&ChannelEvent)>>>;

/// A [`MessageChannel`] that never leaves the process.
///
/// Tests and demos drive it by hand: [`open`](Self::open) and
/// [`close`](Self::close) flip the transport state, [`push_text`](Self::push_text)
/// delivers an inbound payload, and outbound payloads accumulate for
/// inspection via [`sent`](Self::sent).
pub struct LoopbackChannel {
    listeners: RefCell<Vec<(ListenerId, ListenerSlot)>>,
    next_id: Cell<u64>,
    open: Cell<bool>,
    sent: RefCell<Vec<String>>,
}

impl LoopbackChannel {
    pub fn new() -> Self {
        LoopbackChannel {
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
            open: Cell::new(false),
            sent: RefCell::new(Vec::new()),
        }
    }

    /// Bring the transport up, notifying listeners.
    pub fn open(&self) {
        if !self.open.get() {
            self.open.set(true);
            self.dispatch(&ChannelEvent::Opened);
        }
    }

    /// Take the transport down, notifying listeners.
    pub fn close(&self) {
        if self.open.get() {
            self.open.set(false);
            self.dispatch(&ChannelEvent::Closed);
        }
    }

    /// Deliver an inbound payload to every listener.
    ///
    /// Dropped with a note when the transport is down, like a real socket.
    pub fn push_text(&self, payload: &str) {
        if !self.open.get() {
            log::debug!("loopback: dropping inbound payload while closed");
            return;
        }
        self.dispatch(&ChannelEvent::Message(payload.to_string()));
    }

    /// Payloads sent through this channel so far.
    pub fn sent(&self) -> Vec<String> {
        self.sent.borrow().clone()
    }

    pub fn is_open(&self) -> bool {
        self.open.get()
    }

    /// Number of currently attached listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Deliver one event to a snapshot of the listeners, re-checking each
    /// one is still attached. Listeners may attach or detach freely during
    /// delivery; newly attached ones first see the next event.
    fn dispatch(&self, event: &ChannelEvent) {
        let snapshot: Vec<(ListenerId, ListenerSlot)> = self
            .listeners
            .borrow()
            .iter()
            .map(|(id, listener)| (*id, Rc::clone(listener)))
            .collect();

        for (id, listener) in snapshot {
            let attached = self
                .listeners
                .borrow()
                .iter()
                .any(|(existing, _)| *existing == id);
            if !attached {
                continue;
            }
            if let Ok(mut listener) = listener.try_borrow_mut() {
                (*listener)(event);
            }
        }
    }
}

impl Default for LoopbackChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageChannel for LoopbackChannel {
    fn attach(&self, listener: Box<dyn FnMut(&ChannelEvent)>) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        self.listeners
            .borrow_mut()
            .push((id, Rc::new(RefCell::new(listener))));
        id
    }

    fn detach(&self, id: ListenerId) {
        self.listeners
            .borrow_mut()
            .retain(|(existing, _)| *existing != id);
    }

    fn send(&self, payload: &str) -> ConnectorResult<()> {
        if !self.open.get() {
            return Err(ConnectorError::ChannelClosed);
        }
        self.sent.borrow_mut().push(payload.to_string());
        Ok(())
    }
}
