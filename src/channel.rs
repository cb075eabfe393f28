/// Channel - Listener Registration and Notification Deferral
///
/// Every view owns one channel per delta kind it emits. Listeners are plain
/// closures invoked synchronously in registration order; there is no queueing
/// and no background execution. A view always brings its own state up to date
/// before emitting, so listeners observe the sender self-consistent.
///
/// # Deferral
///
/// A caller may open a scoped deferral guard around several mutations on one
/// component. While the guard is open the component's outbound notification is
/// suppressed (internal state keeps updating); when the last guard drops,
/// exactly one coalesced notification fires reflecting net state.

use crate::delta::{BooksDelta, Coalesce, ShelvesDelta};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Token returned by `subscribe`, used to unsubscribe.
pub type ListenerId = u64;

/// A synchronous multicast channel for one delta kind.
pub struct Channel<D: Coalesce> {
    listeners: RefCell<Vec<(ListenerId, Rc<dyn Fn(&D)>)>>,
    next_id: Cell<ListenerId>,
    defer_depth: Cell<u32>,
    pending: RefCell<Option<D>>,
}

/// Record-delta channel exposed by every book view.
pub type BookChannel = Channel<BooksDelta>;

/// Group-delta channel exposed by shelf sets.
pub type ShelfChannel = Channel<ShelvesDelta>;

impl<D: Coalesce> Channel<D> {
    pub fn new() -> Self {
        Channel {
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
            defer_depth: Cell::new(0),
            pending: RefCell::new(None),
        }
    }

    /// Register a listener. Listeners fire in registration order.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&D) + 'static,
    {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    /// Remove a listener. Unknown ids are ignored (the listener may already
    /// have been detached).
    pub fn unsubscribe(&self, id: ListenerId) {
        self.listeners
            .borrow_mut()
            .retain(|(listener_id, _)| *listener_id != id);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Emit a delta, or fold it into the pending one while deferred.
    /// Empty deltas are dropped.
    pub fn emit(&self, delta: D) {
        if delta.is_empty() {
            return;
        }
        if self.defer_depth.get() > 0 {
            let pending = self.pending.borrow_mut().take();
            let net = match pending {
                Some(previous) => D::coalesce(previous, delta),
                None => delta,
            };
            *self.pending.borrow_mut() = Some(net);
        } else {
            self.dispatch(&delta);
        }
    }

    /// Open a deferral scope. Dropping the returned guard flushes the
    /// coalesced notification (if any).
    pub fn defer(&self) -> DeferGuard<'_, D> {
        self.defer_depth.set(self.defer_depth.get() + 1);
        DeferGuard { channel: self }
    }

    fn dispatch(&self, delta: &D) {
        // Snapshot the listener list so callbacks may subscribe or
        // unsubscribe without invalidating the iteration.
        let listeners: Vec<(ListenerId, Rc<dyn Fn(&D)>)> = self.listeners.borrow().clone();
        for (_, listener) in &listeners {
            listener(delta);
        }
    }
}

impl<D: Coalesce> Default for Channel<D> {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for a deferral scope; flushes on drop.
pub struct DeferGuard<'a, D: Coalesce> {
    channel: &'a Channel<D>,
}

impl<D: Coalesce> Drop for DeferGuard<'_, D> {
    fn drop(&mut self) {
        let depth = self.channel.defer_depth.get() - 1;
        self.channel.defer_depth.set(depth);
        if depth == 0 {
            if let Some(net) = self.channel.pending.borrow_mut().take() {
                if !net.is_empty() {
                    self.channel.dispatch(&net);
                }
            }
        }
    }
}
