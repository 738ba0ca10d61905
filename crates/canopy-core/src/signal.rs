//! Multi-observer broadcast.
//!
//! A [`Signal`] hands each emitted value to every connected slot. Canopy uses
//! it where any number of observers may follow along, such as a flattener's
//! flat row changes. Model collections use the single-subscriber
//! [`ChangeNotifier`](crate::ChangeNotifier) instead, whose delivery can fail.
//!
//! Slots run synchronously on the emitting thread in connection order. The
//! slot table is unlocked while they run, so a slot may connect or
//! disconnect slots; the change is seen by the next emission.
//!
//! # Example
//!
//! ```
//! use canopy_core::Signal;
//!
//! let renamed = Signal::<String>::new();
//! let id = renamed.connect(|name| println!("renamed to {name}"));
//!
//! renamed.emit("report.txt".to_string());
//! assert!(renamed.disconnect(id));
//! assert_eq!(renamed.connection_count(), 0);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::logging::targets;

new_key_type! {
    /// Handle for one slot connected to a [`Signal`].
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// Broadcasts values of type `Args` to connected slots.
///
/// Use `()` when there is nothing to carry.
pub struct Signal<Args> {
    slots: Mutex<SlotMap<ConnectionId, Slot<Args>>>,
    muted: AtomicBool,
}

impl<Args: Send + 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: Send + 'static> Signal<Args> {
    /// Creates a signal with no slots.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(SlotMap::with_key()),
            muted: AtomicBool::new(false),
        }
    }

    /// Adds `slot` and returns the handle that removes it again.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let id = self.slots.lock().insert(Arc::new(slot));
        tracing::trace!(target: targets::SIGNAL, ?id, "slot connected");
        id
    }

    /// Removes one slot. Returns `false` for a handle that is no longer live.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.slots.lock().remove(id).is_some()
    }

    /// Removes every slot.
    pub fn disconnect_all(&self) {
        self.slots.lock().clear();
    }

    /// Number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Drops every emission while `muted` is set.
    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Release);
    }

    /// Returns `true` while emissions are dropped.
    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }

    /// Invokes every connected slot with `args`.
    #[tracing::instrument(skip_all, target = "canopy_core::signal", level = "trace")]
    pub fn emit(&self, args: Args) {
        if self.is_muted() {
            tracing::trace!(target: targets::SIGNAL, "muted, emission dropped");
            return;
        }
        let slots: Vec<Slot<Args>> = self.slots.lock().values().cloned().collect();
        tracing::trace!(target: targets::SIGNAL, slots = slots.len(), "emit");
        for slot in &slots {
            slot(&args);
        }
    }
}

static_assertions::assert_impl_all!(Signal<String>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    fn recording(signal: &Signal<u8>) -> (ConnectionId, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = signal.connect(move |v| sink.lock().push(*v));
        (id, seen)
    }

    #[test]
    fn test_emit_reaches_slot_until_disconnected() {
        let signal = Signal::<u8>::new();
        let (id, seen) = recording(&signal);

        signal.emit(3);
        signal.emit(4);
        assert!(signal.disconnect(id));
        assert!(!signal.disconnect(id));
        signal.emit(5);

        assert_eq!(*seen.lock(), [3, 4]);
    }

    #[test]
    fn test_muted_signal_drops_values() {
        let signal = Signal::<u8>::new();
        let (_, seen) = recording(&signal);

        signal.set_muted(true);
        signal.emit(1);
        assert!(signal.is_muted());
        signal.set_muted(false);
        signal.emit(2);

        assert_eq!(*seen.lock(), [2]);
    }

    #[test]
    fn test_every_slot_runs_in_connection_order() {
        let signal = Signal::<u8>::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in 0..3u8 {
            let order = order.clone();
            signal.connect(move |v| order.lock().push(tag * 10 + v));
        }

        signal.emit(1);
        assert_eq!(*order.lock(), [1, 11, 21]);

        signal.disconnect_all();
        assert_eq!(signal.connection_count(), 0);
    }

    #[test]
    fn test_slot_connected_during_emit_waits_for_next_emit() {
        let signal = Arc::new(Signal::<()>::new());
        let hits = Arc::new(Mutex::new(0));

        let outer_signal = signal.clone();
        let outer_hits = hits.clone();
        signal.connect(move |_| {
            *outer_hits.lock() += 1;
            let inner_hits = outer_hits.clone();
            outer_signal.connect(move |_| *inner_hits.lock() += 100);
        });

        signal.emit(());
        assert_eq!(*hits.lock(), 1);
        assert_eq!(signal.connection_count(), 2);
    }
}
