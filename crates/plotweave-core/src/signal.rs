//! Explicit change notification.
//!
//! Every model that owns derived state (plot bounds, axis domains, category
//! orderings, filtered case lists) exposes one [`Signal`] per kind of change
//! and emits it once the new state is in place. Dependants subscribe with a
//! slot; nothing is recomputed behind their back.
//!
//! Slots run synchronously, in the order they were connected. The slot list
//! is copied before the first one runs, so a slot may connect or disconnect
//! (itself included) on the signal it is handling. Such changes apply from
//! the next emission.
//!
//! ```
//! use plotweave_core::Signal;
//!
//! let plot_resized = Signal::<(f64, f64)>::new();
//! let id = plot_resized.connect(|(width, height)| {
//!     println!("plot is now {width}x{height}");
//! });
//! plot_resized.emit((350.0, 270.0));
//! plot_resized.disconnect(id);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::error::SignalError;
use crate::logging::targets;

new_key_type! {
    /// Handle of one connected slot, for [`Signal::disconnect`].
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;
type SlotTable<Args> = Mutex<SlotMap<ConnectionId, Slot<Args>>>;

/// A notification channel carrying `Args` to every connected slot.
///
/// Use `()` when the change itself is the whole message.
pub struct Signal<Args> {
    slots: Arc<SlotTable<Args>>,
    muted: AtomicBool,
}

impl<Args: 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: 'static> Signal<Args> {
    /// A signal nobody listens to yet.
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(SlotMap::with_key())),
            muted: AtomicBool::new(false),
        }
    }

    /// Subscribe `slot`. Keep the id to unsubscribe later.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.slots.lock().insert(Arc::new(slot))
    }

    /// Subscribe `slot` for as long as the returned guard lives.
    ///
    /// The guard holds the slot table weakly, so dropping it after the
    /// signal is gone is fine.
    pub fn connect_scoped<F>(&self, slot: F) -> ConnectionGuard<Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        ConnectionGuard {
            slots: Arc::downgrade(&self.slots),
            id: self.connect(slot),
        }
    }

    /// Unsubscribe. Returns whether the id was connected.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.slots.lock().remove(id).is_some()
    }

    /// Unsubscribe, treating an unknown id as an error.
    pub fn try_disconnect(&self, id: ConnectionId) -> Result<(), SignalError> {
        match self.disconnect(id) {
            true => Ok(()),
            false => Err(SignalError::InvalidConnection),
        }
    }

    /// Drop every slot.
    pub fn disconnect_all(&self) {
        self.slots.lock().clear();
    }

    /// Number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Mute or unmute. A muted signal drops emissions.
    pub fn set_blocked(&self, blocked: bool) {
        self.muted.store(blocked, Ordering::Release);
    }

    /// Whether emissions are dropped.
    pub fn is_blocked(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }

    /// Deliver `args` to every slot connected right now.
    #[tracing::instrument(skip_all, target = "plotweave_core::signal", level = "trace")]
    pub fn emit(&self, args: Args) {
        if self.is_blocked() {
            tracing::trace!(target: targets::SIGNAL, "muted, emission dropped");
            return;
        }
        let snapshot: Vec<Slot<Args>> = self.slots.lock().values().cloned().collect();
        tracing::trace!(target: targets::SIGNAL, slots = snapshot.len(), "emit");
        for slot in &snapshot {
            slot(&args);
        }
    }
}

impl<Args> std::fmt::Debug for Signal<Args> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("slots", &self.slots.lock().len())
            .field("muted", &self.muted.load(Ordering::Acquire))
            .finish()
    }
}

/// Disconnects its slot when dropped. See [`Signal::connect_scoped`].
///
/// Models keep guards for the signals of the models they watch, so tearing
/// a watcher down unsubscribes it everywhere:
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use plotweave_core::Signal;
///
/// let categories_changed = Signal::<()>::new();
/// let refreshes = Arc::new(AtomicUsize::new(0));
/// let watcher = {
///     let refreshes = refreshes.clone();
///     categories_changed.connect_scoped(move |_| {
///         refreshes.fetch_add(1, Ordering::Relaxed);
///     })
/// };
/// categories_changed.emit(());
/// drop(watcher);
/// categories_changed.emit(());
/// assert_eq!(refreshes.load(Ordering::Relaxed), 1);
/// ```
pub struct ConnectionGuard<Args> {
    slots: Weak<SlotTable<Args>>,
    id: ConnectionId,
}

impl<Args> ConnectionGuard<Args> {
    /// Id of the guarded slot.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl<Args> Drop for ConnectionGuard<Args> {
    fn drop(&mut self) {
        if let Some(slots) = self.slots.upgrade() {
            slots.lock().remove(self.id);
        }
    }
}

impl<Args> std::fmt::Debug for ConnectionGuard<Args> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuard").field("id", &self.id).finish()
    }
}

static_assertions::assert_impl_all!(Signal<(String, usize)>: Send, Sync);
static_assertions::assert_impl_all!(ConnectionGuard<()>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder<T: Clone + Send + 'static>(signal: &Signal<T>) -> (Arc<Mutex<Vec<T>>>, ConnectionId) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let id = signal.connect(move |value: &T| sink.lock().push(value.clone()));
        (log, id)
    }

    #[test]
    fn test_slots_see_every_emission_in_order() {
        let extent_changed = Signal::<(String, f64)>::new();
        let (log, _) = recorder(&extent_changed);
        extent_changed.emit(("left".into(), 50.0));
        extent_changed.emit(("bottom".into(), 30.0));
        assert_eq!(*log.lock(), vec![("left".to_string(), 50.0), ("bottom".to_string(), 30.0)]);
    }

    #[test]
    fn test_slots_run_in_connection_order() {
        let signal = Signal::<()>::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for name in ["layout", "axes", "points"] {
            let order = order.clone();
            signal.connect(move |_| order.lock().push(name));
        }
        signal.emit(());
        assert_eq!(*order.lock(), vec!["layout", "axes", "points"]);
    }

    #[test]
    fn test_disconnect() {
        let signal = Signal::<usize>::new();
        let (log, id) = recorder(&signal);
        signal.emit(1);
        assert!(signal.disconnect(id));
        signal.emit(2);
        assert_eq!(*log.lock(), vec![1]);
        assert_eq!(signal.try_disconnect(id), Err(SignalError::InvalidConnection));
    }

    #[test]
    fn test_muted_signal_drops_emissions() {
        let signal = Signal::<usize>::new();
        let (log, _) = recorder(&signal);
        signal.set_blocked(true);
        signal.emit(7);
        assert!(signal.is_blocked());
        signal.set_blocked(false);
        signal.emit(8);
        assert_eq!(*log.lock(), vec![8]);
    }

    #[test]
    fn test_disconnect_all() {
        let signal = Signal::<()>::new();
        recorder(&signal);
        recorder(&signal);
        assert_eq!(signal.connection_count(), 2);
        signal.disconnect_all();
        assert_eq!(signal.connection_count(), 0);
    }

    #[test]
    fn test_guard_unsubscribes_on_drop() {
        let signal = Signal::<usize>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let guard = {
            let log = log.clone();
            signal.connect_scoped(move |n: &usize| log.lock().push(*n))
        };
        signal.emit(1);
        drop(guard);
        signal.emit(2);
        assert_eq!(*log.lock(), vec![1]);
        assert_eq!(signal.connection_count(), 0);
    }

    #[test]
    fn test_guard_may_outlive_signal() {
        let guard = Signal::<()>::new().connect_scoped(|_| {});
        drop(guard);
    }

    #[test]
    fn test_slot_connected_during_emit_waits_for_next_emit() {
        let signal = Arc::new(Signal::<usize>::new());
        let late = Arc::new(Mutex::new(Vec::new()));
        let once = AtomicBool::new(false);
        let (signal_c, late_c) = (signal.clone(), late.clone());
        signal.connect(move |_| {
            if !once.swap(true, Ordering::Relaxed) {
                let late = late_c.clone();
                signal_c.connect(move |n: &usize| late.lock().push(*n));
            }
        });
        signal.emit(1);
        signal.emit(2);
        assert_eq!(*late.lock(), vec![2]);
    }

    #[test]
    fn test_slot_disconnects_itself() {
        let signal = Arc::new(Signal::<usize>::new());
        let own_id = Arc::new(Mutex::new(None::<ConnectionId>));
        let hits = Arc::new(Mutex::new(0));
        let (signal_c, own_c, hits_c) = (signal.clone(), own_id.clone(), hits.clone());
        let id = signal.connect(move |_| {
            *hits_c.lock() += 1;
            if let Some(id) = *own_c.lock() {
                signal_c.disconnect(id);
            }
        });
        *own_id.lock() = Some(id);
        signal.emit(1);
        signal.emit(2);
        assert_eq!(*hits.lock(), 1);
        assert_eq!(signal.connection_count(), 0);
    }
}
