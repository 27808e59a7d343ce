//! Debounced refresh on top of the [`EventLoop`].
//!
//! A burst of triggers (domain change, category-set change, resize) should
//! produce one recompute, run after the current notification cascade has
//! settled. [`Debouncer::request`] schedules the callback for the next turn
//! and coalesces every further request until it has run. A pending refresh
//! can be cancelled (teardown) or flushed synchronously.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::RefreshError;
use crate::logging::targets;
use crate::task::{EventLoop, TaskId};

#[derive(Debug, Clone, Copy)]
struct Pending {
    generation: u64,
    task: TaskId,
}

struct DebounceState {
    name: &'static str,
    pending: Mutex<Option<Pending>>,
    generation: AtomicU64,
    flush_count: AtomicU64,
    callback: Box<dyn Fn() + Send + Sync>,
}

impl DebounceState {
    /// Run the callback if `generation` is still the pending burst.
    fn fire(&self, generation: u64) -> bool {
        {
            let mut pending = self.pending.lock();
            match *pending {
                Some(p) if p.generation == generation => *pending = None,
                _ => return false,
            }
        }
        self.flush_count.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(target: targets::REFRESH, name = self.name, generation, "refresh flushed");
        (self.callback)();
        true
    }
}

/// Coalesces refresh requests into one callback per event-loop turn.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use plotweave_core::{Debouncer, EventLoop};
///
/// let event_loop = Arc::new(EventLoop::new());
/// let runs = Arc::new(AtomicUsize::new(0));
/// let runs_clone = runs.clone();
/// let refresh = Debouncer::new("points", &event_loop, move || {
///     runs_clone.fetch_add(1, Ordering::SeqCst);
/// });
///
/// for _ in 0..5 {
///     refresh.request().unwrap();
/// }
/// event_loop.run_turn();
/// assert_eq!(runs.load(Ordering::SeqCst), 1);
/// ```
pub struct Debouncer {
    state: Arc<DebounceState>,
    event_loop: Weak<EventLoop>,
}

impl Debouncer {
    /// Create a debouncer that schedules `callback` on `event_loop`.
    pub fn new<F>(name: &'static str, event_loop: &Arc<EventLoop>, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            state: Arc::new(DebounceState {
                name,
                pending: Mutex::new(None),
                generation: AtomicU64::new(0),
                flush_count: AtomicU64::new(0),
                callback: Box::new(callback),
            }),
            event_loop: Arc::downgrade(event_loop),
        }
    }

    /// Request a refresh on the next turn.
    ///
    /// Returns `Ok(true)` if this request started a new burst and `Ok(false)`
    /// if it was folded into one that is already pending.
    pub fn request(&self) -> Result<bool, RefreshError> {
        let mut pending = self.state.pending.lock();
        if pending.is_some() {
            tracing::trace!(target: targets::REFRESH, name = self.state.name, "refresh coalesced");
            return Ok(false);
        }
        let event_loop = self
            .event_loop
            .upgrade()
            .ok_or(RefreshError::EventLoopDropped)?;
        let generation = self.state.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let weak_state = Arc::downgrade(&self.state);
        let task = event_loop.post(move || {
            if let Some(state) = weak_state.upgrade() {
                state.fire(generation);
            }
        });
        *pending = Some(Pending { generation, task });
        tracing::trace!(target: targets::REFRESH, name = self.state.name, generation, "refresh scheduled");
        Ok(true)
    }

    /// Whether a refresh is scheduled and has not run yet.
    pub fn is_pending(&self) -> bool {
        self.state.pending.lock().is_some()
    }

    /// Cancel the pending refresh, if any.
    pub fn cancel(&self) -> bool {
        let taken = self.state.pending.lock().take();
        match taken {
            Some(p) => {
                if let Some(event_loop) = self.event_loop.upgrade() {
                    event_loop.cancel(p.task);
                }
                tracing::trace!(target: targets::REFRESH, name = self.state.name, generation = p.generation, "refresh cancelled");
                true
            }
            None => false,
        }
    }

    /// Run the pending refresh now instead of waiting for the next turn.
    pub fn flush(&self) -> Result<(), RefreshError> {
        let current = *self.state.pending.lock();
        let pending = current.ok_or(RefreshError::NothingPending)?;
        if let Some(event_loop) = self.event_loop.upgrade() {
            event_loop.cancel(pending.task);
        }
        self.state.fire(pending.generation);
        Ok(())
    }

    /// Number of times the callback has run.
    pub fn flush_count(&self) -> u64 {
        self.state.flush_count.load(Ordering::Relaxed)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("name", &self.state.name)
            .field("pending", &self.is_pending())
            .field("flush_count", &self.flush_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(Debouncer: Send, Sync);
