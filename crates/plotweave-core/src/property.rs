//! Reactive properties and cached bindings.
//!
//! - **Property<T>**: a value with change detection. `set()` reports whether
//!   the value actually changed so that the owner only emits its change
//!   signal when something happened.
//! - **Binding<T>**: a derived value that is computed lazily, cached, and
//!   recomputed only after an explicit [`Binding::invalidate`]. This is how
//!   the engine expresses "depends on" without an implicit tracking runtime.
//!
//! # Example
//!
//! ```
//! use plotweave_core::{Property, Signal};
//!
//! struct PlotKind {
//!     value: Property<&'static str>,
//!     changed: Signal<&'static str>,
//! }
//!
//! let kind = PlotKind { value: Property::new("casePlot"), changed: Signal::new() };
//! if kind.value.set("scatterPlot") {
//!     kind.changed.emit("scatterPlot");
//! }
//! assert!(!kind.value.set("scatterPlot"));
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

/// A shared value whose setter says whether anything changed.
///
/// The owner decides what to emit; the property itself has no listeners.
pub struct Property<T> {
    value: RwLock<T>,
}

impl<T: Clone> Property<T> {
    /// A property holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    /// A copy of the value. Prefer [`with`](Self::with) for large values.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Borrow the value for the duration of `f`.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(&self.value.read())
    }

    /// Overwrite without comparing.
    pub fn set_silent(&self, value: T) {
        *self.value.write() = value;
    }
}

impl<T: Clone + PartialEq> Property<T> {
    /// Store `value` if it differs from the current one. Returns whether it
    /// did; owners emit their change signal only then.
    pub fn set(&self, value: T) -> bool {
        let mut current = self.value.write();
        if *current != value {
            *current = value;
            true
        } else {
            false
        }
    }

    /// Like [`set`](Self::set), handing back the previous value on change.
    pub fn replace(&self, value: T) -> Option<T> {
        let mut current = self.value.write();
        if *current != value {
            Some(std::mem::replace(&mut *current, value))
        } else {
            None
        }
    }
}

impl<T: Clone + Default> Default for Property<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("value", &self.get())
            .finish()
    }
}

/// A computed value that caches its result until invalidated.
///
/// The computation receives no arguments; it captures whatever shared state
/// it derives from. Owners call [`invalidate`](Self::invalidate) when a
/// dependency changes.
pub struct Binding<T> {
    compute: Box<dyn Fn() -> T + Send + Sync>,
    cached: RwLock<Option<T>>,
    dirty: AtomicBool,
}

impl<T: Clone + Send + Sync + 'static> Binding<T> {
    /// A binding over `compute`, which first runs on the first read.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            compute: Box::new(compute),
            cached: RwLock::new(None),
            dirty: AtomicBool::new(true),
        }
    }

    /// The cached value, recomputed first if stale.
    pub fn get(&self) -> T {
        if !self.dirty.load(Ordering::Acquire) {
            if let Some(value) = self.cached.read().as_ref() {
                return value.clone();
            }
        }
        let value = (self.compute)();
        *self.cached.write() = Some(value.clone());
        self.dirty.store(false, Ordering::Release);
        value
    }

    /// Mark stale; the next read recomputes.
    pub fn invalidate(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Whether the next read recomputes.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Recompute now.
    pub fn refresh(&self) -> T {
        self.invalidate();
        self.get()
    }
}

impl<T: Clone + fmt::Debug + Send + Sync + 'static> fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("dirty", &self.is_dirty())
            .field("cached", &*self.cached.read())
            .finish()
    }
}
