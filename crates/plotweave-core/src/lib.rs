//! Core systems for plotweave.
//!
//! This crate provides the runtime pieces the graph engine is built on:
//!
//! - **Signal/Slot System**: explicit change notification between models
//! - **Property System**: change-detecting values and cached, invalidatable bindings
//! - **Event Loop**: a cooperative, turn-based task queue
//! - **Debounced Refresh**: coalesces bursts of triggers into one deferred recompute
//! - **Logging**: `tracing` targets shared by the workspace
//!
//! # Signal/Slot Example
//!
//! ```
//! use plotweave_core::Signal;
//!
//! let bounds_changed = Signal::<f64>::new();
//! let conn_id = bounds_changed.connect(|width| {
//!     println!("plot width is now {width}");
//! });
//! bounds_changed.emit(350.0);
//! bounds_changed.disconnect(conn_id);
//! ```
//!
//! # Debounce Example
//!
//! ```
//! use std::sync::Arc;
//! use plotweave_core::{Debouncer, EventLoop};
//!
//! let event_loop = Arc::new(EventLoop::new());
//! let refresh = Debouncer::new("points", &event_loop, || println!("repositioning points"));
//! refresh.request().unwrap();
//! refresh.request().unwrap();
//! assert_eq!(event_loop.run_turn(), 1);
//! ```

mod error;
pub mod logging;
pub mod property;
pub mod refresh;
pub mod signal;
mod task;

pub use error::{CoreError, RefreshError, Result, SignalError};
pub use logging::PerfSpan;
pub use property::{Binding, Property};
pub use refresh::Debouncer;
pub use signal::{ConnectionGuard, ConnectionId, Signal};
pub use task::{EventLoop, TaskId, TaskQueue};
