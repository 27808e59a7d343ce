//! Cooperative event loop built on a deferred task queue.
//!
//! The engine is single-threaded and notification driven. The only deliberate
//! suspension point is "run this on the next turn of the event loop", which is
//! what [`EventLoop::post`] provides. A turn runs exactly the tasks that were
//! queued when it started; anything posted while a turn is running waits for
//! the following turn.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::logging::targets;

/// A unique identifier for a deferred task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// Get the raw u64 value of this task ID.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Global counter for generating unique task IDs.
static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

fn next_task_id() -> TaskId {
    TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
}

/// A boxed task closure.
type BoxedTask = Box<dyn FnOnce() + Send + 'static>;

struct TaskData {
    id: TaskId,
    task: BoxedTask,
}

/// An ordered queue of deferred tasks.
pub struct TaskQueue {
    tasks: VecDeque<TaskData>,
}

impl TaskQueue {
    /// Create a new task queue.
    pub fn new() -> Self {
        Self { tasks: VecDeque::new() }
    }

    /// Post a task, returning the ID that can be used to cancel it.
    pub fn post<F>(&mut self, task: F) -> TaskId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = next_task_id();
        self.tasks.push_back(TaskData {
            id,
            task: Box::new(task),
        });
        id
    }

    /// Cancel a pending task.
    ///
    /// Returns `true` if the task was found and cancelled.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        self.take(id).is_some()
    }

    /// Remove a pending task and hand it back without running it.
    fn take(&mut self, id: TaskId) -> Option<BoxedTask> {
        let pos = self.tasks.iter().position(|t| t.id == id)?;
        self.tasks.remove(pos).map(|data| data.task)
    }

    /// Check if there are any pending tasks.
    pub fn has_pending(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Get the number of pending tasks.
    pub fn pending_count(&self) -> usize {
        self.tasks.len()
    }

    /// IDs of all pending tasks, oldest first.
    fn pending_ids(&self) -> Vec<TaskId> {
        self.tasks.iter().map(|t| t.id).collect()
    }

    /// Process all pending tasks.
    ///
    /// Returns the number of tasks processed.
    pub fn process_all(&mut self) -> usize {
        let count = self.tasks.len();
        while let Some(task_data) = self.tasks.pop_front() {
            (task_data.task)();
        }
        count
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// A shareable, turn-based event loop.
///
/// Unlike [`TaskQueue::process_all`], running a turn never holds the queue
/// lock while a task executes, so tasks may post or cancel other tasks.
pub struct EventLoop {
    queue: Mutex<TaskQueue>,
    turns: AtomicU64,
    turn_limit: Option<usize>,
}

impl EventLoop {
    /// Create an empty event loop.
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(TaskQueue::new()),
            turns: AtomicU64::new(0),
            turn_limit: None,
        }
    }

    /// Create an event loop that runs at most `batch_size` tasks per turn.
    /// The rest stay queued, in order, for the following turns.
    pub fn with_batch_size(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            queue: Mutex::new(TaskQueue::new()),
            turns: AtomicU64::new(0),
            turn_limit: Some(batch_size),
        }
    }

    /// The per-turn task limit, if any.
    pub fn batch_size(&self) -> Option<usize> {
        self.turn_limit
    }

    /// Schedule a task for the next turn.
    pub fn post<F>(&self, task: F) -> TaskId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.queue.lock().post(task);
        tracing::trace!(target: targets::EVENT_LOOP, task = id.as_u64(), "task posted");
        id
    }

    /// Cancel a task that has not run yet.
    pub fn cancel(&self, id: TaskId) -> bool {
        let cancelled = self.queue.lock().cancel(id);
        if cancelled {
            tracing::trace!(target: targets::EVENT_LOOP, task = id.as_u64(), "task cancelled");
        }
        cancelled
    }

    /// Check if any task is waiting for a turn.
    pub fn has_pending(&self) -> bool {
        self.queue.lock().has_pending()
    }

    /// Number of tasks waiting for a turn.
    pub fn pending_count(&self) -> usize {
        self.queue.lock().pending_count()
    }

    /// Number of turns run so far.
    pub fn turn_count(&self) -> u64 {
        self.turns.load(Ordering::Relaxed)
    }

    /// Run one turn: every task that was pending when the turn started and
    /// has not been cancelled in the meantime.
    ///
    /// Returns the number of tasks that ran.
    pub fn run_turn(&self) -> usize {
        let mut ids = self.queue.lock().pending_ids();
        if let Some(limit) = self.turn_limit {
            ids.truncate(limit);
        }
        let turn = self.turns.fetch_add(1, Ordering::Relaxed) + 1;
        let mut ran = 0;
        for id in ids {
            let task = self.queue.lock().take(id);
            if let Some(task) = task {
                task();
                ran += 1;
            }
        }
        tracing::trace!(target: targets::EVENT_LOOP, turn, ran, "turn complete");
        ran
    }

    /// Run turns until the queue is empty or `max_turns` have run.
    ///
    /// Returns the total number of tasks that ran.
    pub fn run_until_idle(&self, max_turns: usize) -> usize {
        let mut total = 0;
        for _ in 0..max_turns {
            if !self.has_pending() {
                break;
            }
            total += self.run_turn();
        }
        if self.has_pending() {
            tracing::warn!(
                target: targets::EVENT_LOOP,
                pending = self.pending_count(),
                max_turns,
                "event loop still busy after turn limit"
            );
        }
        total
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("pending", &self.pending_count())
            .field("turns", &self.turn_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(EventLoop: Send, Sync);
