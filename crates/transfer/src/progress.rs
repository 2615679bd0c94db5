use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::types::{TaskId, TransferTask};

/// Receives byte-level progress from the fetch and upload engines.
///
/// Implementations aggregate only; they never influence the transfer.
pub trait ProgressSink: Send + Sync {
    /// Announces how many files the current run will transfer.
    fn set_total_file_count(&self, total: u64);

    /// Registers a new transfer of `total_bytes` and returns its handle.
    fn add_task(&self, name: &str, total_bytes: u64) -> TaskId;

    /// Advances a task by `delta` bytes.
    fn update_task(&self, task: TaskId, delta: u64);

    /// Marks a task as finished.
    fn complete_task(&self, task: TaskId);

    /// Replaces the human-readable status line.
    fn set_status_text(&self, text: &str);
}

/// Notification emitted by [`ProgressTracker`] after every mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    TotalFiles(u64),
    TaskAdded {
        task: TaskId,
        name: String,
        total_bytes: u64,
    },
    TaskAdvanced {
        task: TaskId,
        delta: u64,
    },
    TaskCompleted {
        task: TaskId,
    },
    Status(String),
}

/// Callback invoked with tracker events.
pub type ProgressCallback = Box<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Point-in-time view of overall progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    /// Time since the first task was added.
    pub elapsed: Duration,
    /// Linear extrapolation of the time left; `None` until some bytes completed.
    pub remaining: Option<Duration>,
    /// Average throughput since start.
    pub bytes_per_second: f64,
    pub completed_bytes: u64,
    pub total_bytes: u64,
    pub completed_files: u64,
    pub total_files: u64,
    pub status: String,
}

impl ProgressSnapshot {
    /// Completed fraction of all registered bytes, in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.completed_bytes as f64 / self.total_bytes as f64).min(1.0)
    }
}

/// In-memory [`ProgressSink`] that keeps per-task and overall counters.
pub struct ProgressTracker {
    inner: RwLock<TrackerInner>,
    callbacks: RwLock<Vec<ProgressCallback>>,
}

struct TrackerInner {
    tasks: HashMap<TaskId, TransferTask>,
    next_id: u64,
    started_at: Option<Instant>,
    total_files: u64,
    completed_files: u64,
    total_bytes: u64,
    completed_bytes: u64,
    status: String,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(TrackerInner {
                tasks: HashMap::new(),
                next_id: 0,
                started_at: None,
                total_files: 0,
                completed_files: 0,
                total_bytes: 0,
                completed_bytes: 0,
                status: String::new(),
            }),
            callbacks: RwLock::new(Vec::new()),
        }
    }

    /// Registers an event callback.
    pub fn on_event(&self, callback: ProgressCallback) {
        let mut callbacks = self.callbacks.write().unwrap();
        callbacks.push(callback);
    }

    /// Returns a copy of a task's current state.
    pub fn task(&self, task: TaskId) -> Option<TransferTask> {
        let inner = self.inner.read().unwrap();
        inner.tasks.get(&task).cloned()
    }

    /// Instant the first task was registered.
    pub fn started_at(&self) -> Option<Instant> {
        let inner = self.inner.read().unwrap();
        inner.started_at
    }

    /// Current overall progress.
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot_at(Instant::now())
    }

    /// Overall progress as observed at `now`.
    pub fn snapshot_at(&self, now: Instant) -> ProgressSnapshot {
        let inner = self.inner.read().unwrap();
        let elapsed = inner
            .started_at
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default();

        let secs = elapsed.as_secs_f64();
        let bytes_per_second = if secs > 0.0 {
            inner.completed_bytes as f64 / secs
        } else {
            0.0
        };

        ProgressSnapshot {
            elapsed,
            remaining: estimate_remaining(elapsed, inner.completed_bytes, inner.total_bytes),
            bytes_per_second,
            completed_bytes: inner.completed_bytes,
            total_bytes: inner.total_bytes,
            completed_files: inner.completed_files,
            total_files: inner.total_files,
            status: inner.status.clone(),
        }
    }

    fn emit(&self, event: ProgressEvent) {
        let callbacks = self.callbacks.read().unwrap();
        for cb in callbacks.iter() {
            cb(&event);
        }
    }
}

impl ProgressSink for ProgressTracker {
    fn set_total_file_count(&self, total: u64) {
        {
            let mut inner = self.inner.write().unwrap();
            inner.total_files = total;
        }
        self.emit(ProgressEvent::TotalFiles(total));
    }

    fn add_task(&self, name: &str, total_bytes: u64) -> TaskId {
        let task = {
            let mut inner = self.inner.write().unwrap();
            if inner.started_at.is_none() {
                inner.started_at = Some(Instant::now());
            }
            let task = TaskId(inner.next_id);
            inner.next_id += 1;
            inner.total_bytes += total_bytes;
            inner.tasks.insert(
                task,
                TransferTask {
                    name: name.to_string(),
                    total_bytes,
                    completed_bytes: 0,
                    finished: false,
                },
            );
            task
        };
        self.emit(ProgressEvent::TaskAdded {
            task,
            name: name.to_string(),
            total_bytes,
        });
        task
    }

    fn update_task(&self, task: TaskId, delta: u64) {
        if delta == 0 {
            return;
        }
        {
            let mut inner = self.inner.write().unwrap();
            let Some(state) = inner.tasks.get_mut(&task) else {
                return;
            };
            state.completed_bytes += delta;
            inner.completed_bytes += delta;
        }
        self.emit(ProgressEvent::TaskAdvanced { task, delta });
    }

    fn complete_task(&self, task: TaskId) {
        {
            let mut inner = self.inner.write().unwrap();
            let Some(state) = inner.tasks.get_mut(&task) else {
                return;
            };
            if state.finished {
                return;
            }
            // Credit bytes the transport never reported.
            let shortfall = state.total_bytes.saturating_sub(state.completed_bytes);
            state.completed_bytes += shortfall;
            state.finished = true;
            inner.completed_bytes += shortfall;
            inner.completed_files += 1;
        }
        self.emit(ProgressEvent::TaskCompleted { task });
    }

    fn set_status_text(&self, text: &str) {
        {
            let mut inner = self.inner.write().unwrap();
            inner.status = text.to_string();
        }
        self.emit(ProgressEvent::Status(text.to_string()));
    }
}

/// `remaining = elapsed * (total / completed - 1)`, defined once completed > 0.
fn estimate_remaining(elapsed: Duration, completed: u64, total: u64) -> Option<Duration> {
    if completed == 0 || total == 0 {
        return None;
    }
    let factor = (total as f64 / completed as f64 - 1.0).max(0.0);
    Some(elapsed.mul_f64(factor))
}
