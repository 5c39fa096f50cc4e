//! Optional pool counters, enabled with the `metrics` feature.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

/// Live counters updated by the pool. All updates are relaxed; the
/// numbers are diagnostics, not synchronization.
#[derive(Debug)]
pub struct Metrics {
    tasks_pushed: AtomicU64,
    tasks_completed: AtomicU64,
    workers_spawned: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub(crate) fn new() -> Self {
        Metrics {
            tasks_pushed: AtomicU64::new(0),
            tasks_completed: AtomicU64::new(0),
            workers_spawned: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub(crate) fn record_task_pushed(&self) {
        self.tasks_pushed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_task_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_worker_spawned(&self) {
        self.workers_spawned.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of the current counter values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_pushed: self.tasks_pushed.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            workers_spawned: self.workers_spawned.load(Ordering::Relaxed),
            elapsed_seconds: self.start_time.elapsed().as_secs_f64(),
        }
    }
}

/// Counter values at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub tasks_pushed: u64,
    pub tasks_completed: u64,
    pub workers_spawned: u64,
    pub elapsed_seconds: f64,
}

impl MetricsSnapshot {
    /// Tasks completed per second since pool construction.
    pub fn tasks_per_second(&self) -> f64 {
        if self.elapsed_seconds > 0.0 {
            self.tasks_completed as f64 / self.elapsed_seconds
        } else {
            0.0
        }
    }

    /// Pushed-but-not-yet-completed tasks (queued plus in flight).
    pub fn backlog(&self) -> i64 {
        self.tasks_pushed as i64 - self.tasks_completed as i64
    }
}
