//! Error taxonomy for pool and task operations.
//!
//! Every recoverable fault is reported as a tagged value; the library never
//! aborts on a recoverable error. Unrecoverable faults (worker spawn failure,
//! allocation failure) panic instead.

use thiserror::Error;

use crate::pool::{MAX_TASKS, MAX_THREADS};

/// Errors returned by [`ThreadPool`](crate::ThreadPool) and
/// [`Task`](crate::Task) operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The requested worker cap is zero or exceeds [`MAX_THREADS`].
    #[error("max worker count must be between 1 and {MAX_THREADS}")]
    InvalidArgument,

    /// Shutdown was attempted while tasks are still queued or executing.
    #[error("pool still has queued or running tasks")]
    HasTasks,

    /// The push would exceed [`MAX_TASKS`] enqueued tasks.
    #[error("task queue is at capacity ({MAX_TASKS} tasks)")]
    TooManyTasks,

    /// The pushed task is neither freshly created nor joined.
    #[error("task is neither new nor joined")]
    InvalidRepush,

    /// Join or detach was attempted on a task that was never pushed.
    #[error("task has not been pushed to a pool")]
    TaskNotPushed,

    /// Delete was attempted while the pool still owns the task.
    #[error("task is still owned by the pool")]
    TaskInPool,

    /// A timed join elapsed before the task completed.
    #[error("timed out waiting for the task")]
    Timeout,
}
