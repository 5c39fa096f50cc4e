//! Task lifecycle state machine.
//!
//! A task wraps a user closure, its eventual return value and a 32-bit
//! state word. The state word is the only synchronization point between
//! the submitter, the executing worker and joiners: every transition is a
//! compare-exchange followed by a futex wake, and joiners block on the
//! word directly via [`futex::wait_for_value`].

use std::cell::UnsafeCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;
use crate::futex;

/// Lifecycle states of a task.
///
/// Only forward transitions are possible, with one exception: a joined
/// task may be pushed again, which is the sole way to reuse a task object.
/// The acyclicity of the remaining graph is what lets multi-branch
/// operations run as a sequence of compare-exchanges without a lock: a
/// task can move from `Pushed` to `Running` underneath a caller, never
/// back, so attempts are ordered from the state closest to `Created`.
///
/// The `*Ghost` states mean ownership has transferred from the user to the
/// pool via [`Task::detach`]; the pool destroys such a task when its
/// worker finishes it.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskState {
    Created = 0,
    Pushed = 1,
    PushedGhost = 2,
    Running = 3,
    RunningGhost = 4,
    Completed = 5,
    Joined = 6,
}

struct TaskInner<R> {
    /// Current state. Doubles as the futex word joiners sleep on; on every
    /// successful transition all waiters are woken.
    state: AtomicU32,
    work: UnsafeCell<Box<dyn FnMut() -> R + Send + 'static>>,
    ret: UnsafeCell<Option<R>>,
}

// SAFETY: `work` and `ret` are only ever touched by the unique owner the
// state machine designates: the worker that claimed the task while it is
// running, the joiner after the transition into Joined. The state word
// itself is atomic.
unsafe impl<R: Send> Send for TaskInner<R> {}
unsafe impl<R: Send> Sync for TaskInner<R> {}

impl<R> TaskInner<R> {
    /// Attempts `from` -> `to` on the state word and wakes all waiters on
    /// success.
    ///
    /// Success ordering is AcqRel: the task must have fully transitioned
    /// into `from` before this thread can act on it, and the new state must
    /// be published before any further actions are taken. Failure ordering
    /// is Relaxed: the unexpected state is not reported and nothing is
    /// decided based on it.
    fn transition(&self, from: TaskState, to: TaskState) -> bool {
        let swapped = self
            .state
            .compare_exchange(from as u32, to as u32, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok();
        if swapped {
            futex::wake_all(&self.state);
        }
        swapped
    }

    fn state_is(&self, state: TaskState, order: Ordering) -> bool {
        self.state.load(order) == state as u32
    }
}

/// Worker-facing view of a queued task, type-erased so tasks with
/// different return types share one queue.
pub(crate) trait PoolTask: Send + Sync {
    /// Transitions out of the pushed states; called right after popping.
    fn claim(&self);
    /// Runs the closure and stores the return value.
    fn run(&self);
    /// Transitions out of the running states; called by the worker under
    /// the queue lock before it picks up new work.
    fn complete(&self);
}

impl<R: Send + 'static> PoolTask for TaskInner<R> {
    fn claim(&self) {
        if !self.transition(TaskState::Pushed, TaskState::Running) {
            let claimed = self.transition(TaskState::PushedGhost, TaskState::RunningGhost);
            debug_assert!(claimed, "popped a task that is not in a pushed state");
        }
    }

    fn run(&self) {
        // SAFETY: claim() made this worker the unique owner of `work` and
        // `ret` until the completion transition.
        let work = unsafe { &mut *self.work.get() };
        match panic::catch_unwind(AssertUnwindSafe(|| work())) {
            // The value must be in place before the transition into
            // Completed publishes it to joiners.
            Ok(value) => unsafe { *self.ret.get() = Some(value) },
            Err(payload) => {
                let msg = if let Some(s) = payload.downcast_ref::<&str>() {
                    *s
                } else if let Some(s) = payload.downcast_ref::<String>() {
                    s.as_str()
                } else {
                    "unknown panic payload"
                };
                log::error!("task panicked: {msg}");
            }
        }
    }

    fn complete(&self) {
        if !self.transition(TaskState::Running, TaskState::Completed) {
            // The user detached after the claim; the Joined transition plus
            // the worker dropping its handle destroys the task.
            let finished = self.transition(TaskState::RunningGhost, TaskState::Joined);
            debug_assert!(finished, "finished a task that is not in a running state");
        }
    }
}

/// A unit of work submitted to a [`ThreadPool`](crate::ThreadPool).
///
/// The closure is `FnMut` so a joined task can be pushed again and re-run;
/// captured state carries over between runs.
///
/// Dropping the handle while the task is inside a pool is safe: the pool
/// holds its own reference and the task simply completes unobserved.
pub struct Task<R> {
    inner: Arc<TaskInner<R>>,
}

impl<R: Send + 'static> Task<R> {
    /// Creates a task in the created state. It does nothing until pushed.
    pub fn new<F>(work: F) -> Self
    where
        F: FnMut() -> R + Send + 'static,
    {
        Task {
            inner: Arc::new(TaskInner {
                state: AtomicU32::new(TaskState::Created as u32),
                work: UnsafeCell::new(Box::new(work)),
                ret: UnsafeCell::new(None),
            }),
        }
    }

    /// True once the task has finished executing and its result is (or
    /// was) available. Stays true until the task is pushed again.
    pub fn is_finished(&self) -> bool {
        // Acquire pairs with the release half of the completion transition,
        // so a true result means the closure's writes are visible.
        let state = self.inner.state.load(Ordering::Acquire);
        state == TaskState::Completed as u32 || state == TaskState::Joined as u32
    }

    /// True while a worker is executing the task.
    ///
    /// The state is not protected by any lock and may change at any time;
    /// a true result only means execution has started (and possibly
    /// already finished by the time the caller can react).
    pub fn is_running(&self) -> bool {
        self.inner.state_is(TaskState::Running, Ordering::Acquire)
    }

    /// Blocks until the task completes and returns its result.
    ///
    /// Fails with [`Error::TaskNotPushed`] if the task was never pushed.
    /// After a successful join the task may be pushed again or deleted.
    ///
    /// # Panics
    ///
    /// Panics if the return slot is empty: the task was already joined, or
    /// its closure panicked.
    pub fn join(&mut self) -> Result<R, Error> {
        self.join_inner(None)
    }

    /// Like [`join`](Task::join), but gives up after `timeout` with
    /// [`Error::Timeout`]. A timeout of `Duration::MAX` means no deadline.
    pub fn timed_join(&mut self, timeout: Duration) -> Result<R, Error> {
        let timeout = (timeout != Duration::MAX).then_some(timeout);
        self.join_inner(timeout)
    }

    fn join_inner(&mut self, timeout: Option<Duration>) -> Result<R, Error> {
        let state = self.inner.state.load(Ordering::Relaxed);
        if state == TaskState::Created as u32 {
            return Err(Error::TaskNotPushed);
        }

        if state != TaskState::Joined as u32 {
            futex::wait_for_value(&self.inner.state, TaskState::Completed as u32, timeout)?;
            let joined = self.transition(TaskState::Completed, TaskState::Joined);
            debug_assert!(joined, "no other thread may transition out of Completed");
        }

        // SAFETY: the Joined transition made this handle the unique owner
        // of the return slot.
        let value = unsafe { (*self.inner.ret.get()).take() };
        Ok(value.expect("task return value already consumed"))
    }

    /// Transfers ownership of the task to the pool.
    ///
    /// A detached task is destroyed by the pool once its worker finishes
    /// it; if it has already completed, it is destroyed here. Fails with
    /// [`Error::TaskNotPushed`] if the task was never pushed, handing the
    /// task back in the error.
    pub fn detach(self) -> Result<(), (Self, Error)> {
        if self.inner.state_is(TaskState::Created, Ordering::Relaxed) {
            return Err((self, Error::TaskNotPushed));
        }

        // Attempts follow the transition graph: the task can move from
        // Pushed to Running (and from Running to Completed) underneath us,
        // never backwards, so the source closest to Created goes first.
        let _ = self.transition(TaskState::Pushed, TaskState::PushedGhost)
            || self.transition(TaskState::Running, TaskState::RunningGhost)
            || self.transition(TaskState::Completed, TaskState::Joined);

        // Every branch ends with this handle dropped. For a task that
        // reached Joined that drop is the destruction point; for the ghost
        // states the worker's final transition and drop destroy it.
        Ok(())
    }

    /// Destroys the task. Fails with [`Error::TaskInPool`] while the pool
    /// still owns it, handing the task back in the error.
    pub fn delete(self) -> Result<(), (Self, Error)> {
        let state = self.inner.state.load(Ordering::Acquire);
        if state == TaskState::Created as u32 || state == TaskState::Joined as u32 {
            Ok(())
        } else {
            Err((self, Error::TaskInPool))
        }
    }

    /// Attempts the push transitions, first-push then re-push.
    pub(crate) fn mark_pushed(&self) -> Result<(), Error> {
        if self.transition(TaskState::Created, TaskState::Pushed)
            || self.transition(TaskState::Joined, TaskState::Pushed)
        {
            Ok(())
        } else {
            Err(Error::InvalidRepush)
        }
    }

    /// The type-erased reference the pool queues and workers drive.
    pub(crate) fn pool_handle(&self) -> Arc<dyn PoolTask> {
        self.inner.clone()
    }

    fn transition(&self, from: TaskState, to: TaskState) -> bool {
        self.inner.transition(from, to)
    }
}
