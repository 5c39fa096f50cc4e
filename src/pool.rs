//! Worker-thread pool and submission API.
//!
//! The pool owns a capped set of lazily spawned worker threads, the shared
//! task queue and the mutex/condvar pair workers park on. Tasks flow from
//! [`ThreadPool::push_task`] through the queue to a worker, which drives
//! the per-task state machine; joiners never touch the pool at all, they
//! block on the task's state word directly.

use std::fmt;
use std::mem;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use core_affinity::CoreId;
use log::{debug, error, trace};

use crate::error::Error;
#[cfg(feature = "metrics")]
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::queue::CircularQueue;
use crate::task::{PoolTask, Task};

/// Hard cap on the worker count of a single pool.
pub const MAX_THREADS: usize = 20;

/// Hard cap on the number of tasks enqueued at any instant.
pub const MAX_TASKS: usize = 100_000;

/// Everything protected by the queue lock, including the two counters and
/// the worker handles.
struct State {
    queue: CircularQueue<Arc<dyn PoolTask>>,
    handles: Vec<JoinHandle<()>>,
    /// Workers parked on the condvar awaiting work.
    free: usize,
    shutting_down: bool,
}

struct Shared {
    state: Mutex<State>,
    work_available: Condvar,
    #[cfg(feature = "metrics")]
    metrics: Metrics,
}

/// A fixed-capacity pool of worker threads.
///
/// Workers are spawned lazily: a push that finds no parked worker and
/// spare capacity spawns one. Once spawned, a worker lives until the pool
/// shuts down.
///
/// Dropping the pool drains the queue and joins every worker; use
/// [`shutdown`](ThreadPool::shutdown) to instead require that the pool is
/// already idle.
pub struct ThreadPool {
    shared: Arc<Shared>,
    max_workers: usize,
    /// Cores to pin workers to, in spawn order. Empty when pinning is off.
    core_ids: Vec<CoreId>,
}

impl ThreadPool {
    /// Creates a pool that will run at most `max_workers` worker threads.
    ///
    /// Fails with [`Error::InvalidArgument`] unless
    /// `1 <= max_workers <= MAX_THREADS`.
    pub fn new(max_workers: usize) -> Result<Self, Error> {
        Self::build(max_workers, false)
    }

    /// Like [`new`](ThreadPool::new), but pins each worker to a CPU core
    /// (worker `i` to core `i` modulo the core count) for better cache
    /// locality.
    pub fn with_affinity(max_workers: usize) -> Result<Self, Error> {
        Self::build(max_workers, true)
    }

    /// Creates a pool sized to the available parallelism, capped at
    /// [`MAX_THREADS`].
    pub fn with_default_threads() -> Self {
        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
            .min(MAX_THREADS);
        Self::build(workers, false).expect("default worker count is always in range")
    }

    fn build(max_workers: usize, pin_workers: bool) -> Result<Self, Error> {
        if max_workers == 0 || max_workers > MAX_THREADS {
            return Err(Error::InvalidArgument);
        }

        let core_ids = if pin_workers {
            core_affinity::get_core_ids().unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(ThreadPool {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    queue: CircularQueue::new(),
                    handles: Vec::with_capacity(max_workers),
                    free: 0,
                    shutting_down: false,
                }),
                work_available: Condvar::new(),
                #[cfg(feature = "metrics")]
                metrics: Metrics::new(),
            }),
            max_workers,
            core_ids,
        })
    }

    /// Submits a task for execution.
    ///
    /// The task must be freshly created or joined; anything else fails with
    /// [`Error::InvalidRepush`]. Fails with [`Error::TooManyTasks`] when
    /// [`MAX_TASKS`] tasks are already queued, leaving the task state
    /// untouched so the push can be retried.
    pub fn push_task<R: Send + 'static>(&self, task: &Task<R>) -> Result<(), Error> {
        let mut state = self.shared.state.lock().unwrap();

        if state.queue.len() >= MAX_TASKS {
            return Err(Error::TooManyTasks);
        }

        task.mark_pushed()?;
        state.queue.push(task.pool_handle());

        // Lazy spawn: every parked worker will consume one queued task, so
        // a new thread is only needed when none is parked.
        if state.free == 0 && state.handles.len() < self.max_workers {
            let id = state.handles.len();
            let core = self.core_ids.get(id % self.core_ids.len().max(1)).copied();
            state
                .handles
                .push(spawn_worker(Arc::clone(&self.shared), id, core));
            #[cfg(feature = "metrics")]
            self.shared.metrics.record_worker_spawned();
        }

        #[cfg(feature = "metrics")]
        self.shared.metrics.record_task_pushed();

        drop(state);
        // One push corresponds to at most one task to consume; waking a
        // single parked worker is enough.
        self.shared.work_available.notify_one();
        Ok(())
    }

    /// Number of worker threads spawned so far.
    ///
    /// A best-effort instantaneous value unless externally serialized with
    /// pushes.
    pub fn thread_count(&self) -> usize {
        self.shared.state.lock().unwrap().handles.len()
    }

    /// Shuts the pool down, joining every worker thread.
    ///
    /// Fails with [`Error::HasTasks`] if any task is queued or executing,
    /// handing the pool back in the error so the caller can drain it and
    /// retry.
    pub fn shutdown(self) -> Result<(), (Self, Error)> {
        {
            let mut state = self.shared.state.lock().unwrap();
            // A worker is parked on the condvar iff it is counted free, so
            // queue empty plus all workers free means nothing is in flight
            // and every worker is at its sole cancellation point.
            if !state.queue.is_empty() || state.free != state.handles.len() {
                drop(state);
                return Err((self, Error::HasTasks));
            }
            state.shutting_down = true;
        }
        debug!("pool shutting down");
        self.join_workers();
        Ok(())
    }

    /// Takes the handles, wakes every parked worker and joins them.
    fn join_workers(&self) {
        let handles = {
            let mut state = self.shared.state.lock().unwrap();
            state.shutting_down = true;
            mem::take(&mut state.handles)
        };
        self.shared.work_available.notify_all();
        for handle in handles {
            if handle.join().is_err() {
                error!("worker thread panicked");
            }
        }
    }

    /// Snapshot of the pool's counters. Available with the `metrics`
    /// feature.
    #[cfg(feature = "metrics")]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("max_workers", &self.max_workers)
            .field("spawned", &self.thread_count())
            .finish()
    }
}

impl Drop for ThreadPool {
    /// Drains queued tasks and joins the workers. Unlike
    /// [`shutdown`](ThreadPool::shutdown) this cannot report still-pending
    /// work, so workers finish whatever is queued before exiting.
    fn drop(&mut self) {
        self.join_workers();
    }
}

fn spawn_worker(shared: Arc<Shared>, id: usize, core: Option<CoreId>) -> JoinHandle<()> {
    // Spawn failure is not surfaced to the pusher: the spawn decision was
    // made deliberately (no free worker, capacity remains), so a pool that
    // cannot run its tasks is unrecoverable.
    thread::Builder::new()
        .name(format!("taskpool-worker-{id}"))
        .spawn(move || {
            if let Some(core) = core {
                core_affinity::set_for_current(core);
            }
            worker_loop(shared, id);
        })
        .expect("failed to spawn worker thread")
}

fn worker_loop(shared: Arc<Shared>, id: usize) {
    trace!("worker {id} started");
    let mut finished: Option<Arc<dyn PoolTask>> = None;

    loop {
        let mut state = shared.state.lock().unwrap();

        // Completing the previous task after re-taking the lock (rather
        // than before releasing it last iteration) keeps shutdown's
        // accounting exact: a joiner can observe Completed and return the
        // task to the user while this worker is still counted busy.
        if let Some(task) = finished.take() {
            task.complete();
            #[cfg(feature = "metrics")]
            shared.metrics.record_task_completed();
        }

        state.free += 1;
        while state.queue.is_empty() && !state.shutting_down {
            state = shared.work_available.wait(state).unwrap();
        }
        state.free -= 1;

        if state.shutting_down && state.queue.is_empty() {
            break;
        }

        let task = state.queue.pop().expect("woken with an empty queue");
        drop(state);

        task.claim();
        task.run();
        finished = Some(task);
    }
    trace!("worker {id} exiting");
}
