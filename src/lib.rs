//! # taskpool - Futex-Joined Worker-Thread Pool
//!
//! A fixed-size pool of worker threads with futex-backed task join
//! semantics and detached task lifetimes. Submissions are closures
//! returning a typed value; the pool multiplexes them across a lazily
//! grown, capped set of OS threads.
//!
//! ## Architecture
//!
//! - **Tasks**: a closure plus a 32-bit lifecycle state word, transitioned
//!   lock-free with compare-exchange and a futex wake after every change
//! - **Circular queue**: FIFO of pending tasks, guarded by the pool lock
//! - **Futex wait-for-value**: joiners sleep directly on the task's state
//!   word until it reads completed, immune to spurious wakeups
//! - **Workers**: OS threads spawned on demand up to the pool cap, parked
//!   on a condvar while the queue is empty
//!
//! ## Example
//!
//! ```no_run
//! use taskpool::{Task, ThreadPool};
//!
//! let pool = ThreadPool::new(4).unwrap();
//!
//! let mut task = Task::new(|| 2 + 2);
//! pool.push_task(&task).unwrap();
//! assert_eq!(task.join().unwrap(), 4);
//!
//! pool.shutdown().expect("pool is idle");
//! ```

pub mod error;
pub mod futex;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod pool;
pub mod queue;
pub mod task;

pub use error::Error;
pub use pool::{ThreadPool, MAX_TASKS, MAX_THREADS};
pub use task::Task;
