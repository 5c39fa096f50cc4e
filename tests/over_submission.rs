use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use taskpool::{Error, Task, ThreadPool, MAX_TASKS};

/// Fills the queue to the cap with a single blocked worker, verifies the
/// overflow rejection, then drains and re-pushes the rejected task.
#[test]
fn test_queue_cap_rejects_then_recovers() {
    let pool = ThreadPool::new(1).unwrap();

    let release = Arc::new(AtomicBool::new(false));
    let release_clone = release.clone();
    let mut gate = Task::new(move || {
        while !release_clone.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(1));
        }
    });
    pool.push_task(&gate).unwrap();

    // Wait until the worker has taken the gate task off the queue so the
    // fillers below account for the entire capacity.
    while !gate.is_running() {
        std::thread::sleep(Duration::from_millis(1));
    }

    let mut fillers: Vec<Task<usize>> = Vec::with_capacity(MAX_TASKS);
    for i in 0..MAX_TASKS {
        let task = Task::new(move || i);
        pool.push_task(&task).unwrap();
        fillers.push(task);
    }

    // The queue is exactly at the cap; one more must be rejected with the
    // task state left untouched.
    let mut rejected = Task::new(|| 1234);
    assert_eq!(pool.push_task(&rejected), Err(Error::TooManyTasks));

    release.store(true, Ordering::SeqCst);
    gate.join().unwrap();
    for (i, task) in fillers.iter_mut().enumerate() {
        assert_eq!(task.join(), Ok(i));
    }

    // With the queue drained the earlier rejection succeeds.
    pool.push_task(&rejected).unwrap();
    assert_eq!(rejected.join(), Ok(1234));

    pool.shutdown().map_err(|(_, e)| e).expect("Shutdown failed");
}
