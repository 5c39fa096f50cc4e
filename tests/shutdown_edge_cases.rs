use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use taskpool::{Error, Task, ThreadPool, MAX_THREADS};

#[test]
fn test_worker_cap_validation() {
    assert_eq!(ThreadPool::new(0).err(), Some(Error::InvalidArgument));
    assert_eq!(
        ThreadPool::new(MAX_THREADS + 1).err(),
        Some(Error::InvalidArgument)
    );
    assert!(ThreadPool::new(MAX_THREADS).is_ok());
    assert!(ThreadPool::new(1).is_ok());
}

#[test]
fn test_shutdown_idle_pool() {
    let pool = ThreadPool::new(4).unwrap();
    // No task was ever pushed, so no worker was ever spawned.
    assert_eq!(pool.thread_count(), 0);
    pool.shutdown().map_err(|(_, e)| e).expect("Shutdown failed");
}

#[test]
fn test_shutdown_with_running_task() {
    let pool = ThreadPool::new(2).unwrap();

    let release = Arc::new(AtomicBool::new(false));
    let release_clone = release.clone();
    let mut task = Task::new(move || {
        while !release_clone.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(1));
        }
    });
    pool.push_task(&task).unwrap();

    // The worker is blocked inside the task body.
    let (pool, err) = pool.shutdown().unwrap_err();
    assert_eq!(err, Error::HasTasks);

    release.store(true, Ordering::SeqCst);
    task.join().unwrap();

    pool.shutdown().map_err(|(_, e)| e).expect("Shutdown failed");
}

#[test]
fn test_shutdown_with_queued_task() {
    let pool = ThreadPool::new(1).unwrap();

    let release = Arc::new(AtomicBool::new(false));
    let release_clone = release.clone();
    let mut gate = Task::new(move || {
        while !release_clone.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(1));
        }
    });
    let mut queued = Task::new(|| 5);

    pool.push_task(&gate).unwrap();
    pool.push_task(&queued).unwrap();

    // One task running, one still in the queue.
    let (pool, err) = pool.shutdown().unwrap_err();
    assert_eq!(err, Error::HasTasks);

    release.store(true, Ordering::SeqCst);
    gate.join().unwrap();
    assert_eq!(queued.join(), Ok(5));

    pool.shutdown().map_err(|(_, e)| e).expect("Shutdown failed");
}

#[test]
fn test_drop_drains_queued_tasks() {
    let pool = ThreadPool::new(2).unwrap();
    let completed = Arc::new(AtomicUsize::new(0));
    let num_tasks = 50;

    let tasks: Vec<Task<()>> = (0..num_tasks)
        .map(|_| {
            let completed = completed.clone();
            Task::new(move || {
                completed.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();
    for task in &tasks {
        pool.push_task(task).unwrap();
    }

    // Dropping the pool joins the workers only after the queue is drained.
    drop(pool);
    assert_eq!(completed.load(Ordering::SeqCst), num_tasks);
}
