use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use taskpool::{Task, ThreadPool};

#[test]
fn test_workers_spawn_on_demand() {
    let pool = ThreadPool::new(8).unwrap();
    assert_eq!(pool.thread_count(), 0);

    let started = Arc::new(AtomicUsize::new(0));
    let release = Arc::new(AtomicBool::new(false));

    let mut tasks: Vec<Task<()>> = (0..3)
        .map(|_| {
            let started = started.clone();
            let release = release.clone();
            Task::new(move || {
                started.fetch_add(1, Ordering::SeqCst);
                while !release.load(Ordering::SeqCst) {
                    std::hint::spin_loop();
                }
            })
        })
        .collect();
    for task in &tasks {
        pool.push_task(task).unwrap();
    }

    // All three tasks occupy a worker each, so exactly three threads exist
    // despite the cap of eight.
    while started.load(Ordering::SeqCst) < 3 {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(pool.thread_count(), 3);

    release.store(true, Ordering::SeqCst);
    for task in &mut tasks {
        task.join().unwrap();
    }
    assert!(pool.thread_count() <= 3);

    pool.shutdown().map_err(|(_, e)| e).expect("Shutdown failed");
}

#[test]
fn test_parked_worker_is_reused() {
    let pool = ThreadPool::new(4).unwrap();

    for round in 0..5 {
        let mut task = Task::new(move || round);
        pool.push_task(&task).unwrap();
        assert_eq!(task.join(), Ok(round));
        // Give the worker time to park before the next push so the push
        // finds it free instead of spawning another thread.
        std::thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(pool.thread_count(), 1);
    pool.shutdown().map_err(|(_, e)| e).expect("Shutdown failed");
}

#[test]
fn test_affinity_pool_runs_tasks() {
    let pool = ThreadPool::with_affinity(2).unwrap();

    let mut task = Task::new(|| 11);
    pool.push_task(&task).unwrap();
    assert_eq!(task.join(), Ok(11));

    pool.shutdown().map_err(|(_, e)| e).expect("Shutdown failed");
}
