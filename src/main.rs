use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use taskpool::{Task, ThreadPool};

fn main() {
    env_logger::init();

    println!("taskpool - Futex-Joined Worker-Thread Pool\n");

    let pool = ThreadPool::with_default_threads();

    // Example 1: push one task and join its result
    println!("Example 1: Push and join");
    let mut task = Task::new(|| 21 * 2);
    pool.push_task(&task).unwrap();
    println!("  Result: {}\n", task.join().unwrap());

    // Example 2: many tasks, joined in submission order
    println!("Example 2: Parallel computation");
    let num_tasks = 1000;
    let start = Instant::now();

    let mut tasks: Vec<Task<usize>> = (0..num_tasks)
        .map(|i| {
            Task::new(move || {
                let mut local = 0;
                for j in 0..1000 {
                    local += j;
                }
                local + i
            })
        })
        .collect();
    for task in &tasks {
        pool.push_task(task).unwrap();
    }

    let total: usize = tasks.iter_mut().map(|t| t.join().unwrap()).sum();
    println!(
        "  Executed {} tasks in {:?} across {} workers",
        num_tasks,
        start.elapsed(),
        pool.thread_count()
    );
    println!("  Sum of results: {}\n", total);

    // Example 3: fire-and-forget via detach
    println!("Example 3: Detached task");
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = hits.clone();
    let task = Task::new(move || {
        std::thread::sleep(Duration::from_millis(10));
        hits_clone.fetch_add(1, Ordering::SeqCst);
    });
    pool.push_task(&task).unwrap();
    task.detach().map_err(|(_, e)| e).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    println!("  Detached task ran: {}\n", hits.load(Ordering::SeqCst) == 1);

    #[cfg(feature = "metrics")]
    {
        let snapshot = pool.metrics();
        println!("Pool metrics:");
        println!("{}", serde_json::to_string_pretty(&snapshot).unwrap());
        println!("  ({:.0} tasks/s)\n", snapshot.tasks_per_second());
    }

    match pool.shutdown() {
        Ok(()) => println!("Pool shut down cleanly"),
        Err((_, e)) => println!("Shutdown failed: {e}"),
    }
}
