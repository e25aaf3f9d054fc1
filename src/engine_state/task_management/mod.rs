//! # Task Management System
//!
//! This module runs background work on a fixed pool of OS threads and hands
//! results back to the main thread.
//!
//! ## Architecture Overview
//!
//! - `TaskManager`: owns the worker threads and shuts them down
//! - `TaskSubmitter`: cheap, cloneable handle for publishing tasks from any
//!   thread, including from inside a running task
//! - `Task`: a unit of work run on a worker
//! - `FinalizeQueue`: FIFO of `MainThreadJob`s drained by the main thread
//!
//! ## Worker Pool
//!
//! All workers pull from a single FIFO guarded by one mutex. Idle workers
//! block on a condition variable; publishing a task wakes one of them. The
//! main thread never waits on a worker.
//!
//! ## Task Lifecycle
//! 1. A task is published with `TaskSubmitter::publish_task()`
//! 2. The first idle worker pops it and calls `Task::process`
//! 3. The task may publish follow-up tasks or push a finalize job
//! 4. The task is dropped once it returns
//!
//! A task that panics is logged and dropped; its worker keeps running.
//!
//! ## Shutdown
//!
//! `TaskManager::shutdown` raises a flag, wakes every worker and joins them.
//! Workers finish the task they are running but do not start another. Tasks
//! still queued are discarded, and publishing after shutdown is refused.

pub mod finalize_queue;
pub mod task;

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};

use crate::core::{lock_unpoisoned, EngineError};

pub use finalize_queue::FinalizeQueue;
pub use task::{MainThreadJob, Task};

struct TaskQueue {
    tasks: VecDeque<Box<dyn Task>>,
    /// Tasks popped by a worker and still running.
    running: usize,
    shutdown: bool,
}

struct SharedQueue {
    queue: Mutex<TaskQueue>,
    available: Condvar,
}

impl SharedQueue {
    fn new() -> Self {
        SharedQueue {
            queue: Mutex::new(TaskQueue {
                tasks: VecDeque::new(),
                running: 0,
                shutdown: false,
            }),
            available: Condvar::new(),
        }
    }
}

/// Handle for publishing tasks to a [`TaskManager`]'s workers.
#[derive(Clone)]
pub struct TaskSubmitter {
    shared: Arc<SharedQueue>,
}

impl TaskSubmitter {
    /// Queues a task for the next idle worker.
    ///
    /// # Returns
    /// `false` if the pool has been shut down; the task is dropped unrun.
    pub fn publish_task(&self, task: Box<dyn Task>) -> bool {
        let mut queue = lock_unpoisoned(&self.shared.queue);
        if queue.shutdown {
            debug!("Refusing task: worker pool is shut down");
            return false;
        }
        queue.tasks.push_back(task);
        drop(queue);
        self.shared.available.notify_one();
        true
    }

    /// Tasks waiting for a worker.
    pub fn queued_len(&self) -> usize {
        lock_unpoisoned(&self.shared.queue).tasks.len()
    }

    /// Tasks queued or currently running.
    pub fn pending(&self) -> usize {
        let queue = lock_unpoisoned(&self.shared.queue);
        queue.tasks.len() + queue.running
    }

    /// Whether the pool behind this handle has stopped accepting tasks.
    pub fn is_shut_down(&self) -> bool {
        lock_unpoisoned(&self.shared.queue).shutdown
    }

    /// A submitter with no workers behind it. Tasks queue up and never run.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        TaskSubmitter {
            shared: Arc::new(SharedQueue::new()),
        }
    }
}

/// Fixed-size pool of worker threads.
pub struct TaskManager {
    submitter: TaskSubmitter,
    workers: Vec<JoinHandle<()>>,
}

impl TaskManager {
    /// Spawns `num_workers` worker threads.
    ///
    /// # Arguments
    /// * `num_workers` - Number of worker threads, at least 1
    ///
    /// # Errors
    /// `InvalidConfig` for zero workers, `WorkerSpawn` if the OS refuses a
    /// thread. Workers already started are shut down before returning.
    pub fn new(num_workers: usize) -> Result<Self, EngineError> {
        if num_workers == 0 {
            return Err(EngineError::InvalidConfig(
                "worker pool needs at least one thread".to_string(),
            ));
        }

        let mut manager = TaskManager {
            submitter: TaskSubmitter {
                shared: Arc::new(SharedQueue::new()),
            },
            workers: Vec::with_capacity(num_workers),
        };

        info!(
            "Starting {} workers (available parallelism: {:?})",
            num_workers,
            thread::available_parallelism()
        );

        for index in 0..num_workers {
            let submitter = manager.submitter.clone();
            let worker = thread::Builder::new()
                .name(format!("voxel-worker-{}", index))
                .spawn(move || worker_loop(submitter))
                .map_err(|err| {
                    error!("Failed to spawn worker {}: {}", index, err);
                    EngineError::WorkerSpawn(err)
                })?;
            manager.workers.push(worker);
        }

        Ok(manager)
    }

    /// Queues a task. See [`TaskSubmitter::publish_task`].
    pub fn publish_task(&self, task: Box<dyn Task>) -> bool {
        self.submitter.publish_task(task)
    }

    /// A handle for publishing from other threads.
    pub fn submitter(&self) -> &TaskSubmitter {
        &self.submitter
    }

    /// Number of worker threads still attached.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stops the pool and joins every worker.
    ///
    /// Safe to call more than once.
    ///
    /// # Returns
    /// The number of queued tasks that were discarded.
    pub fn shutdown(&mut self) -> usize {
        let discarded: Vec<Box<dyn Task>> = {
            let mut queue = lock_unpoisoned(&self.submitter.shared.queue);
            queue.shutdown = true;
            queue.tasks.drain(..).collect()
        };
        self.submitter.shared.available.notify_all();

        for worker in self.workers.drain(..) {
            let name = worker.thread().name().unwrap_or("worker").to_string();
            if worker.join().is_err() {
                warn!("{} exited by panic", name);
            }
        }

        if !discarded.is_empty() {
            info!("Discarded {} queued tasks at shutdown", discarded.len());
        }
        discarded.len()
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.shutdown();
        }
    }
}

fn worker_loop(submitter: TaskSubmitter) {
    let shared = Arc::clone(&submitter.shared);
    debug!("{:?} started", thread::current().name());

    loop {
        let task = {
            let mut queue = lock_unpoisoned(&shared.queue);
            loop {
                if queue.shutdown {
                    debug!("{:?} stopping", thread::current().name());
                    return;
                }
                if let Some(task) = queue.tasks.pop_front() {
                    queue.running += 1;
                    break task;
                }
                queue = shared
                    .available
                    .wait(queue)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.process(&submitter)));
        if outcome.is_err() {
            error!("Task panicked on {:?}; dropped", thread::current().name());
        }

        lock_unpoisoned(&shared.queue).running -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
        let end = Instant::now() + deadline;
        while Instant::now() < end {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        done()
    }

    #[test]
    fn zero_workers_is_rejected() {
        assert!(matches!(
            TaskManager::new(0),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn every_published_task_runs_once() {
        let manager = TaskManager::new(4).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            assert!(manager.publish_task(Box::new(move |_: &TaskSubmitter| {
                counter.fetch_add(1, Ordering::SeqCst);
            })));
        }
        assert!(wait_until(Duration::from_secs(10), || {
            counter.load(Ordering::SeqCst) == 100
        }));
        assert!(wait_until(Duration::from_secs(10), || {
            manager.submitter().pending() == 0
        }));
    }

    #[test]
    fn tasks_can_chain_follow_up_tasks() {
        let manager = TaskManager::new(2).unwrap();
        let stages = Arc::new(AtomicUsize::new(0));
        let first = Arc::clone(&stages);
        manager.publish_task(Box::new(move |submitter: &TaskSubmitter| {
            first.fetch_add(1, Ordering::SeqCst);
            let second = Arc::clone(&first);
            submitter.publish_task(Box::new(move |_: &TaskSubmitter| {
                second.fetch_add(10, Ordering::SeqCst);
            }));
        }));
        assert!(wait_until(Duration::from_secs(10), || {
            stages.load(Ordering::SeqCst) == 11
        }));
    }

    #[test]
    fn a_panicking_task_does_not_kill_its_worker() {
        let manager = TaskManager::new(1).unwrap();
        manager.publish_task(Box::new(|_: &TaskSubmitter| panic!("boom")));
        let ran = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&ran);
        manager.publish_task(Box::new(move |_: &TaskSubmitter| {
            flag.store(1, Ordering::SeqCst);
        }));
        assert!(wait_until(Duration::from_secs(10), || {
            ran.load(Ordering::SeqCst) == 1
        }));
    }

    #[test]
    fn publishing_after_shutdown_is_refused() {
        let mut manager = TaskManager::new(2).unwrap();
        let submitter = manager.submitter().clone();
        manager.shutdown();
        assert_eq!(manager.worker_count(), 0);
        assert!(submitter.is_shut_down());
        assert!(!submitter.publish_task(Box::new(|_: &TaskSubmitter| {})));
        // A second shutdown is a no-op.
        assert_eq!(manager.shutdown(), 0);
    }
}
