//! FIFO of jobs waiting for the main thread.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::task::MainThreadJob;
use crate::core::lock_unpoisoned;

/// Multi-producer, single-consumer queue of [`MainThreadJob`]s.
///
/// Workers push from any thread. Only the main thread pops, once per frame,
/// and it never waits: an empty queue simply ends the drain.
#[derive(Default)]
pub struct FinalizeQueue {
    jobs: Mutex<VecDeque<Box<dyn MainThreadJob>>>,
}

impl FinalizeQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        FinalizeQueue::default()
    }

    /// Appends a job. Callable from any thread.
    pub fn push(&self, job: Box<dyn MainThreadJob>) {
        lock_unpoisoned(&self.jobs).push_back(job);
    }

    /// The oldest job, if any. The lock is released before the job is returned.
    pub fn pop(&self) -> Option<Box<dyn MainThreadJob>> {
        lock_unpoisoned(&self.jobs).pop_front()
    }

    /// Jobs waiting.
    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.jobs).len()
    }

    /// Whether no job is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every pending job without running it.
    ///
    /// # Returns
    /// The number of jobs discarded.
    pub fn clear(&self) -> usize {
        let discarded: Vec<_> = lock_unpoisoned(&self.jobs).drain(..).collect();
        discarded.len()
    }
}
