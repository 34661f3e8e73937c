//! Deduplicating work queue.
//!
//! A key is queued at most once. A key that is added while a worker holds it
//! is marked dirty and handed out again once the worker calls `done`, so the
//! same key is never processed by two workers at once.

use std::collections::{HashSet, VecDeque};

use tokio::sync::{Mutex, Notify};

use crate::record::RecordKey;

#[derive(Default)]
struct QueueState {
    queue: VecDeque<RecordKey>,
    /// Keys waiting to be processed (queued or re-queued after `done`)
    dirty: HashSet<RecordKey>,
    /// Keys currently held by a worker
    processing: HashSet<RecordKey>,
    shutting_down: bool,
}

#[derive(Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a key as needing reconciliation.
    pub async fn add(&self, key: RecordKey) {
        let mut state = self.state.lock().await;
        if state.shutting_down || state.dirty.contains(&key) {
            return;
        }
        state.dirty.insert(key.clone());
        if state.processing.contains(&key) {
            return;
        }
        state.queue.push_back(key);
        drop(state);
        self.notify.notify_one();
    }

    /// Wait for the next key. `None` once the queue is shut down.
    pub async fn get(&self) -> Option<RecordKey> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().await;
                if state.shutting_down {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    let more = !state.queue.is_empty();
                    drop(state);
                    if more {
                        self.notify.notify_one();
                    }
                    return Some(key);
                }
            }

            notified.await;
        }
    }

    /// Release a key obtained from `get`.
    pub async fn done(&self, key: &RecordKey) {
        let mut state = self.state.lock().await;
        state.processing.remove(key);
        if state.dirty.contains(key) && !state.shutting_down {
            state.queue.push_back(key.clone());
            drop(state);
            self.notify.notify_one();
        }
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Stop handing out keys and wake all waiting workers.
    pub async fn shutdown(&self) {
        self.state.lock().await.shutting_down = true;
        self.notify.notify_waiters();
    }
}
