//! Controller entrypoint: turns record events into reconciliation passes.
//!
//! - Enqueues every existing record at startup, then each `Applied`/`Deleted`
//!   event. Status writes never re-trigger.
//! - Workers pull keys from a deduplicating queue, so one key has at most one
//!   pass in flight.
//! - Transient failures are retried with exponential backoff; anything else
//!   waits for the next edit.
//! - Deleting a record cancels its in-flight pass and drops pending retries.

pub mod backoff;
pub mod queue;

pub use backoff::Backoff;
pub use queue::WorkQueue;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::reconciler::{Outcome, Reconciler};
use crate::record::RecordKey;
use crate::store::{RecordEvent, RecordStore};

/// Controller settings.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Number of concurrent reconciliation workers
    pub workers: usize,
    pub backoff: Backoff,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            backoff: Backoff::default(),
        }
    }
}

#[derive(Debug, Default)]
struct RetryState {
    failures: u32,
    /// Stamp of the most recently scheduled retry. Unique across keys and
    /// lifetimes, so a retry scheduled before the entry was removed never
    /// matches a newer entry.
    ticket: u64,
}

/// Resolves once the shutdown flag is set. The `watch::Ref` is dropped before
/// returning so callers stay `Send`.
async fn stopped(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

pub struct Controller {
    store: Arc<dyn RecordStore>,
    reconciler: Arc<Reconciler>,
    config: ControllerConfig,
    queue: Arc<WorkQueue>,
    retries: Mutex<HashMap<RecordKey, RetryState>>,
    next_ticket: AtomicU64,
    in_flight: Mutex<HashMap<RecordKey, watch::Sender<bool>>>,
    shutdown: watch::Receiver<bool>,
}

impl Controller {
    pub fn new(
        store: Arc<dyn RecordStore>,
        reconciler: Arc<Reconciler>,
        config: ControllerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            reconciler,
            config,
            queue: Arc::new(WorkQueue::new()),
            retries: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(1),
            in_flight: Mutex::new(HashMap::new()),
            shutdown,
        }
    }

    /// Run until the shutdown signal fires or the store closes its event stream.
    pub async fn run(self: Arc<Self>) {
        // Subscribe before listing so no edit falls between the two.
        let mut events = self.store.subscribe();
        self.enqueue_all().await;

        let workers = self.config.workers.max(1);
        info!("Starting provision controller with {} worker(s)", workers);

        let mut tasks = JoinSet::new();
        for id in 0..workers {
            let controller = Arc::clone(&self);
            tasks.spawn(async move { controller.worker(id).await });
        }

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => self.handle_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Missed {} record events, re-enqueueing all records", missed);
                        self.enqueue_all().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Record event stream closed");
                        break;
                    }
                },
                _ = stopped(self.shutdown.clone()) => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        self.queue.shutdown().await;
        while let Some(res) = tasks.join_next().await {
            if let Err(e) = res {
                error!("Worker task failed: {}", e);
            }
        }
        info!("Provision controller stopped");
    }

    async fn enqueue_all(&self) {
        match self.store.list(None).await {
            Ok(records) => {
                debug!("Enqueueing {} record(s)", records.len());
                for record in records {
                    self.queue.add(record.key).await;
                }
            }
            Err(e) => error!("Failed to list provisions: {}", e),
        }
    }

    async fn handle_event(&self, event: RecordEvent) {
        match event {
            RecordEvent::Applied(record) => {
                debug!(key = %record.key, generation = record.generation, "Provision applied");
                self.forget(&record.key).await;
                self.queue.add(record.key).await;
            }
            RecordEvent::StatusUpdated(_) => {}
            RecordEvent::Deleted(key) => {
                info!(%key, "Provision deleted, abandoning pending work");
                self.forget(&key).await;
                if let Some(cancel) = self.in_flight.lock().await.get(&key) {
                    let _ = cancel.send(true);
                }
            }
        }
    }

    /// Drop failure count and invalidate scheduled retries for `key`.
    async fn forget(&self, key: &RecordKey) {
        self.retries.lock().await.remove(key);
    }

    /// Keys with retry bookkeeping (failed at least once and not yet
    /// succeeded, edited or deleted).
    pub async fn pending_retries(&self) -> usize {
        self.retries.lock().await.len()
    }

    async fn worker(self: Arc<Self>, id: usize) {
        debug!(worker = id, "Worker started");
        while let Some(key) = self.queue.get().await {
            self.process(&key).await;
            self.queue.done(&key).await;
        }
        debug!(worker = id, "Worker stopped");
    }

    async fn process(self: &Arc<Self>, key: &RecordKey) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.in_flight
            .lock()
            .await
            .insert(key.clone(), cancel_tx);

        let mut key_cancel = cancel_rx.clone();
        let key_cancelled = async move {
            // Sender dropped means the pass finished; never fire.
            if key_cancel.wait_for(|c| *c).await.is_err() {
                std::future::pending::<()>().await;
            }
        };
        let shutdown = self.shutdown.clone();
        let cancelled = async move {
            tokio::select! {
                _ = key_cancelled => {}
                _ = stopped(shutdown) => {}
            }
        };

        let result = self.reconciler.reconcile_until(key, cancelled).await;
        self.in_flight.lock().await.remove(key);

        match result {
            Ok(Outcome::RecordGone) => {
                self.retries.lock().await.remove(key);
            }
            Ok(Outcome::Applied {
                phase,
                status_written,
            }) => {
                info!(%key, %phase, status_written, "Reconciled provision");
                self.retries.lock().await.remove(key);
            }
            Err(e) => {
                let abandoned = *cancel_rx.borrow();
                let stopping = *self.shutdown.borrow();
                if abandoned || stopping {
                    info!(%key, "Dropping reconciliation: {}", e);
                } else if e.is_transient() {
                    self.schedule_retry(key).await;
                } else {
                    error!(%key, "Reconciliation failed permanently, waiting for next edit: {}", e);
                    self.retries.lock().await.remove(key);
                }
            }
        }
    }

    async fn schedule_retry(self: &Arc<Self>, key: &RecordKey) {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let delay = {
            let mut retries = self.retries.lock().await;
            let state = retries.entry(key.clone()).or_default();
            state.failures = state.failures.saturating_add(1);
            state.ticket = ticket;
            self.config.backoff.delay(state.failures)
        };

        warn!(%key, "Reconciliation failed, retrying in {:?}", delay);

        let controller = Arc::clone(self);
        let key = key.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stopped(controller.shutdown.clone()) => return,
            }

            let current = controller
                .retries
                .lock()
                .await
                .get(&key)
                .map(|s| s.ticket);
            if current == Some(ticket) {
                controller.queue.add(key).await;
            } else {
                debug!(%key, "Skipping stale retry");
            }
        });
    }
}
