//! FIFO delivery queue drained by a background task
//!
//! The queue owns a backlog guarded by a mutex, a wake signal for the drain
//! task and a watch channel publishing its status. Exactly one drain task
//! exists per queue; it is spawned at construction, so a queue must be
//! created inside a Tokio runtime.
//!
//! State machine:
//!
//! ```text
//! Idle --enqueue--> Processing --backlog empty--> Idle
//!                   Processing --retries exhausted--> Failed
//! Failed --clear--> Idle
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use super::{DeliveryConfig, DeliveryMetrics, QueueItem, QueueStatus};
use crate::client::{HttpTransport, Transport};
use crate::error::DeliveryError;

/// Backoff before retry number `attempt` (1-based): `retry_delay × 2^(attempt-1)`
pub fn backoff_delay(retry_delay_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64
        .checked_shl(attempt.saturating_sub(1))
        .unwrap_or(u64::MAX);
    Duration::from_millis(retry_delay_ms.saturating_mul(factor))
}

struct QueueState {
    items: VecDeque<QueueItem>,
    status: QueueStatus,
    /// Bumped by `clear()` so an in-flight outcome from before the clear is discarded
    epoch: u64,
}

struct Shared {
    state: Mutex<QueueState>,
    wake: Notify,
    status_tx: watch::Sender<QueueStatus>,
    transport: Arc<dyn Transport>,
    config: DeliveryConfig,
    metrics: DeliveryMetrics,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_status(&self, state: &mut QueueState, status: QueueStatus) {
        if state.status != status {
            state.status = status;
            self.status_tx.send_replace(status);
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.lock().epoch == epoch
    }

    /// Deliver one item, retrying with backoff.
    ///
    /// Stops retrying once `clear()` moves the queue past `epoch`; the drain
    /// loop then discards whatever this returns.
    async fn deliver_with_retries(&self, item: &QueueItem, epoch: u64) -> Result<(), DeliveryError> {
        let max_attempts = self.config.max_retries.saturating_add(1);
        let mut attempt: u32 = 0;

        loop {
            self.metrics.record_attempt();
            match self.transport.deliver(&item.payload).await {
                Ok(_) => {
                    self.metrics.record_delivered();
                    tracing::debug!(
                        process_id = %item.id,
                        status = %item.payload.status,
                        attempt = attempt + 1,
                        "Delivered queue item"
                    );
                    return Ok(());
                }
                Err(e) => {
                    self.metrics.record_failure();
                    attempt += 1;
                    if attempt >= max_attempts || !self.is_current(epoch) {
                        return Err(e);
                    }

                    let delay = backoff_delay(self.config.retry_delay_ms, attempt);
                    if self.config.log_errors {
                        tracing::warn!(
                            process_id = %item.id,
                            attempt,
                            max_retries = self.config.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Delivery failed, retrying"
                        );
                    }
                    tokio::time::sleep(delay).await;

                    if !self.is_current(epoch) {
                        tracing::debug!(process_id = %item.id, "Abandoning retries of cleared queue item");
                        return Err(e);
                    }
                }
            }
        }
    }
}

/// Drain the backlog head-first until the queue is empty or failed
async fn drain(shared: Arc<Shared>) {
    loop {
        let next = {
            let mut state = shared.lock();
            match state.status {
                QueueStatus::Failed => None,
                _ => match state.items.front().cloned() {
                    Some(item) => {
                        shared.set_status(&mut state, QueueStatus::Processing);
                        Some((item, state.epoch))
                    }
                    None => {
                        shared.set_status(&mut state, QueueStatus::Idle);
                        None
                    }
                },
            }
        };

        let Some((item, epoch)) = next else {
            shared.wake.notified().await;
            continue;
        };

        let outcome = shared.deliver_with_retries(&item, epoch).await;

        let mut state = shared.lock();
        if state.epoch != epoch {
            tracing::debug!(process_id = %item.id, "Discarding outcome of cleared queue item");
            continue;
        }

        match outcome {
            Ok(()) => {
                state.items.pop_front();
                shared.metrics.set_queue_depth(state.items.len());
            }
            Err(e) => {
                shared.set_status(&mut state, QueueStatus::Failed);
                if shared.config.log_errors {
                    tracing::error!(
                        process_id = %item.id,
                        endpoint = %shared.transport.endpoint(),
                        error = %e,
                        remaining = state.items.len(),
                        "Error processing queue item; queue processing stopped"
                    );
                }
            }
        }
    }
}

/// Ordered, single-in-flight, retrying delivery queue
pub struct DeliveryQueue {
    shared: Arc<Shared>,
    worker: JoinHandle<()>,
}

impl DeliveryQueue {
    /// Queue delivering over HTTP to `config.endpoint`
    pub fn new(config: DeliveryConfig, metrics: DeliveryMetrics) -> Self {
        let transport = Arc::new(HttpTransport::new(config.endpoint.clone()));
        Self::with_transport(config, transport, metrics)
    }

    /// Queue delivering through a custom transport
    pub fn with_transport(
        config: DeliveryConfig,
        transport: Arc<dyn Transport>,
        metrics: DeliveryMetrics,
    ) -> Self {
        let (status_tx, _) = watch::channel(QueueStatus::Idle);
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                status: QueueStatus::Idle,
                epoch: 0,
            }),
            wake: Notify::new(),
            status_tx,
            transport,
            config,
            metrics,
        });

        // Spawn background task to drain the backlog
        let worker = tokio::spawn(drain(Arc::clone(&shared)));

        Self { shared, worker }
    }

    /// Append an item; rejected with a warning while the queue is failed
    pub fn enqueue(&self, item: QueueItem) -> bool {
        let mut state = self.shared.lock();
        if state.status == QueueStatus::Failed {
            drop(state);
            self.shared.metrics.record_dropped();
            tracing::warn!(
                process_id = %item.id,
                "Queue has failed permanently; dropping item until cleared"
            );
            return false;
        }

        if !item.payload.has_stack_trace() {
            tracing::debug!(process_id = %item.id, "Queued payload carries no stack trace");
        }

        state.items.push_back(item);
        self.shared.metrics.set_queue_depth(state.items.len());
        self.shared.set_status(&mut state, QueueStatus::Processing);
        drop(state);

        self.shared.wake.notify_one();
        true
    }

    /// Drop the backlog and reset a failed queue to idle
    pub fn clear(&self) {
        let mut state = self.shared.lock();
        let dropped = state.items.len();
        state.items.clear();
        state.epoch = state.epoch.wrapping_add(1);
        self.shared.set_status(&mut state, QueueStatus::Idle);
        self.shared.metrics.set_queue_depth(0);
        drop(state);

        tracing::debug!(dropped, "Delivery queue cleared");
        self.shared.wake.notify_one();
    }

    /// Items not yet confirmed, including the one in flight
    pub fn len(&self) -> usize {
        self.shared.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_failed(&self) -> bool {
        self.status() == QueueStatus::Failed
    }

    pub fn status(&self) -> QueueStatus {
        self.shared.lock().status
    }

    /// Snapshot of the backlog, head first
    pub fn pending(&self) -> Vec<QueueItem> {
        self.shared.lock().items.iter().cloned().collect()
    }

    /// Wait until the queue is idle or failed
    pub async fn wait_until_settled(&self) -> QueueStatus {
        let mut status_rx = self.shared.status_tx.subscribe();
        let settled = match status_rx.wait_for(|status| *status != QueueStatus::Processing).await {
            Ok(status) => *status,
            Err(_) => self.status(),
        };
        settled
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.shared.config
    }

    pub fn endpoint(&self) -> &str {
        self.shared.transport.endpoint()
    }

    pub fn metrics(&self) -> &DeliveryMetrics {
        &self.shared.metrics
    }
}

impl Drop for DeliveryQueue {
    fn drop(&mut self) {
        self.worker.abort();
    }
}
