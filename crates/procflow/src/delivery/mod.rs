//! Ordered delivery of lifecycle events
//!
//! Events are appended to a FIFO backlog and shipped one at a time by a
//! background task. Each item is retried with exponential backoff; once an
//! item exhausts its retries the queue stops and rejects new items until it
//! is cleared.

pub mod metrics;
pub mod queue;

pub use metrics::DeliveryMetrics;
pub use queue::{backoff_delay, DeliveryQueue};

use serde::{Deserialize, Serialize};

use crate::client::DEFAULT_INGEST_ENDPOINT;
use crate::contracts::WireEvent;

/// One pending delivery
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    /// Process id, for logging
    pub id: String,
    pub payload: WireEvent,
}

impl QueueItem {
    pub fn new(payload: WireEvent) -> Self {
        Self {
            id: payload.id.clone(),
            payload,
        }
    }
}

/// Delivery queue state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    /// Nothing to deliver
    Idle,
    /// Draining the backlog
    Processing,
    /// An item exhausted its retries; cleared only by `clear()`
    Failed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Idle => "idle",
            QueueStatus::Processing => "processing",
            QueueStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery queue settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// Ingestion endpoint URL
    pub endpoint: String,

    /// Retries after the first attempt
    pub max_retries: u32,

    /// Base backoff in milliseconds
    pub retry_delay_ms: u64,

    /// Log retries and permanent failures
    pub log_errors: bool,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_INGEST_ENDPOINT.to_string(),
            max_retries: 3,
            retry_delay_ms: 500,
            log_errors: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Flow, ProcessRecord};
    use crate::value::ProcessValue;

    #[test]
    fn test_item_takes_payload_id() {
        let record = ProcessRecord::new("fetch-1", &Flow::with_id("f", None), ProcessValue::Null);
        let item = QueueItem::new(WireEvent::pending(&record));
        assert_eq!(item.id, "fetch-1");
    }

    #[test]
    fn test_status_display() {
        assert_eq!(QueueStatus::Processing.to_string(), "processing");
        assert_eq!(
            serde_json::to_string(&QueueStatus::Failed).unwrap(),
            "\"failed\""
        );
    }

    #[test]
    fn test_default_config() {
        let config = DeliveryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay_ms, 500);
        assert_eq!(config.endpoint, DEFAULT_INGEST_ENDPOINT);
    }
}
