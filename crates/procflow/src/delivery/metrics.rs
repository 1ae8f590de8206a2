//! Prometheus metrics for event delivery

use prometheus::{Counter, Gauge, Registry};
use std::sync::Arc;

/// Counters and gauges maintained by the delivery queue
#[derive(Clone)]
pub struct DeliveryMetrics {
    registry: Arc<Registry>,

    /// Every transport call, including retries
    attempts_total: Counter,

    /// Events the ingestion service confirmed
    delivered_total: Counter,

    /// Failed attempts
    failures_total: Counter,

    /// Events rejected by a failed queue
    dropped_total: Counter,

    /// Items waiting in the backlog, including the one in flight
    queue_depth: Gauge,
}

impl DeliveryMetrics {
    /// Create the metrics in their own registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Arc::new(Registry::new());

        let attempts_total = Counter::new(
            "procflow_delivery_attempts_total",
            "Total number of delivery attempts made to the ingestion endpoint",
        )?;

        let delivered_total = Counter::new(
            "procflow_events_delivered_total",
            "Total number of events confirmed by the ingestion endpoint",
        )?;

        let failures_total = Counter::new(
            "procflow_delivery_failures_total",
            "Total number of failed delivery attempts",
        )?;

        let dropped_total = Counter::new(
            "procflow_events_dropped_total",
            "Total number of events rejected because the queue had failed",
        )?;

        let queue_depth = Gauge::new(
            "procflow_queue_depth",
            "Current depth of the delivery queue",
        )?;

        registry.register(Box::new(attempts_total.clone()))?;
        registry.register(Box::new(delivered_total.clone()))?;
        registry.register(Box::new(failures_total.clone()))?;
        registry.register(Box::new(dropped_total.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;

        Ok(Self {
            registry,
            attempts_total,
            delivered_total,
            failures_total,
            dropped_total,
            queue_depth,
        })
    }

    pub fn record_attempt(&self) {
        self.attempts_total.inc();
    }

    pub fn record_delivered(&self) {
        self.delivered_total.inc();
    }

    pub fn record_failure(&self) {
        self.failures_total.inc();
    }

    pub fn record_dropped(&self) {
        self.dropped_total.inc();
    }

    pub fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.set(depth as f64);
    }

    pub fn attempts(&self) -> u64 {
        self.attempts_total.get() as u64
    }

    pub fn delivered(&self) -> u64 {
        self.delivered_total.get() as u64
    }

    pub fn failures(&self) -> u64 {
        self.failures_total.get() as u64
    }

    pub fn dropped(&self) -> u64 {
        self.dropped_total.get() as u64
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Gather all metrics
    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// Encode metrics in Prometheus text format
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = DeliveryMetrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_counters() {
        let metrics = DeliveryMetrics::new().unwrap();
        metrics.record_attempt();
        metrics.record_attempt();
        metrics.record_failure();
        metrics.record_delivered();
        metrics.record_dropped();

        assert_eq!(metrics.attempts(), 2);
        assert_eq!(metrics.failures(), 1);
        assert_eq!(metrics.delivered(), 1);
        assert_eq!(metrics.dropped(), 1);
    }

    #[test]
    fn test_encode_text() {
        let metrics = DeliveryMetrics::new().unwrap();
        metrics.record_attempt();
        metrics.set_queue_depth(4);

        let text = metrics.encode_text().unwrap();
        assert!(text.contains("procflow_delivery_attempts_total 1"));
        assert!(text.contains("procflow_queue_depth 4"));
    }

    #[test]
    fn test_separate_registries() {
        let a = DeliveryMetrics::new().unwrap();
        let b = DeliveryMetrics::new().unwrap();
        a.record_delivered();
        assert_eq!(b.delivered(), 0);
        assert_eq!(a.gather().len(), 5);
    }
}
