//! Process tracking API
//!
//! [`Tracker`] is the public surface of the crate. `start` and `end` update
//! the in-memory registry synchronously and hand wire events to the delivery
//! queue without waiting on the network; [`Tracker::track`] wraps a unit of
//! async work between the two.
//!
//! # Example
//!
//! ```rust,no_run
//! use procflow::{ProcessValue, Tracker, TrackerConfig};
//!
//! #[tokio::main]
//! async fn main() -> procflow::Result<()> {
//!     let tracker = Tracker::new(TrackerConfig::builder().enabled(true).build())?;
//!
//!     let id = tracker
//!         .start("load-orders", ProcessValue::from(serde_json::json!({"day": 3})), None)?
//!         .unwrap_or_default();
//!     tracker.end(&id, ProcessValue::from(42))?;
//!
//!     tracker.queue().wait_until_settled().await;
//!     Ok(())
//! }
//! ```

pub mod track;

pub use track::{derive_name, flatten_params, TrackOptions};

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::client::{HttpTransport, Transport};
use crate::config::TrackerConfig;
use crate::contracts::WireEvent;
use crate::delivery::{DeliveryMetrics, DeliveryQueue, QueueItem};
use crate::error::{Result, TrackerError};
use crate::model::{CompletedRecord, Flow, ProcessRecord};
use crate::registry::Registry;
use crate::resolver::{ParentResolver, ResolveScope};
use crate::value::ProcessValue;

/// Explicit parents passed to `start`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parents {
    One(String),
    Many(Vec<String>),
}

impl Parents {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Parents::One(id) => vec![id],
            Parents::Many(ids) => ids,
        }
    }
}

impl From<&str> for Parents {
    fn from(id: &str) -> Self {
        Parents::One(id.to_string())
    }
}

impl From<String> for Parents {
    fn from(id: String) -> Self {
        Parents::One(id)
    }
}

impl From<&String> for Parents {
    fn from(id: &String) -> Self {
        Parents::One(id.clone())
    }
}

impl From<Vec<String>> for Parents {
    fn from(ids: Vec<String>) -> Self {
        Parents::Many(ids)
    }
}

impl From<Vec<&str>> for Parents {
    fn from(ids: Vec<&str>) -> Self {
        Parents::Many(ids.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Parents {
    fn from(ids: [&str; N]) -> Self {
        Parents::Many(ids.iter().map(|id| id.to_string()).collect())
    }
}

/// Records processes, links them into flows and relays lifecycle events
pub struct Tracker {
    config: RwLock<TrackerConfig>,
    flow: Mutex<Option<Flow>>,
    registry: Registry,
    resolver: Arc<dyn ParentResolver>,
    queue: RwLock<Arc<DeliveryQueue>>,
    metrics: DeliveryMetrics,
}

impl Tracker {
    /// Create a tracker delivering over HTTP to `config.ingest_endpoint`.
    ///
    /// Must be called inside a Tokio runtime; the delivery task is spawned
    /// here.
    pub fn new(config: TrackerConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config.ingest_endpoint.clone()));
        Self::with_transport(config, transport)
    }

    /// Create a tracker delivering through a custom transport
    pub fn with_transport(config: TrackerConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let metrics = DeliveryMetrics::new()
            .map_err(|e| TrackerError::internal(format!("Failed to create delivery metrics: {}", e)))?;
        let queue = DeliveryQueue::with_transport(config.delivery_config(), transport, metrics.clone());
        let resolver = config.parent_strategy.build();

        tracing::debug!(
            enabled = config.enabled,
            endpoint = %config.ingest_endpoint,
            strategy = resolver.name(),
            "Tracker created"
        );

        Ok(Self {
            config: RwLock::new(config),
            flow: Mutex::new(None),
            registry: Registry::new(),
            resolver,
            queue: RwLock::new(Arc::new(queue)),
            metrics,
        })
    }

    /// Replace the parent resolver chosen by the configuration
    pub fn with_resolver(mut self, resolver: Arc<dyn ParentResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Register the start of a process.
    ///
    /// Returns the id actually used, which differs from `id` when `id` was
    /// already taken. When tracking is disabled `id` is returned untouched and
    /// nothing is recorded.
    #[inline(never)]
    pub fn start(
        &self,
        id: &str,
        args: ProcessValue,
        parents: Option<Parents>,
    ) -> Result<Option<String>> {
        if !self.is_enabled() {
            tracing::warn!(process_id = id, "Tracking is disabled; start ignored");
            return Ok(Some(id.to_string()));
        }

        let outcome = self.start_process(id, args, parents);
        self.settle(outcome)
    }

    fn start_process(&self, id: &str, args: ProcessValue, parents: Option<Parents>) -> Result<String> {
        if id.is_empty() {
            return Err(TrackerError::invalid_input("process id must not be empty"));
        }

        let flow = self.ensure_flow();
        let trace = self.resolver.capture_trace();

        let (parent_ids, auto_parent) = match parents {
            Some(parents) => (parents.into_vec(), false),
            None => {
                let scope = ResolveScope {
                    registry: &self.registry,
                    flow_id: &flow.flow_id,
                };
                match self.resolver.infer_parent(&trace, &scope) {
                    Some(parent) => (vec![parent], true),
                    None => (Vec::new(), false),
                }
            }
        };

        let mut record = ProcessRecord::new(id, &flow, args)
            .with_parents(parent_ids, auto_parent)
            .with_stack_trace(trace);
        let resolved = self.registry.insert(record.clone());
        if resolved != id {
            tracing::debug!(requested = id, process_id = %resolved, "Process id taken; using next free id");
        }
        record.id = resolved.clone();

        self.queue().enqueue(QueueItem::new(WireEvent::pending(&record)));
        self.registry.register_for_completion(&resolved);

        tracing::debug!(
            process_id = %resolved,
            flow_id = %flow.flow_id,
            parents = ?record.parent_ids,
            auto_parent,
            "Process started"
        );
        Ok(resolved)
    }

    /// Register the completion of a process started by [`Tracker::start`]
    pub fn end(&self, id: &str, output: ProcessValue) -> Result<Option<CompletedRecord>> {
        if !self.is_enabled() {
            tracing::warn!(process_id = id, "Tracking is disabled; end ignored");
            return Ok(None);
        }
        if id.is_empty() {
            tracing::warn!("end called without a process id");
            return Ok(None);
        }
        if !self.registry.is_registered(id) {
            tracing::warn!(process_id = id, "No started process with this id; call start first");
            return Ok(None);
        }

        let outcome = self.registry.complete(id, output).map(|done| {
            self.queue().enqueue(QueueItem::new(WireEvent::completed(&done)));
            tracing::debug!(process_id = id, "Process completed");
            done
        });
        self.settle(outcome)
    }

    fn settle<T>(&self, outcome: Result<T>) -> Result<Option<T>> {
        match outcome {
            Ok(value) => Ok(Some(value)),
            Err(e) => self.handle_error(e).map(|()| None),
        }
    }

    /// Central handler for internal failures
    fn handle_error(&self, error: TrackerError) -> Result<()> {
        let (log_errors, suppress_errors) = {
            let config = self.read_config();
            (config.log_errors, config.suppress_errors)
        };
        if log_errors {
            tracing::error!(error = %error, "Process tracking error");
        }
        if suppress_errors {
            Ok(())
        } else {
            Err(error)
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.write_config().enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.read_config().enabled
    }

    pub fn set_suppress_errors(&self, suppress: bool) {
        self.write_config().suppress_errors = suppress;
    }

    pub fn set_log_errors(&self, log: bool) {
        self.write_config().log_errors = log;
    }

    /// Snapshot of the current settings
    pub fn config(&self) -> TrackerConfig {
        self.read_config().clone()
    }

    /// Name the active flow, creating it when none is active
    pub fn rename_flow(&self, name: &str) -> String {
        let mut flow = self.lock_flow();
        match flow.as_mut() {
            Some(active) => {
                active.flow_name = Some(name.to_string());
                active.flow_id.clone()
            }
            None => {
                let created = Flow::generate(Some(name.to_string()));
                let flow_id = created.flow_id.clone();
                *flow = Some(created);
                flow_id
            }
        }
    }

    /// Make `flow_id` the id of the active flow, keeping its name
    pub fn set_flow_id(&self, flow_id: &str) -> String {
        let mut flow = self.lock_flow();
        match flow.as_mut() {
            Some(active) => active.flow_id = flow_id.to_string(),
            None => *flow = Some(Flow::with_id(flow_id, Some(self.default_flow_name()))),
        }
        flow_id.to_string()
    }

    /// Begin a fresh flow; later processes are grouped under it
    pub fn new_flow(&self, name: Option<&str>) -> String {
        let name = name.map(str::to_string).unwrap_or_else(|| self.default_flow_name());
        let created = Flow::generate(Some(name));
        let flow_id = created.flow_id.clone();
        *self.lock_flow() = Some(created);
        flow_id
    }

    pub fn active_flow_id(&self) -> Option<String> {
        self.lock_flow().as_ref().map(|flow| flow.flow_id.clone())
    }

    pub fn active_flow(&self) -> Option<Flow> {
        self.lock_flow().clone()
    }

    fn ensure_flow(&self) -> Flow {
        let default_name = self.default_flow_name();
        let mut flow = self.lock_flow();
        flow.get_or_insert_with(|| {
            let created = Flow::generate(Some(default_name));
            tracing::debug!(flow_id = %created.flow_id, "Created flow");
            created
        })
        .clone()
    }

    fn default_flow_name(&self) -> String {
        self.read_config().default_flow_name.clone()
    }

    /// Deliver to a new endpoint; the current backlog is discarded
    pub fn set_ingest_endpoint(&self, endpoint: &str) {
        let delivery = {
            let mut config = self.write_config();
            config.ingest_endpoint = endpoint.to_string();
            config.delivery_config()
        };
        let queue = DeliveryQueue::new(delivery, self.metrics.clone());
        let previous = std::mem::replace(&mut *self.write_queue(), Arc::new(queue));
        if !previous.is_empty() {
            tracing::warn!(
                dropped = previous.len(),
                endpoint,
                "Ingestion endpoint changed; discarding undelivered events"
            );
        }
    }

    /// Snapshot of one record
    pub fn record(&self, id: &str) -> Option<ProcessRecord> {
        self.registry.get(id)
    }

    /// Snapshot of every record, in creation order
    pub fn records(&self) -> Vec<ProcessRecord> {
        self.registry.records()
    }

    /// The delivery queue currently in use
    pub fn queue(&self) -> Arc<DeliveryQueue> {
        let queue = self.queue.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&*queue)
    }

    pub fn metrics(&self) -> &DeliveryMetrics {
        &self.metrics
    }

    pub fn resolver_name(&self) -> &'static str {
        self.resolver.name()
    }

    fn read_config(&self) -> std::sync::RwLockReadGuard<'_, TrackerConfig> {
        self.config.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_config(&self) -> std::sync::RwLockWriteGuard<'_, TrackerConfig> {
        self.config.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_queue(&self) -> std::sync::RwLockWriteGuard<'_, Arc<DeliveryQueue>> {
        self.queue.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_flow(&self) -> MutexGuard<'_, Option<Flow>> {
        self.flow.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
