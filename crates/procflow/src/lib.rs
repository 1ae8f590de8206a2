//! Process Flow Tracker
//!
//! An instrumentation client that records named processes inside a host
//! application, links them into a causal graph (a "flow") and relays every
//! lifecycle event, in order, to an ingestion service.
//!
//! ## Features
//!
//! - **Lifecycle API**: `start`/`end` pairs and `track` for wrapping async work
//! - **Parent Inference**: call-stack heuristic or ambient task-local context
//! - **Ordered Delivery**: FIFO queue with one item in flight
//! - **Retry Logic**: exponential backoff, then a terminal failed state
//! - **Telemetry**: structured `tracing` logs and Prometheus delivery metrics
//!
//! ## Architecture
//!
//! 1. **Tracker** (`tracker/`): public API composing the pieces below.
//!
//! 2. **Registry** (`registry`): every process record a tracker has created.
//!
//! 3. **Resolver** (`resolver/`): implicit parent inference strategies.
//!
//! 4. **Delivery** (`delivery/`): the retrying queue and its metrics.
//!
//! 5. **Client** (`client/`): transports to the ingestion endpoint.
//!
//! 6. **Contracts** (`contracts/`): wire event and ingestion response shapes.
//!
//! ## Example
//!
//! ```rust,no_run
//! use procflow::{ProcessValue, TrackOptions, Tracker, TrackerConfig};
//!
//! async fn geocode(city: &str) -> Result<(f64, f64), String> {
//!     Ok((48.85, 2.35))
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = TrackerConfig::builder()
//!         .enabled(true)
//!         .ingest_endpoint("http://localhost:27182/api/flow")
//!         .build();
//!     let tracker = Tracker::new(config)?;
//!     tracker.rename_flow("weather");
//!
//!     let agent = tracker
//!         .start("agent", ProcessValue::from("weather in Paris?"), None)?
//!         .unwrap_or_default();
//!
//!     let coords = tracker
//!         .track_with(
//!             || geocode("Paris"),
//!             TrackOptions::new().id("geocode").param("Paris").parents(agent.as_str()),
//!         )
//!         .await
//!         .map_err(anyhow::Error::msg)?;
//!
//!     tracker.end(&agent, ProcessValue::from_serialize(&coords)?)?;
//!     tracker.queue().wait_until_settled().await;
//!     Ok(())
//! }
//! ```

// Core modules
pub mod client;
pub mod config;
pub mod delivery;
pub mod error;
pub mod model;
pub mod registry;
pub mod resolver;
pub mod tracker;
pub mod value;

// Contracts module - located at ../contracts relative to src/
#[path = "../contracts/mod.rs"]
pub mod contracts;

pub use client::{HttpTransport, HttpTransportBuilder, Transport, DEFAULT_INGEST_ENDPOINT};
pub use config::{TrackerConfig, TrackerConfigBuilder, DEFAULT_FLOW_NAME};
pub use contracts::{IngestResponse, ProcessStatus, WireEvent};
pub use delivery::{DeliveryConfig, DeliveryMetrics, DeliveryQueue, QueueItem, QueueStatus};
pub use error::{DeliveryError, Result, TrackerError};
pub use model::{CompletedRecord, Flow, ProcessRecord, StackFrame};
pub use registry::Registry;
pub use resolver::{
    current_process, in_process, ContextResolver, ParentResolver, ParentStrategy,
    ResolveScope, StackTraceResolver,
};
pub use tracker::{Parents, TrackOptions, Tracker};
pub use value::{ProcessValue, ValueMap};

/// Crate version (from Cargo.toml)
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
