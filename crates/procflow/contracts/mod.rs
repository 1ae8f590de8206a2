//! Ingestion contract definitions
//!
//! The wire shapes exchanged with the ingestion service. Downstream storage
//! and visualization consume [`WireEvent`] as their unit of ingestion, keyed
//! by `id` and grouped by `flowId`.
//!
//! # Design Principles
//!
//! - **One event per transition**: a process produces a `pending` event at
//!   start and a `completed` event at end
//! - **camelCase JSON**: field names match what the ingestion service stores
//! - **Lossless values**: arguments and outputs travel as `ProcessValue`

pub mod ingest;
pub mod wire_event;

use serde::{Deserialize, Serialize};

pub use ingest::IngestResponse;
pub use wire_event::WireEvent;

/// Lifecycle status carried by a wire event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Pending,
    Completed,
    Failed,
}

impl ProcessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Pending => "pending",
            ProcessStatus::Completed => "completed",
            ProcessStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
