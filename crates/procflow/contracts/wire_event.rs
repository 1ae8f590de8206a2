//! Lifecycle event posted to the ingestion endpoint

use serde::{Deserialize, Serialize};

use super::ProcessStatus;
use crate::model::{CompletedRecord, ProcessRecord, StackFrame};
use crate::value::ProcessValue;

/// One lifecycle transition of a process, as sent over the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEvent {
    pub id: String,
    pub arguments: ProcessValue,
    pub output: ProcessValue,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub status: ProcessStatus,
    pub flow_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_name: Option<String>,
    #[serde(default)]
    pub parent_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_parent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<Vec<StackFrame>>,
}

impl WireEvent {
    /// The `pending` event emitted when a process starts
    pub fn pending(record: &ProcessRecord) -> Self {
        let mut output = ProcessValue::object();
        output.insert("status", ProcessStatus::Pending.as_str());
        Self::from_record(record, output, record.created_at, ProcessStatus::Pending)
    }

    /// The `completed` event emitted when a process ends
    pub fn completed(done: &CompletedRecord) -> Self {
        Self::from_record(
            done.record(),
            done.output().clone(),
            done.completed_at(),
            ProcessStatus::Completed,
        )
    }

    fn from_record(
        record: &ProcessRecord,
        output: ProcessValue,
        timestamp: i64,
        status: ProcessStatus,
    ) -> Self {
        Self {
            id: record.id.clone(),
            arguments: record.args.clone(),
            output,
            timestamp,
            status,
            flow_id: record.flow_id.clone(),
            flow_name: record.flow_name.clone(),
            parent_ids: record.parent_ids.clone(),
            auto_parent: Some(record.auto_parent),
            stack_trace: if record.stack_trace.is_empty() {
                None
            } else {
                Some(record.stack_trace.clone())
            },
        }
    }

    pub fn has_stack_trace(&self) -> bool {
        self.stack_trace.is_some()
    }
}
