//! Process records and flows.
//!
//! A record is created by `start`, completed at most once by `end`, and never
//! removed. Completion fills `output`/`completed_at` and leaves the parent
//! links exactly as they were at creation.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::frame::StackFrame;
use crate::value::ProcessValue;

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// The causal graph processes are grouped under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    pub flow_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_name: Option<String>,
}

impl Flow {
    /// A flow with a freshly generated id
    pub fn generate(name: Option<String>) -> Self {
        Self {
            flow_id: Uuid::new_v4().to_string(),
            flow_name: name,
        }
    }

    pub fn with_id(flow_id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            flow_id: flow_id.into(),
            flow_name: name,
        }
    }
}

/// One tracked execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRecord {
    pub id: String,
    pub flow_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_name: Option<String>,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    pub args: ProcessValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<ProcessValue>,
    pub parent_ids: Vec<String>,
    pub stack_trace: Vec<StackFrame>,
    pub completed: bool,
    pub auto_parent: bool,
}

impl ProcessRecord {
    /// Create an open record in `flow`
    pub fn new(id: impl Into<String>, flow: &Flow, args: ProcessValue) -> Self {
        Self {
            id: id.into(),
            flow_id: flow.flow_id.clone(),
            flow_name: flow.flow_name.clone(),
            created_at: now_millis(),
            completed_at: None,
            args,
            output: None,
            parent_ids: Vec::new(),
            stack_trace: Vec::new(),
            completed: false,
            auto_parent: false,
        }
    }

    /// Set parent links, dropping blanks and repeated ids
    pub fn with_parents(mut self, parents: Vec<String>, auto_parent: bool) -> Self {
        let mut parent_ids: Vec<String> = Vec::with_capacity(parents.len());
        for parent in parents {
            if !parent.is_empty() && !parent_ids.contains(&parent) {
                parent_ids.push(parent);
            }
        }
        self.parent_ids = parent_ids;
        self.auto_parent = auto_parent;
        self
    }

    pub fn with_stack_trace(mut self, stack_trace: Vec<StackFrame>) -> Self {
        self.stack_trace = stack_trace;
        self
    }

    /// Produce the completed form of this record.
    ///
    /// Returns `None` when the record was already completed; completion
    /// happens once.
    pub fn complete(&self, output: ProcessValue) -> Option<CompletedRecord> {
        if self.completed {
            return None;
        }
        let completed_at = now_millis();
        let mut record = self.clone();
        record.output = Some(output.clone());
        record.completed_at = Some(completed_at);
        record.completed = true;
        Some(CompletedRecord {
            record,
            output,
            completed_at,
        })
    }

    /// Whether this record belongs to `flow_id` and is still open
    pub fn is_open_in(&self, flow_id: &str) -> bool {
        !self.completed && self.flow_id == flow_id
    }
}

/// A record returned by a successful `end`
///
/// `output` and `completed_at` are always present here.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedRecord {
    record: ProcessRecord,
    output: ProcessValue,
    completed_at: i64,
}

impl CompletedRecord {
    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn output(&self) -> &ProcessValue {
        &self.output
    }

    pub fn completed_at(&self) -> i64 {
        self.completed_at
    }

    pub fn parent_ids(&self) -> &[String] {
        &self.record.parent_ids
    }

    pub fn record(&self) -> &ProcessRecord {
        &self.record
    }

    pub fn into_record(self) -> ProcessRecord {
        self.record
    }
}
