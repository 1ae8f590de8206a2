//! Data model: flows, process records and stack frames

pub mod frame;
pub mod record;

pub use frame::{created_via_api, normalized_path, StackFrame};
pub use record::{now_millis, CompletedRecord, Flow, ProcessRecord};
