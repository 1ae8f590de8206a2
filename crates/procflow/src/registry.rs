//! Process registry
//!
//! Table of every record a tracker has created, in creation order, plus the
//! set of ids whose `start` ran to completion locally. The registry only
//! grows: records are completed in place but never removed.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use crate::error::{Result, TrackerError};
use crate::model::{CompletedRecord, ProcessRecord};
use crate::value::ProcessValue;

#[derive(Debug, Default)]
struct RegistryState {
    records: Vec<ProcessRecord>,
    index: HashMap<String, usize>,
    registered: HashSet<String>,
}

/// Thread-safe table of process records
#[derive(Debug, Default)]
pub struct Registry {
    state: Mutex<RegistryState>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // A poisoned table is still structurally valid; keep serving it.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether a record with this exact id exists
    pub fn contains(&self, id: &str) -> bool {
        self.lock().index.contains_key(id)
    }

    /// Insert a new record under a collision-free id.
    ///
    /// The record's id is rewritten when it is already taken; the id actually
    /// used is returned.
    pub fn insert(&self, mut record: ProcessRecord) -> String {
        let mut state = self.lock();
        let id = unique_id_in(&state.index, &record.id);
        record.id = id.clone();
        let position = state.records.len();
        state.records.push(record);
        state.index.insert(id.clone(), position);
        id
    }

    /// Mark an id as eligible for `end`
    pub fn register_for_completion(&self, id: &str) {
        self.lock().registered.insert(id.to_string());
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.lock().registered.contains(id)
    }

    /// Snapshot of one record
    pub fn get(&self, id: &str) -> Option<ProcessRecord> {
        let state = self.lock();
        state
            .index
            .get(id)
            .and_then(|&position| state.records.get(position))
            .cloned()
    }

    /// Complete a record in place and return its completed form
    pub fn complete(&self, id: &str, output: ProcessValue) -> Result<CompletedRecord> {
        let mut state = self.lock();
        let position = *state
            .index
            .get(id)
            .ok_or_else(|| TrackerError::ProcessNotFound(id.to_string()))?;
        let record = state
            .records
            .get_mut(position)
            .ok_or_else(|| TrackerError::internal(format!("registry index out of sync for {}", id)))?;
        let completed = record
            .complete(output)
            .ok_or_else(|| TrackerError::internal(format!("process {} already completed", id)))?;
        *record = completed.record().clone();
        Ok(completed)
    }

    /// Open records of `flow_id`, in creation order
    pub fn open_in_flow(&self, flow_id: &str) -> Vec<ProcessRecord> {
        self.lock()
            .records
            .iter()
            .filter(|record| record.is_open_in(flow_id))
            .cloned()
            .collect()
    }

    /// Snapshot of every record, in creation order
    pub fn records(&self) -> Vec<ProcessRecord> {
        self.lock().records.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn unique_id_in(index: &HashMap<String, usize>, id: &str) -> String {
    if !index.contains_key(id) {
        return id.to_string();
    }
    let mut suffix: u64 = 1;
    loop {
        let candidate = format!("{}-{}", id, suffix);
        if !index.contains_key(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}
