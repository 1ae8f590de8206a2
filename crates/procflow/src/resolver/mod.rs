//! Implicit parent inference
//!
//! When `start` is called without explicit parents, the tracker asks a
//! [`ParentResolver`] for the most specific open process that encloses the
//! current call. Two strategies share the same contract:
//!
//! - [`StackTraceResolver`] - captures the call stack and treats an open
//!   process whose own creation stack is an ancestor of the current stack as
//!   the parent.
//! - [`ContextResolver`] - captures nothing; the parent is the ambient
//!   "current process" that `track` scopes around its unit of work.

pub mod context;
pub mod stack;

pub use context::{current_process, in_process, ContextResolver};
pub use stack::StackTraceResolver;

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::TrackerError;
use crate::model::{created_via_api, normalized_path, ProcessRecord, StackFrame};
use crate::registry::Registry;

/// What the resolver may look at when inferring a parent
pub struct ResolveScope<'a> {
    pub registry: &'a Registry,
    /// The tracker's active flow; only its open records are candidates
    pub flow_id: &'a str,
}

/// Capability interface for implicit parent inference
pub trait ParentResolver: Send + Sync {
    /// Capture the trace stored on a new record, outermost frame first
    fn capture_trace(&self) -> Vec<StackFrame>;

    /// Pick the implicit parent for a process created with `trace`
    fn infer_parent(&self, trace: &[StackFrame], scope: &ResolveScope<'_>) -> Option<String>;

    /// Strategy name, for logging
    fn name(&self) -> &'static str;
}

/// Parent inference strategy selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentStrategy {
    /// Call-stack heuristic
    #[default]
    StackTrace,
    /// Ambient current-process propagation
    Context,
}

impl ParentStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParentStrategy::StackTrace => "stack_trace",
            ParentStrategy::Context => "context",
        }
    }

    /// Instantiate the resolver for this strategy
    pub fn build(self) -> Arc<dyn ParentResolver> {
        match self {
            ParentStrategy::StackTrace => Arc::new(StackTraceResolver::new()),
            ParentStrategy::Context => Arc::new(ContextResolver),
        }
    }
}

impl std::fmt::Display for ParentStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParentStrategy {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "stack_trace" | "stack" => Ok(ParentStrategy::StackTrace),
            "context" => Ok(ParentStrategy::Context),
            other => Err(TrackerError::config(format!(
                "unknown parent strategy '{}'",
                other
            ))),
        }
    }
}

/// Select the deepest enclosing process for `trace`.
///
/// A candidate qualifies when its trace was captured by a tracking API call
/// and its normalized path is a proper prefix of the current path. The
/// longest prefix wins; equal lengths go to the later candidate.
pub fn deepest_enclosing<'a>(
    trace: &[StackFrame],
    candidates: &'a [ProcessRecord],
) -> Option<&'a ProcessRecord> {
    let current = normalized_path(trace);
    let mut best: Option<(usize, &ProcessRecord)> = None;

    for candidate in candidates {
        if !created_via_api(&candidate.stack_trace) {
            continue;
        }
        let path = normalized_path(&candidate.stack_trace);
        if path.len() >= current.len() || !current.starts_with(&path) {
            continue;
        }
        match best {
            Some((depth, _)) if depth > path.len() => {}
            _ => best = Some((path.len(), candidate)),
        }
    }

    best.map(|(_, record)| record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Flow;
    use crate::value::ProcessValue;

    const START: &str = "procflow::tracker::Tracker::start";

    fn trace(functions: &[&str]) -> Vec<StackFrame> {
        functions
            .iter()
            .map(|f| StackFrame::new("src/app.rs", *f, 1))
            .collect()
    }

    fn open(id: &str, functions: &[&str]) -> ProcessRecord {
        ProcessRecord::new(id, &Flow::with_id("f", None), ProcessValue::Null)
            .with_stack_trace(trace(functions))
    }

    #[test]
    fn test_picks_longest_prefix() {
        let candidates = vec![
            open("root", &["main", START]),
            open("mid", &["main", "outer", START]),
            open("sibling", &["main", "other", START]),
        ];
        let current = trace(&["main", "outer", "helper", "inner", START]);

        let parent = deepest_enclosing(&current, &candidates).unwrap();
        assert_eq!(parent.id, "mid");
    }

    #[test]
    fn test_identical_path_is_not_a_parent() {
        let candidates = vec![open("first", &["main", "outer", START])];
        let current = trace(&["main", "outer", START]);
        assert!(deepest_enclosing(&current, &candidates).is_none());
    }

    #[test]
    fn test_requires_api_created_candidate() {
        let candidates = vec![open("odd", &["main", "not_tracking"])];
        let current = trace(&["main", "not_tracking", "deeper", START]);
        assert!(deepest_enclosing(&current, &candidates).is_none());
    }

    #[test]
    fn test_prefix_is_segmentwise() {
        // "main:out" must not match "main:outer"
        let candidates = vec![open("short", &["main", "out", START])];
        let current = trace(&["main", "outer", "x", START]);
        assert!(deepest_enclosing(&current, &candidates).is_none());
    }

    #[test]
    fn test_tie_goes_to_latest() {
        let candidates = vec![
            open("older", &["main", "outer", START]),
            open("newer", &["main", "outer", START]),
        ];
        let current = trace(&["main", "outer", "inner", START]);
        assert_eq!(deepest_enclosing(&current, &candidates).unwrap().id, "newer");
    }

    #[test]
    fn test_no_candidates() {
        assert!(deepest_enclosing(&trace(&["main", START]), &[]).is_none());
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("stack_trace".parse::<ParentStrategy>().unwrap(), ParentStrategy::StackTrace);
        assert_eq!("stack-trace".parse::<ParentStrategy>().unwrap(), ParentStrategy::StackTrace);
        assert_eq!("Context".parse::<ParentStrategy>().unwrap(), ParentStrategy::Context);
        assert!("heuristic".parse::<ParentStrategy>().is_err());
        assert_eq!(ParentStrategy::default().build().name(), "stack_trace");
        assert_eq!(ParentStrategy::Context.build().name(), "context");
    }
}
