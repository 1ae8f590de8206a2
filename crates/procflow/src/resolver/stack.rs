//! Call-stack parent inference
//!
//! Captures the native call stack with the `backtrace` crate. Frames deeper
//! than the innermost tracker entry point (the capture machinery itself) are
//! discarded, as are frames without source location and frames from the
//! standard library, Tokio and other runtime plumbing.

use super::{deepest_enclosing, ParentResolver, ResolveScope};
use crate::model::StackFrame;

/// Symbol prefixes treated as runtime internals
const RUNTIME_PREFIXES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "tokio::",
    "backtrace::",
    "futures::",
    "futures_util::",
    "futures_core::",
    "__rust",
    "rust_begin_unwind",
    "_start",
    "__libc",
];

/// Default cap on kept frames
const DEFAULT_MAX_FRAMES: usize = 64;

/// Resolver using captured call stacks
#[derive(Debug, Clone)]
pub struct StackTraceResolver {
    max_frames: usize,
}

impl StackTraceResolver {
    pub fn new() -> Self {
        Self {
            max_frames: DEFAULT_MAX_FRAMES,
        }
    }

    /// Limit how many frames are kept per trace
    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = max_frames.max(1);
        self
    }

    pub fn max_frames(&self) -> usize {
        self.max_frames
    }
}

impl Default for StackTraceResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ParentResolver for StackTraceResolver {
    fn capture_trace(&self) -> Vec<StackFrame> {
        let mut innermost_first: Vec<StackFrame> = Vec::new();
        let mut reached_entry = false;

        backtrace::trace(|frame| {
            backtrace::resolve_frame(frame, |symbol| {
                let (Some(name), Some(file)) = (symbol.name(), symbol.filename()) else {
                    return;
                };
                let captured = StackFrame::new(
                    file.display().to_string(),
                    format!("{:#}", name),
                    symbol.lineno().unwrap_or(0),
                );
                if !reached_entry {
                    if !captured.is_tracking_entry() {
                        return;
                    }
                    reached_entry = true;
                }
                if !is_runtime_internal(&captured.function) {
                    innermost_first.push(captured);
                }
            });
            innermost_first.len() < self.max_frames
        });

        innermost_first.reverse();
        innermost_first
    }

    fn infer_parent(&self, trace: &[StackFrame], scope: &ResolveScope<'_>) -> Option<String> {
        let candidates = scope.registry.open_in_flow(scope.flow_id);
        let parent = deepest_enclosing(trace, &candidates).map(|record| record.id.clone());
        if let Some(ref id) = parent {
            tracing::debug!(parent_id = %id, depth = trace.len(), "Inferred parent from call stack");
        }
        parent
    }

    fn name(&self) -> &'static str {
        "stack_trace"
    }
}

/// Whether a demangled symbol belongs to the runtime rather than host code
pub fn is_runtime_internal(function: &str) -> bool {
    let name = function.trim_start_matches('<');
    RUNTIME_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Flow, ProcessRecord};
    use crate::registry::Registry;
    use crate::value::ProcessValue;

    #[test]
    fn test_runtime_internal_filter() {
        assert!(is_runtime_internal("std::rt::lang_start::{{closure}}"));
        assert!(is_runtime_internal(
            "<core::pin::Pin<P> as core::future::future::Future>::poll"
        ));
        assert!(is_runtime_internal("tokio::runtime::park::CachedParkThread::block_on"));
        assert!(!is_runtime_internal("my_app::handlers::checkout"));
        assert!(!is_runtime_internal("procflow::tracker::Tracker::start"));
    }

    #[test]
    fn test_capture_outside_tracker_is_empty() {
        // No tracker entry frame on this stack, so nothing is kept.
        let resolver = StackTraceResolver::new();
        assert!(resolver.capture_trace().is_empty());
    }

    #[test]
    fn test_max_frames_floor() {
        assert_eq!(StackTraceResolver::new().with_max_frames(0).max_frames(), 1);
        assert_eq!(StackTraceResolver::default().max_frames(), DEFAULT_MAX_FRAMES);
    }

    #[test]
    fn test_infer_parent_uses_open_records_of_flow() {
        let registry = Registry::new();
        let start = "procflow::tracker::Tracker::start";
        let outer = vec![
            StackFrame::new("src/app.rs", "app::main", 3),
            StackFrame::new("src/app.rs", start, 9),
        ];
        registry.insert(
            ProcessRecord::new("outer", &Flow::with_id("f", None), ProcessValue::Null)
                .with_stack_trace(outer.clone()),
        );
        registry.insert(
            ProcessRecord::new("elsewhere", &Flow::with_id("g", None), ProcessValue::Null)
                .with_stack_trace(outer),
        );

        let current = vec![
            StackFrame::new("src/app.rs", "app::main", 4),
            StackFrame::new("src/app.rs", "app::load", 20),
            StackFrame::new("src/app.rs", start, 9),
        ];
        let resolver = StackTraceResolver::new();
        let scope = ResolveScope {
            registry: &registry,
            flow_id: "f",
        };
        assert_eq!(resolver.infer_parent(&current, &scope).as_deref(), Some("outer"));

        registry.complete("outer", ProcessValue::Null).unwrap();
        assert!(resolver.infer_parent(&current, &scope).is_none());
    }
}
