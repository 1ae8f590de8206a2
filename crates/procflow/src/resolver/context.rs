//! Ambient current-process propagation
//!
//! The current process id is a Tokio task-local. `track` scopes it around the
//! unit of work, so any process started inside (including from helpers that
//! never see the tracker) picks it up as parent. Tasks spawned with
//! `tokio::spawn` do not inherit the scope; wrap them in [`in_process`].

use std::future::Future;

use super::{ParentResolver, ResolveScope};
use crate::model::StackFrame;

tokio::task_local! {
    static CURRENT_PROCESS: String;
}

/// The process id scoped around the running task, if any
pub fn current_process() -> Option<String> {
    CURRENT_PROCESS.try_with(|id| id.clone()).ok()
}

/// Run `future` with `process_id` as the ambient current process
pub async fn in_process<F: Future>(process_id: impl Into<String>, future: F) -> F::Output {
    CURRENT_PROCESS.scope(process_id.into(), future).await
}

/// Resolver reading the ambient current process
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextResolver;

impl ParentResolver for ContextResolver {
    fn capture_trace(&self) -> Vec<StackFrame> {
        Vec::new()
    }

    fn infer_parent(&self, _trace: &[StackFrame], scope: &ResolveScope<'_>) -> Option<String> {
        let id = current_process()?;
        scope
            .registry
            .get(&id)
            .filter(|record| record.is_open_in(scope.flow_id))
            .map(|record| record.id)
    }

    fn name(&self) -> &'static str {
        "context"
    }
}
