//! Wrapping units of async work in a tracked process

use std::fmt::Display;
use std::future::Future;

use serde::Serialize;

use super::{Parents, Tracker};
use crate::resolver::in_process;
use crate::value::{ProcessValue, ValueMap};

/// Id used when none is given and the work item has no usable name
pub const ANONYMOUS_PROCESS: &str = "anonymous";

/// Options for [`Tracker::track_with`]
#[derive(Debug, Clone, Default)]
pub struct TrackOptions {
    /// Process id; derived from the work item's name when absent
    pub id: Option<String>,
    /// Values recorded as the process arguments, see [`flatten_params`]
    pub params: Vec<ProcessValue>,
    /// Explicit parents; inferred when absent
    pub parents: Option<Parents>,
}

impl TrackOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn param(mut self, value: impl Into<ProcessValue>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn params(mut self, values: Vec<ProcessValue>) -> Self {
        self.params = values;
        self
    }

    pub fn parents(mut self, parents: impl Into<Parents>) -> Self {
        self.parents = Some(parents.into());
        self
    }
}

/// Merge call parameters into one argument map.
///
/// Map entries contribute their keys directly; any other value at position
/// `i` is stored under `param{i+1}`. Later keys overwrite earlier ones.
pub fn flatten_params(params: &[ProcessValue]) -> ProcessValue {
    let mut bag = ValueMap::new();
    for (index, param) in params.iter().enumerate() {
        match param {
            ProcessValue::Map(entries) => {
                bag.extend(entries.iter().map(|(key, value)| (key.clone(), value.clone())));
            }
            other => {
                bag.insert(format!("param{}", index + 1), other.clone());
            }
        }
    }
    ProcessValue::Map(bag)
}

/// Process id for a work item of type `F`: the last path segment of a named
/// function, or `"anonymous"` for closures
pub fn derive_name<F>() -> String {
    name_from_type(std::any::type_name::<F>())
}

fn name_from_type(type_name: &str) -> String {
    if type_name.contains("{{closure}}") {
        return ANONYMOUS_PROCESS.to_string();
    }
    let path = type_name.split('<').next().unwrap_or_default();
    match path.rsplit("::").next() {
        Some(segment) if !segment.is_empty() => segment.to_string(),
        _ => ANONYMOUS_PROCESS.to_string(),
    }
}

impl Tracker {
    /// Run `work` as a tracked process named after the work item
    pub async fn track<F, Fut, T, E>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize,
        E: Display,
    {
        self.track_with(work, TrackOptions::default()).await
    }

    /// Run `work` between `start` and `end`.
    ///
    /// The new process is the ambient current process while `work` runs, so
    /// processes started inside it can find their parent. On success the
    /// serialized value is recorded as output; on failure `{"error": msg}` is
    /// recorded. The work's own result is always returned unchanged, even
    /// when tracking itself fails.
    #[inline(never)]
    pub async fn track_with<F, Fut, T, E>(&self, work: F, options: TrackOptions) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize,
        E: Display,
    {
        let TrackOptions { id, params, parents } = options;
        let requested = id.unwrap_or_else(derive_name::<F>);

        let started = match self.start(&requested, flatten_params(&params), parents) {
            Ok(started) => started,
            Err(e) => {
                tracing::error!(process_id = %requested, error = %e, "Failed to start tracked process");
                None
            }
        };

        // Without a started record the caller's own scope stays current
        let result = match &started {
            Some(id) => in_process(id.clone(), work()).await,
            None => work().await,
        };

        if let Some(id) = started {
            let output = match &result {
                Ok(value) => ProcessValue::from_serialize(value).unwrap_or_else(|e| {
                    tracing::warn!(process_id = %id, error = %e, "Tracked output is not serializable");
                    ProcessValue::Null
                }),
                Err(e) => ProcessValue::error(e.to_string()),
            };
            if let Err(e) = self.end(&id, output) {
                tracing::error!(process_id = %id, error = %e, "Failed to end tracked process");
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::ProcessStatus;
    use crate::resolver::current_process;
    use crate::tracker::tests::tracker;
    use serde_json::json;

    async fn fetch_weather() -> Result<String, String> {
        Ok("sunny".to_string())
    }

    #[test]
    fn test_flatten_params_positional() {
        let bag = flatten_params(&[
            ProcessValue::from("value1"),
            ProcessValue::from(123),
            ProcessValue::from(true),
        ]);
        assert_eq!(
            serde_json::Value::from(bag),
            json!({"param1": "value1", "param2": 123, "param3": true})
        );
    }

    #[test]
    fn test_flatten_params_mixed() {
        let bag = flatten_params(&[
            ProcessValue::from(json!({"param1": "value1"})),
            ProcessValue::from(json!({"param2": "value2"})),
            ProcessValue::from("plain value"),
        ]);
        assert_eq!(
            serde_json::Value::from(bag),
            json!({"param1": "value1", "param2": "value2", "param3": "plain value"})
        );
        assert_eq!(flatten_params(&[]), ProcessValue::object());
    }

    #[test]
    fn test_name_from_type() {
        assert_eq!(name_from_type("app::weather::fetch_weather"), "fetch_weather");
        assert_eq!(name_from_type("app::main::{{closure}}"), "anonymous");
        assert_eq!(name_from_type("app::load<u32>"), "load");
        assert_eq!(name_from_type(""), "anonymous");
    }

    #[tokio::test]
    async fn test_track_named_function() {
        let (tracker, _) = tracker();
        let result = tracker.track(fetch_weather).await;

        assert_eq!(result.unwrap(), "sunny");
        let record = tracker.record("fetch_weather").unwrap();
        assert!(record.completed);
        assert_eq!(record.output, Some(ProcessValue::from("sunny")));
    }

    #[tokio::test]
    async fn test_track_closure_uses_placeholder() {
        let (tracker, _) = tracker();
        let result: Result<u32, String> = tracker.track(|| async { Ok(7) }).await;

        assert_eq!(result.unwrap(), 7);
        assert!(tracker.record("anonymous").unwrap().completed);
    }

    #[tokio::test]
    async fn test_track_with_options() {
        let (tracker, _) = tracker();
        let options = TrackOptions::new()
            .id("geocode")
            .param(json!({"city": "Paris"}))
            .param("metric")
            .parents("agent");

        let result: Result<f64, String> = tracker.track_with(|| async { Ok(48.85) }, options).await;
        assert_eq!(result.unwrap(), 48.85);

        let record = tracker.record("geocode").unwrap();
        assert_eq!(
            serde_json::Value::from(record.args),
            json!({"city": "Paris", "param2": "metric"})
        );
        assert_eq!(record.parent_ids, vec!["agent"]);
    }

    #[tokio::test]
    async fn test_track_failure_records_error_and_returns_it() {
        let (tracker, transport) = tracker();
        let result: Result<(), String> = tracker
            .track_with(
                || async { Err("Test error".to_string()) },
                TrackOptions::new().id("failing"),
            )
            .await;

        assert_eq!(result.unwrap_err(), "Test error");
        let record = tracker.record("failing").unwrap();
        assert_eq!(record.output, Some(ProcessValue::error("Test error")));

        tracker.queue().wait_until_settled().await;
        let events = transport.events();
        assert_eq!(events.last().unwrap().status, ProcessStatus::Completed);
        assert_eq!(events.last().unwrap().output.get("error").and_then(|v| v.as_str()), Some("Test error"));
    }

    #[tokio::test]
    async fn test_track_error_returned_even_when_not_suppressed() {
        let (tracker, _) = tracker();
        tracker.set_suppress_errors(false);
        let result: Result<(), &str> = tracker
            .track_with(|| async { Err("boom") }, TrackOptions::new().id("x"))
            .await;
        assert_eq!(result.unwrap_err(), "boom");
    }

    #[tokio::test]
    async fn test_track_scopes_current_process() {
        let (tracker, _) = tracker();
        let seen: Result<Option<String>, String> = tracker
            .track_with(|| async { Ok(current_process()) }, TrackOptions::new().id("outer"))
            .await;
        assert_eq!(seen.unwrap().as_deref(), Some("outer"));
        assert!(current_process().is_none());
    }

    #[tokio::test]
    async fn test_failed_start_keeps_enclosing_scope() {
        let (tracker, _) = tracker();
        let tracker = &tracker;

        let seen: Result<Option<String>, String> = tracker
            .track_with(
                || async move {
                    tracker
                        .track_with(|| async { Ok(current_process()) }, TrackOptions::new().id(""))
                        .await
                },
                TrackOptions::new().id("outer"),
            )
            .await;

        assert_eq!(seen.unwrap().as_deref(), Some("outer"));
        assert!(tracker.record("").is_none());

        let top_level: Result<Option<String>, String> = tracker
            .track_with(|| async { Ok(current_process()) }, TrackOptions::new().id(""))
            .await;
        assert!(top_level.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_nested_track_links_parent() {
        let (tracker, _) = tracker();
        let tracker = &tracker;

        let result: Result<String, String> = tracker
            .track_with(
                || async move {
                    let inner: Result<String, String> = tracker
                        .track_with(|| async { Ok("inner".to_string()) }, TrackOptions::new().id("inner"))
                        .await;
                    inner.map(|inner| format!("outer, {}", inner))
                },
                TrackOptions::new().id("outer"),
            )
            .await;

        assert_eq!(result.unwrap(), "outer, inner");
        let inner = tracker.record("inner").unwrap();
        assert_eq!(inner.parent_ids, vec!["outer"]);
        assert!(inner.auto_parent);
        assert!(tracker.record("outer").unwrap().completed);
    }

    #[tokio::test]
    async fn test_track_when_disabled_still_runs_work() {
        let (tracker, _) = tracker();
        tracker.set_enabled(false);
        let result: Result<u8, String> = tracker.track(|| async { Ok(1) }).await;
        assert_eq!(result.unwrap(), 1);
        assert!(tracker.records().is_empty());
    }
}
