//! Normalized call-site frames used for parent inference.

use serde::{Deserialize, Serialize};

/// Type owning the tracking entry points.
pub(crate) const TRACKING_TYPE: &str = "Tracker";

/// Method suffixes of the tracker's public entry points.
///
/// A captured trace ends with one of these frames; the resolver relies on it
/// to recognise records created through the tracking API.
pub(crate) const TRACKING_ENTRY_METHODS: &[&str] = &["::start", "::track", "::track_with"];

/// One call-site in a captured trace
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackFrame {
    pub file: String,
    #[serde(rename = "func")]
    pub function: String,
    pub line: u32,
}

impl StackFrame {
    pub fn new(file: impl Into<String>, function: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            function: function.into(),
            line,
        }
    }

    /// `file:function`, the line-independent identity of this frame
    pub fn path_segment(&self) -> String {
        format!("{}:{}", self.file, self.function)
    }

    /// Whether this frame is one of the tracker's API entry points
    pub fn is_tracking_entry(&self) -> bool {
        let mut name = self.function.as_str();
        // async bodies show up as `method::{{closure}}`
        while let Some(outer) = name.strip_suffix("::{{closure}}") {
            name = outer;
        }
        name.contains(TRACKING_TYPE)
            && TRACKING_ENTRY_METHODS
                .iter()
                .any(|method| name.ends_with(method))
    }
}

/// Normalized path of a trace: every frame but the final call site.
pub fn normalized_path(trace: &[StackFrame]) -> Vec<String> {
    match trace.split_last() {
        Some((_, enclosing)) => enclosing.iter().map(StackFrame::path_segment).collect(),
        None => Vec::new(),
    }
}

/// Whether a trace was captured by a tracking API call.
///
/// The final frame is `start`; when the process came from `track` the
/// entry frame may sit one position earlier.
pub fn created_via_api(trace: &[StackFrame]) -> bool {
    trace
        .iter()
        .rev()
        .take(2)
        .any(StackFrame::is_tracking_entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(function: &str) -> StackFrame {
        StackFrame::new("src/app.rs", function, 10)
    }

    #[test]
    fn test_normalized_path_drops_call_site() {
        let trace = vec![
            frame("app::main"),
            frame("app::outer"),
            frame("procflow::tracker::Tracker::start"),
        ];
        assert_eq!(
            normalized_path(&trace),
            vec!["src/app.rs:app::main", "src/app.rs:app::outer"]
        );
        assert!(normalized_path(&[]).is_empty());
    }

    #[test]
    fn test_path_ignores_line_numbers() {
        let a = StackFrame::new("src/app.rs", "app::outer", 10);
        let b = StackFrame::new("src/app.rs", "app::outer", 99);
        assert_eq!(a.path_segment(), b.path_segment());
    }

    #[test]
    fn test_created_via_api() {
        let direct = vec![frame("app::main"), frame("procflow::tracker::Tracker::start")];
        assert!(created_via_api(&direct));

        let tracked = vec![
            frame("app::main"),
            frame("procflow::tracker::track::<impl procflow::tracker::Tracker>::track_with::{{closure}}"),
            frame("procflow::tracker::Tracker::start"),
        ];
        assert!(created_via_api(&tracked));

        let via_track = vec![
            frame("app::main"),
            frame("procflow::tracker::Tracker::track::{{closure}}"),
            frame("app::helper"),
        ];
        assert!(created_via_api(&via_track));

        let foreign = vec![frame("app::main"), frame("app::restart"), frame("app::inner")];
        assert!(!created_via_api(&foreign));
        assert!(!created_via_api(&[]));
    }

    #[test]
    fn test_wire_field_name() {
        let json = serde_json::to_value(frame("app::main")).unwrap();
        assert_eq!(json["func"], "app::main");
        assert_eq!(json["line"], 10);
    }
}
