//! Ingestion service response

use serde::{Deserialize, Serialize};

/// Body returned by the ingestion endpoint
///
/// Anything but `success: true` counts as a failed delivery attempt; a
/// missing flag reads as `false`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    #[serde(default)]
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processes: Option<Vec<serde_json::Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IngestResponse {
    pub fn accepted() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_server_reply() {
        let reply: IngestResponse = serde_json::from_str(
            r#"{"success":true,"message":"Process p stored successfully","processId":"p","flowId":"f"}"#,
        )
        .unwrap();
        assert!(reply.success);
        assert_eq!(reply.message.as_deref(), Some("Process p stored successfully"));
    }

    #[test]
    fn test_missing_flag_is_failure() {
        let reply: IngestResponse = serde_json::from_str(r#"{"error":"id and flowId are required"}"#).unwrap();
        assert!(!reply.success);
        assert!(IngestResponse::accepted().success);
    }
}
