//! Report and artifact shapes produced by the audit engine.
//!
//! These structs serialize with camelCase field names so the persisted JSON
//! uses the conventional report vocabulary (`numericValue`, `errorMessage`,
//! `details.data`, `traces.defaultPass.traceEvents`) that the offline
//! summarizers and external tooling expect.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Audit key carrying the end-of-load screenshot
pub const FINAL_SCREENSHOT: &str = "final-screenshot";

/// One full audit report for a single iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    /// URL the audit was asked to load
    pub requested_url: String,
    /// URL the page ended up on after redirects
    pub final_url: String,
    /// RFC 3339 timestamp taken when the audit began
    pub fetch_time: String,
    /// Category name to aggregate score
    pub categories: BTreeMap<String, Category>,
    /// Audit name to individual measurement
    pub audits: BTreeMap<String, Audit>,
    /// Effective engine options the audit ran with
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub config_settings: serde_json::Map<String, serde_json::Value>,
}

/// Aggregate 0..1 score for a named category
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub title: String,
    /// Score in [0, 1]; absent when no contributing audit produced one
    pub score: Option<f64>,
}

/// A single named measurement inside a report
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<AuditDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Rich payload attached to an audit (currently only screenshots)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditDetails {
    #[serde(rename = "type")]
    pub kind: String,
    /// Data URI payload
    pub data: String,
}

/// Raw artifacts gathered alongside a report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditArtifacts {
    pub fetch_time: String,
    pub requested_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traces: Option<Traces>,
}

/// Trace container keyed by pass name
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Traces {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_pass: Option<TracePass>,
}

/// Trace events recorded during the audited navigation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TracePass {
    pub trace_events: Vec<serde_json::Value>,
}

impl AuditReport {
    /// The final-screenshot audit, if the report carries one
    pub fn screenshot_audit(&self) -> Option<&Audit> {
        self.audits.get(FINAL_SCREENSHOT)
    }
}

impl AuditArtifacts {
    /// Trace events at `traces.defaultPass.traceEvents`, if present
    pub fn trace_events(&self) -> Option<&[serde_json::Value]> {
        self.traces
            .as_ref()
            .and_then(|t| t.default_pass.as_ref())
            .map(|p| p.trace_events.as_slice())
    }
}

/// Encode bytes as a base64 data URI
pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(bytes))
}

/// Decode a data URI back into bytes.
///
/// Accepts base64 payloads; a non-base64 payload is returned verbatim as
/// bytes.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let rest = uri.strip_prefix("data:").context("not a data URI")?;
    let (meta, payload) = rest.split_once(',').context("data URI has no payload")?;

    if meta.ends_with(";base64") {
        BASE64
            .decode(payload)
            .context("data URI payload is not valid base64")
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri_round_trip() {
        let bytes: Vec<u8> = (0u8..255).collect();
        let uri = encode_data_uri("image/jpeg", &bytes);
        assert!(uri.starts_with("data:image/jpeg;base64,"));
        assert_eq!(decode_data_uri(&uri).unwrap(), bytes);
    }

    #[test]
    fn test_decode_rejects_non_data_uri() {
        assert!(decode_data_uri("https://example.com/a.jpg").is_err());
        assert!(decode_data_uri("data:image/jpeg;base64").is_err());
    }

    #[test]
    fn test_decode_plain_payload() {
        assert_eq!(decode_data_uri("data:text/plain,hello").unwrap(), b"hello");
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let mut audits = BTreeMap::new();
        audits.insert(
            "first-contentful-paint".to_string(),
            Audit {
                id: "first-contentful-paint".to_string(),
                title: "First Contentful Paint".to_string(),
                numeric_value: Some(812.0),
                numeric_unit: Some("millisecond".to_string()),
                ..Default::default()
            },
        );

        let mut categories = BTreeMap::new();
        categories.insert(
            "performance".to_string(),
            Category {
                title: "Performance".to_string(),
                score: Some(0.93),
            },
        );

        let report = AuditReport {
            requested_url: "https://example.com".to_string(),
            final_url: "https://example.com/".to_string(),
            fetch_time: "2026-01-01T00:00:00Z".to_string(),
            categories,
            audits,
            config_settings: serde_json::Map::new(),
        };

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"requestedUrl\""));
        assert!(json.contains("\"numericValue\":812.0"));
        assert!(!json.contains("numeric_value"));
    }

    #[test]
    fn test_artifacts_trace_events_path() {
        let artifacts = AuditArtifacts {
            fetch_time: "2026-01-01T00:00:00Z".to_string(),
            requested_url: "https://example.com".to_string(),
            traces: Some(Traces {
                default_pass: Some(TracePass {
                    trace_events: vec![serde_json::json!({"name": "navigationStart"})],
                }),
            }),
        };
        assert_eq!(artifacts.trace_events().unwrap().len(), 1);

        let json = serde_json::to_string(&artifacts).unwrap();
        assert!(json.contains("\"defaultPass\""));
        assert!(json.contains("\"traceEvents\""));

        let empty = AuditArtifacts {
            fetch_time: String::new(),
            requested_url: String::new(),
            traces: None,
        };
        assert!(empty.trace_events().is_none());
    }
}
