//! The audit engine: drives one page load and produces a scored report.
//!
//! Given the shared browser, a URL, merged engine options, and the run's page
//! setup (blocklist + script injection), [`AuditEngine::run`] opens a fresh
//! page, wires interception and injection, records a trace, navigates,
//! collects in-page measurements, captures a final screenshot, and assembles
//! an [`AuditReport`] plus raw [`AuditArtifacts`].

pub mod collector;
pub mod report;
pub mod trace;

use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ScriptInjection;
use crate::inject;
use crate::intercept::RequestInterceptor;
use collector::{MetricsCollector, PageMeasurements};
use report::{Audit, AuditArtifacts, AuditDetails, AuditReport, Category, TracePass, Traces};
use trace::TraceRecorder;

/// How long to wait for the in-page collector to report after navigation
const MEASUREMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-run page configuration, resolved once before the run starts and
/// immutable afterwards
#[derive(Debug, Clone, Default)]
pub struct PageSetup {
    /// URL substrings whose requests are aborted
    pub blocklist: Vec<String>,
    /// Script to add to the page, with `contentFile` already resolved
    pub script: Option<ScriptInjection>,
}

/// Result of one engine invocation
#[derive(Debug, Clone)]
pub struct AuditOutcome {
    pub report: AuditReport,
    pub artifacts: AuditArtifacts,
}

/// Errors the engine can fail with
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to open audit page")]
    PageCreate(#[source] CdpError),
    #[error("navigation to {url} failed")]
    Navigation {
        url: String,
        #[source]
        source: CdpError,
    },
    #[error("timed out waiting for page measurements after {0:?}")]
    MetricsTimeout(Duration),
    #[error(transparent)]
    Setup(#[from] anyhow::Error),
}

/// Options passed to the engine, merged from a built-in base, the configured
/// extra headers, and the user's opaque overrides (which win key-by-key).
#[derive(Debug, Clone)]
pub struct EngineOptions {
    options: Map<String, Value>,
}

impl EngineOptions {
    /// Merge order: base `{port, output, extraHeaders}`, then configured
    /// extra headers, then user overrides on top.
    pub fn build(
        port: u16,
        extra_headers: Option<&BTreeMap<String, String>>,
        overrides: Option<&Map<String, Value>>,
    ) -> Self {
        let mut options = Map::new();
        options.insert("port".to_string(), json!(port));
        options.insert("output".to_string(), json!("json"));
        options.insert("extraHeaders".to_string(), json!({}));

        if let Some(headers) = extra_headers {
            options.insert("extraHeaders".to_string(), json!(headers));
        }

        if let Some(overrides) = overrides {
            for (key, value) in overrides {
                options.insert(key.clone(), value.clone());
            }
        }

        Self { options }
    }

    /// The merged option map, persisted into the report's `configSettings`
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.options
    }

    /// The effective extra headers, when a non-empty object
    pub fn extra_headers(&self) -> Option<&Map<String, Value>> {
        match self.options.get("extraHeaders") {
            Some(Value::Object(map)) if !map.is_empty() => Some(map),
            _ => None,
        }
    }
}

/// Drives a single audited page load
pub struct AuditEngine;

impl AuditEngine {
    /// Audit `url` once and return the report and raw artifacts.
    pub async fn run(
        browser: &Browser,
        url: &str,
        options: &EngineOptions,
        setup: &PageSetup,
    ) -> Result<AuditOutcome, EngineError> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(EngineError::PageCreate)?;

        if let Some(headers) = options.extra_headers() {
            let params = SetExtraHttpHeadersParams::new(Headers::new(Value::Object(headers.clone())));
            page.execute(params)
                .await
                .map_err(|e| EngineError::Setup(anyhow::Error::new(e).context("setting extra headers")))?;
        }

        let intercept_task = RequestInterceptor::attach(&page, setup.blocklist.clone()).await?;

        if let Some(script) = &setup.script {
            inject::apply(&page, script).await?;
        }

        MetricsCollector::install(&page).await?;
        let measurement = MetricsCollector::start(&page).await?;

        // Best effort: a failed trace just means no trace artifact
        let recorder = match TraceRecorder::start(&page).await {
            Ok(recorder) => Some(recorder),
            Err(error) => {
                warn!("trace recording unavailable: {}", error);
                None
            }
        };

        let fetch_time = chrono::Utc::now().to_rfc3339();

        page.goto(url).await.map_err(|source| EngineError::Navigation {
            url: url.to_string(),
            source,
        })?;

        if let Err(error) = page.wait_for_navigation().await {
            debug!("wait_for_navigation: {}", error);
        }

        let measurements = measurement.wait(MEASUREMENT_TIMEOUT).await?;

        let screenshot = page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Jpeg)
                    .build(),
            )
            .await;

        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());

        let trace_events = match recorder {
            Some(recorder) => recorder.stop(&page).await,
            None => None,
        };

        intercept_task.abort();
        if let Err(error) = page.close().await {
            debug!("page close: {}", error);
        }

        let report = build_report(url, &final_url, &fetch_time, &measurements, screenshot, options);
        let artifacts = AuditArtifacts {
            fetch_time,
            requested_url: url.to_string(),
            traces: trace_events.map(|events| Traces {
                default_pass: Some(TracePass {
                    trace_events: events,
                }),
            }),
        };

        Ok(AuditOutcome { report, artifacts })
    }
}

/// Scoring weights and thresholds for the performance category.
///
/// Each entry is (audit id, weight, good threshold, poor threshold); values
/// at or under "good" score 1.0, at or over "poor" score 0.0, linear in
/// between.
const PERFORMANCE_WEIGHTS: [(&str, f64, f64, f64); 4] = [
    ("first-contentful-paint", 0.15, 1_800.0, 3_000.0),
    ("largest-contentful-paint", 0.40, 2_500.0, 4_000.0),
    ("cumulative-layout-shift", 0.25, 0.1, 0.25),
    ("time-to-first-byte", 0.20, 800.0, 1_800.0),
];

fn linear_score(value: f64, good: f64, poor: f64) -> f64 {
    if value <= good {
        1.0
    } else if value >= poor {
        0.0
    } else {
        1.0 - (value - good) / (poor - good)
    }
}

fn numeric_audit(id: &str, title: &str, value: Option<f64>, unit: &str, score: Option<f64>) -> Audit {
    Audit {
        id: id.to_string(),
        title: title.to_string(),
        score,
        numeric_value: value,
        numeric_unit: value.map(|_| unit.to_string()),
        display_value: value.map(|v| {
            if unit == "millisecond" {
                format!("{:.1} ms", v)
            } else {
                format!("{}", v)
            }
        }),
        details: None,
        error_message: None,
    }
}

fn build_report(
    requested_url: &str,
    final_url: &str,
    fetch_time: &str,
    measurements: &PageMeasurements,
    screenshot: Result<Vec<u8>, CdpError>,
    options: &EngineOptions,
) -> AuditReport {
    let mut audits = BTreeMap::new();

    let scored = [
        ("first-contentful-paint", "First Contentful Paint", measurements.first_contentful_paint, "millisecond"),
        ("largest-contentful-paint", "Largest Contentful Paint", measurements.largest_contentful_paint, "millisecond"),
        ("cumulative-layout-shift", "Cumulative Layout Shift", measurements.cumulative_layout_shift, "unitless"),
        ("time-to-first-byte", "Time To First Byte", measurements.time_to_first_byte, "millisecond"),
    ];
    for (id, title, value, unit) in scored {
        let score = value.and_then(|v| {
            PERFORMANCE_WEIGHTS
                .iter()
                .find(|(weighted_id, ..)| *weighted_id == id)
                .map(|(_, _, good, poor)| linear_score(v, *good, *poor))
        });
        audits.insert(id.to_string(), numeric_audit(id, title, value, unit, score));
    }

    audits.insert(
        "dom-content-loaded".to_string(),
        numeric_audit(
            "dom-content-loaded",
            "DOM Content Loaded",
            measurements.dom_content_loaded,
            "millisecond",
            None,
        ),
    );
    audits.insert(
        "load".to_string(),
        numeric_audit("load", "Load Event", measurements.load_event, "millisecond", None),
    );
    audits.insert(
        "total-byte-weight".to_string(),
        numeric_audit(
            "total-byte-weight",
            "Total Byte Weight",
            measurements.total_byte_weight,
            "byte",
            None,
        ),
    );

    audits.insert(
        report::FINAL_SCREENSHOT.to_string(),
        match screenshot {
            Ok(bytes) => Audit {
                id: report::FINAL_SCREENSHOT.to_string(),
                title: "Final Screenshot".to_string(),
                details: Some(AuditDetails {
                    kind: "screenshot".to_string(),
                    data: report::encode_data_uri("image/jpeg", &bytes),
                }),
                ..Default::default()
            },
            Err(error) => Audit {
                id: report::FINAL_SCREENSHOT.to_string(),
                title: "Final Screenshot".to_string(),
                error_message: Some(error.to_string()),
                ..Default::default()
            },
        },
    );

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for (id, weight, ..) in PERFORMANCE_WEIGHTS {
        if let Some(score) = audits.get(id).and_then(|a| a.score) {
            weighted_sum += score * weight;
            weight_total += weight;
        }
    }
    let performance_score = if weight_total > 0.0 {
        Some(weighted_sum / weight_total)
    } else {
        None
    };

    let mut categories = BTreeMap::new();
    categories.insert(
        "performance".to_string(),
        Category {
            title: "Performance".to_string(),
            score: performance_score,
        },
    );

    AuditReport {
        requested_url: requested_url.to_string(),
        final_url: final_url.to_string(),
        fetch_time: fetch_time.to_string(),
        categories,
        audits,
        config_settings: options.as_map().clone(),
    }
}
