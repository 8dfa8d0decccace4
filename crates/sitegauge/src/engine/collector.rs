//! In-page measurement collection.
//!
//! A collector script is installed as a new-document script before
//! navigation. It observes paint, largest-contentful-paint, and layout-shift
//! entries and, shortly after the load event, reports one JSON payload via
//! `console.log()` with the prefix `__SITEGAUGE_METRICS__:`. The Rust side
//! listens for `Runtime.consoleAPICalled` events and parses that payload.

use anyhow::{Context, Result};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::EngineError;

const METRIC_PREFIX: &str = "__SITEGAUGE_METRICS__:";

/// Raw timings reported by the collector script, all relative to navigation
/// start, in milliseconds (except CLS, which is unitless, and byte counts).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeasurements {
    #[serde(default)]
    pub first_contentful_paint: Option<f64>,
    #[serde(default)]
    pub largest_contentful_paint: Option<f64>,
    #[serde(default)]
    pub cumulative_layout_shift: Option<f64>,
    #[serde(default)]
    pub time_to_first_byte: Option<f64>,
    #[serde(default)]
    pub dom_content_loaded: Option<f64>,
    #[serde(default)]
    pub load_event: Option<f64>,
    #[serde(default)]
    pub total_byte_weight: Option<f64>,
}

/// Handle to a pending measurement
pub struct MeasurementHandle {
    slot: Arc<Mutex<Option<PageMeasurements>>>,
    task: tokio::task::JoinHandle<()>,
}

impl MeasurementHandle {
    /// Wait until the collector script reports, or fail after
    /// `timeout_duration`.
    pub async fn wait(self, timeout_duration: Duration) -> Result<PageMeasurements, EngineError> {
        let slot = self.slot.clone();

        let waited = timeout(timeout_duration, async {
            loop {
                tokio::time::sleep(Duration::from_millis(100)).await;
                if let Some(measurements) = slot.lock().await.clone() {
                    return measurements;
                }
            }
        })
        .await;

        self.task.abort();

        match waited {
            Ok(measurements) => {
                debug!("collected page measurements: {:?}", measurements);
                Ok(measurements)
            }
            Err(_) => Err(EngineError::MetricsTimeout(timeout_duration)),
        }
    }
}

/// Installs the collector script and listens for its report
pub struct MetricsCollector;

impl MetricsCollector {
    /// Install the collector as a new-document script.
    ///
    /// Must happen before navigation so the observers see the page load from
    /// the start.
    pub async fn install(page: &Page) -> Result<()> {
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(COLLECTOR_SCRIPT))
            .await
            .context("Failed to install measurement collector")?;
        Ok(())
    }

    /// Subscribe to console events and start watching for the report.
    ///
    /// Call before navigating; the returned handle resolves once the page's
    /// load event has fired and the script has posted its payload.
    pub async fn start(page: &Page) -> Result<MeasurementHandle> {
        let mut events = page
            .event_listener::<EventConsoleApiCalled>()
            .await
            .context("Failed to subscribe to console events")?;

        let slot: Arc<Mutex<Option<PageMeasurements>>> = Arc::new(Mutex::new(None));
        let slot_clone = slot.clone();

        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Some(payload) = metric_payload(&event) {
                    match serde_json::from_str::<PageMeasurements>(payload) {
                        Ok(measurements) => {
                            *slot_clone.lock().await = Some(measurements);
                            break;
                        }
                        Err(error) => {
                            warn!("unparseable measurement payload: {}", error);
                        }
                    }
                }
            }
        });

        Ok(MeasurementHandle { slot, task })
    }
}

/// Extract the JSON payload from a console event, if it is ours
fn metric_payload(event: &EventConsoleApiCalled) -> Option<&str> {
    let first_arg = event.args.first()?;
    let value = first_arg.value.as_ref()?;
    let message = value.as_str()?;
    message.strip_prefix(METRIC_PREFIX)
}

const COLLECTOR_SCRIPT: &str = r#"
(function() {
    'use strict';

    var PREFIX = '__SITEGAUGE_METRICS__:';
    var state = { cls: 0, lcp: undefined };

    try {
        new PerformanceObserver(function(list) {
            list.getEntries().forEach(function(entry) {
                if (!entry.hadRecentInput) {
                    state.cls += entry.value;
                }
            });
        }).observe({ type: 'layout-shift', buffered: true });
    } catch (e) {}

    try {
        new PerformanceObserver(function(list) {
            var entries = list.getEntries();
            if (entries.length) {
                state.lcp = entries[entries.length - 1].startTime;
            }
        }).observe({ type: 'largest-contentful-paint', buffered: true });
    } catch (e) {}

    function report() {
        var nav = performance.getEntriesByType('navigation')[0];
        var paint = {};
        performance.getEntriesByType('paint').forEach(function(entry) {
            paint[entry.name] = entry.startTime;
        });

        var bytes = 0;
        performance.getEntriesByType('resource').forEach(function(entry) {
            bytes += entry.transferSize || 0;
        });
        if (nav) {
            bytes += nav.transferSize || 0;
        }

        var payload = {
            firstContentfulPaint: paint['first-contentful-paint'],
            largestContentfulPaint: state.lcp !== undefined
                ? state.lcp
                : paint['first-contentful-paint'],
            cumulativeLayoutShift: state.cls,
            timeToFirstByte: nav ? nav.responseStart : undefined,
            domContentLoaded: nav ? nav.domContentLoadedEventEnd : undefined,
            loadEvent: nav ? nav.loadEventEnd : undefined,
            totalByteWeight: bytes
        };
        console.log(PREFIX + JSON.stringify(payload));
    }

    if (document.readyState === 'complete') {
        setTimeout(report, 500);
    } else {
        window.addEventListener('load', function() {
            setTimeout(report, 500);
        });
    }
})();
"#;
