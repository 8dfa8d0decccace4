//! Best-effort CDP trace recording around an audited navigation.
//!
//! Tracing failures never fail the audit; a recorder that cannot start or
//! finish simply yields no events and the trace artifact is omitted
//! downstream.

use anyhow::{Context, Result};
use chromiumoxide::cdp::browser_protocol::tracing::{
    EndParams, EventDataCollected, EventTracingComplete, StartParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;

/// Accumulates trace events emitted between start and stop
pub struct TraceRecorder {
    events: Arc<Mutex<Vec<serde_json::Value>>>,
    task: tokio::task::JoinHandle<()>,
}

impl TraceRecorder {
    /// Begin tracing on `page`
    pub async fn start(page: &Page) -> Result<Self> {
        let mut collected = page
            .event_listener::<EventDataCollected>()
            .await
            .context("Failed to subscribe to trace data")?;

        let events: Arc<Mutex<Vec<serde_json::Value>>> = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();

        let task = tokio::spawn(async move {
            while let Some(chunk) = collected.next().await {
                events_clone.lock().await.extend(chunk.value.iter().cloned());
            }
        });

        page.execute(StartParams::default())
            .await
            .context("Failed to start tracing")?;

        Ok(Self { events, task })
    }

    /// End tracing and return the recorded events, or `None` when nothing was
    /// captured.
    pub async fn stop(self, page: &Page) -> Option<Vec<serde_json::Value>> {
        let result = self.finish(page).await;
        self.task.abort();
        match result {
            Ok(events) if !events.is_empty() => Some(events),
            Ok(_) => None,
            Err(error) => {
                debug!("trace collection abandoned: {}", error);
                None
            }
        }
    }

    async fn finish(&self, page: &Page) -> Result<Vec<serde_json::Value>> {
        let mut complete = page
            .event_listener::<EventTracingComplete>()
            .await
            .context("Failed to subscribe to trace completion")?;

        page.execute(EndParams::default())
            .await
            .context("Failed to end tracing")?;

        // The browser flushes remaining dataCollected events before
        // signalling completion; give it a bounded window to do so.
        let _ = timeout(Duration::from_secs(10), complete.next()).await;

        Ok(self.events.lock().await.clone())
    }
}
