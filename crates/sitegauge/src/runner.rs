//! Run orchestration: directory layout, browser lifecycle, the run matrix,
//! and result persistence.
//!
//! The orchestrator owns the single browser session for the whole config,
//! executes `iterations x runs` audits strictly in sequence, writes the
//! per-iteration files the offline summarizers consume, and hands the
//! in-memory reports to the score aggregator. Nothing is recovered locally:
//! any I/O or engine error propagates to the caller and aborts the rest of
//! the matrix.

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::{Config, RunDefinition};
use crate::engine::report::{decode_data_uri, AuditReport};
use crate::engine::{AuditEngine, AuditOutcome, EngineOptions, PageSetup};
use crate::inject;

/// Default root directory for persisted results
const DEFAULT_OUTPUT_DIR: &str = "results";

/// Reports accumulated per run, in config order
#[derive(Debug, Clone)]
pub struct RunResults {
    pub runs: Vec<RunRecord>,
}

/// All iterations' reports for one named run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub name: String,
    pub reports: Vec<AuditReport>,
}

/// The audit run orchestrator
pub struct AuditRunner {
    config: Config,
}

impl AuditRunner {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Execute the full run matrix and return the collected reports.
    pub async fn run(&self) -> Result<RunResults> {
        let output_dir = PathBuf::from(
            self.config
                .output_dir
                .as_deref()
                .unwrap_or(DEFAULT_OUTPUT_DIR),
        );

        // Pre-existing directories are left untouched; files written later
        // overwrite unconditionally.
        fs::create_dir_all(&output_dir)
            .with_context(|| format!("Failed to create output dir: {}", output_dir.display()))?;

        let mut run_dirs = Vec::with_capacity(self.config.runs.len());
        let mut setups = Vec::with_capacity(self.config.runs.len());
        let mut results: Vec<RunRecord> = Vec::with_capacity(self.config.runs.len());

        for run in &self.config.runs {
            let run_dir = output_dir.join(&run.name);
            fs::create_dir_all(&run_dir)
                .with_context(|| format!("Failed to create run dir: {}", run_dir.display()))?;
            run_dirs.push(run_dir);
            setups.push(self.page_setup(run)?);
            results.push(RunRecord {
                name: run.name.clone(),
                reports: Vec::new(),
            });
        }

        let browser_config = BrowserConfig::builder()
            .viewport(None)
            .build()
            .map_err(|e| anyhow::anyhow!("{}", e))?;

        let (mut browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("Failed to launch browser")?;

        // The handler task only logs failures; it never takes the process
        // down with it.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(error) = event {
                    warn!("browser handler error: {}", error);
                    break;
                }
            }
        });

        let port = debug_port(browser.websocket_address())?;

        info!("Starting {} runs...", self.config.iterations);

        for iteration in 1..=self.config.iterations {
            info!("Run #{}", iteration);

            for (index, run) in self.config.runs.iter().enumerate() {
                info!("> {}", run.name);

                let options = EngineOptions::build(
                    port,
                    self.config.extra_headers.as_ref(),
                    self.config.lighthouse.as_ref(),
                );

                let outcome = AuditEngine::run(&browser, &self.config.url, &options, &setups[index])
                    .await
                    .with_context(|| {
                        format!("audit failed: run {} iteration {}", run.name, iteration)
                    })?;

                info!("Writing results to {}/...", run_dirs[index].display());
                persist_iteration(&run_dirs[index], iteration, &outcome)?;

                results[index].reports.push(outcome.report);
            }
        }

        browser.close().await.context("Failed to close browser")?;
        let _ = handler_task.await;

        Ok(RunResults { runs: results })
    }

    /// Resolve one run's effective page setup. Run-level blocklist and script
    /// fully replace the global values; they are never merged.
    fn page_setup(&self, run: &RunDefinition) -> Result<PageSetup> {
        let blocklist = run
            .block
            .clone()
            .or_else(|| self.config.block.clone())
            .unwrap_or_default();

        let script = match run.script.as_ref().or(self.config.script.as_ref()) {
            Some(script) => Some(
                inject::resolve(script)
                    .with_context(|| format!("script for run {}", run.name))?,
            ),
            None => None,
        };

        Ok(PageSetup { blocklist, script })
    }
}

/// Extract the DevTools debug port from the browser's websocket endpoint
fn debug_port(ws_endpoint: &str) -> Result<u16> {
    let parsed = url::Url::parse(ws_endpoint)
        .with_context(|| format!("unparseable websocket endpoint: {}", ws_endpoint))?;
    parsed
        .port()
        .with_context(|| format!("websocket endpoint has no port: {}", ws_endpoint))
}

/// Write one iteration's files into the run directory.
///
/// Layout: `{i}.json` (report), `{i}-artifacts.json`, and optionally
/// `{i}.jpg` and `{i}-trace.json`.
pub fn persist_iteration(run_dir: &Path, iteration: u32, outcome: &AuditOutcome) -> Result<()> {
    let report_path = run_dir.join(format!("{}.json", iteration));
    fs::write(
        &report_path,
        serde_json::to_string_pretty(&outcome.report)?,
    )
    .with_context(|| format!("Failed to write {}", report_path.display()))?;

    let artifacts_path = run_dir.join(format!("{}-artifacts.json", iteration));
    fs::write(
        &artifacts_path,
        serde_json::to_string_pretty(&outcome.artifacts)?,
    )
    .with_context(|| format!("Failed to write {}", artifacts_path.display()))?;

    if let Some(audit) = outcome.report.screenshot_audit() {
        if let Some(message) = &audit.error_message {
            warn!(
                "skipping screenshot for iteration {}: {}",
                iteration, message
            );
        } else if let Some(details) = &audit.details {
            let bytes = decode_data_uri(&details.data)
                .context("final-screenshot data URI is malformed")?;
            let screenshot_path = run_dir.join(format!("{}.jpg", iteration));
            fs::write(&screenshot_path, bytes)
                .with_context(|| format!("Failed to write {}", screenshot_path.display()))?;
        }
    }

    if let Some(events) = outcome.artifacts.trace_events() {
        let trace_path = run_dir.join(format!("{}-trace.json", iteration));
        fs::write(&trace_path, serde_json::to_string(events)?)
            .with_context(|| format!("Failed to write {}", trace_path.display()))?;
    }

    Ok(())
}
