//! Summarizes one run's saved audit metrics.
//!
//! Run from the final output directory of a single run (the directory that
//! holds `1.json`, `2.json`, ...).

use anyhow::Result;
use clap::Parser;
use sitegauge::summarize;

/// Summarize audit metrics across one run's saved reports
#[derive(Parser, Debug)]
#[command(name = "sitegauge-summarize", version, about)]
struct Args {
    /// Audit metric to summarize (default: every audit in the first report)
    metric: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let cwd = std::env::current_dir()?;

    let metrics = match args.metric {
        Some(metric) => vec![metric],
        None => {
            let metrics = summarize::discover_metrics(&cwd)?;
            println!("Found audits: {}", metrics.join(","));
            metrics
        }
    };

    let values = summarize::collect_values(&cwd, &metrics)?;
    print!("{}", summarize::render_directory_summary(&metrics, &values));

    Ok(())
}
