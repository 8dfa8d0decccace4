//! Compares saved audit metrics across runs.
//!
//! Run from the output directory that contains one subdirectory per run; with
//! exactly two runs a diff row is added per metric.

use anyhow::{Context, Result};
use clap::Parser;
use sitegauge::summarize;
use std::collections::BTreeMap;

/// Compare audit metrics across the runs saved under the current directory
#[derive(Parser, Debug)]
#[command(name = "sitegauge-compare", version, about)]
struct Args {
    /// Audit metric to compare (default: every audit in the first report)
    metric: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let cwd = std::env::current_dir()?;

    let dirs = summarize::run_directories(&cwd)?;
    let first_dir = dirs.first().context("no run directories found")?;

    let metrics = match args.metric {
        Some(metric) => vec![metric],
        None => {
            let metrics = summarize::discover_metrics(first_dir)?;
            println!("Found audits: {}", metrics.join(","));
            metrics
        }
    };

    let dir_names: Vec<String> = dirs
        .iter()
        .filter_map(|dir| dir.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect();

    let mut values: BTreeMap<String, BTreeMap<String, Vec<f64>>> = BTreeMap::new();
    for (dir, name) in dirs.iter().zip(&dir_names) {
        let collected = summarize::collect_values(dir, &metrics)?;
        for (metric, series) in collected {
            values
                .entry(metric)
                .or_default()
                .insert(name.clone(), series);
        }
    }

    print!("{}", summarize::render_comparison(&dir_names, &metrics, &values));

    Ok(())
}
