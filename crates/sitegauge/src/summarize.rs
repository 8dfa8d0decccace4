//! Offline summarization of previously saved result trees.
//!
//! Both summarizer binaries share this logic: scan a directory of saved
//! iteration files, skip everything that is not a report by filename
//! convention, pull one or more `audits.*.numericValue` series out, and
//! reduce each to `median +/- stdev`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::stats::{median, std_dev};

/// Filename suffixes that mark non-report files in a run directory
const SKIP_SUFFIXES: [&str; 3] = [".jpg", "-trace.json", "-artifacts.json"];

/// Minimal view of a saved report: only the audits mapping matters here
#[derive(Debug, Deserialize)]
struct ReportDoc {
    audits: BTreeMap<String, MetricEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetricEntry {
    #[serde(default)]
    numeric_value: Option<f64>,
}

/// Whether a filename names a report (as opposed to a screenshot, trace, or
/// artifact dump)
pub fn is_report_file(name: &str) -> bool {
    !SKIP_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Report files in `dir`, sorted by filename for deterministic traversal
pub fn report_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .map(|name| is_report_file(&name.to_string_lossy()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Immediate subdirectories of `dir`, sorted by name
pub fn run_directories(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn parse_report(path: &Path) -> Result<ReportDoc> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read report: {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse report: {}", path.display()))
}

/// Metric names from the first report file in `dir`
pub fn discover_metrics(dir: &Path) -> Result<Vec<String>> {
    let files = report_files(dir)?;
    let first = files
        .first()
        .with_context(|| format!("no report files in {}", dir.display()))?;
    let report = parse_report(first)?;
    Ok(report.audits.keys().cloned().collect())
}

/// Collect every metric's rounded `numericValue` series across the report
/// files of `dir`.
///
/// A file where a metric is absent, or has a missing or zero numeric value,
/// contributes nothing for that metric.
pub fn collect_values(dir: &Path, metrics: &[String]) -> Result<BTreeMap<String, Vec<f64>>> {
    let mut values: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for metric in metrics {
        values.insert(metric.clone(), Vec::new());
    }

    for path in report_files(dir)? {
        let report = parse_report(&path)?;
        for metric in metrics {
            let Some(value) = report
                .audits
                .get(metric)
                .and_then(|entry| entry.numeric_value)
            else {
                continue;
            };
            if value == 0.0 || !value.is_finite() {
                continue;
            }
            if let Some(series) = values.get_mut(metric) {
                series.push(value.round());
            }
        }
    }

    Ok(values)
}

/// Render the single-directory summary: per metric with data, the metric
/// name, `median:  M +/- S`, and the raw collected values.
pub fn render_directory_summary(
    metrics: &[String],
    values: &BTreeMap<String, Vec<f64>>,
) -> String {
    let mut output = String::new();

    for metric in metrics {
        let Some(series) = values.get(metric) else {
            continue;
        };
        if series.is_empty() {
            continue;
        }

        let med = median(series).unwrap_or(0.0);
        let sd = std_dev(series).unwrap_or(0.0);

        let _ = writeln!(output);
        let _ = writeln!(output, "{}", metric);
        let _ = writeln!(output, "\tmedian:  {} +/- {}", med.round() as i64, sd.round() as i64);
        let _ = writeln!(
            output,
            "\tresults: {}",
            series
                .iter()
                .map(|v| format!("{}", *v as i64))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    output
}

/// Render the multi-directory comparison.
///
/// For each metric where the first directory has data: one right-aligned
/// `dir: median +/- stdev` row per directory, in listing order, and for
/// exactly two directories a `diff` row with the difference of medians
/// (first minus second) and that difference as a percentage of the first
/// median (zero when not finite).
pub fn render_comparison(
    dirs: &[String],
    metrics: &[String],
    values: &BTreeMap<String, BTreeMap<String, Vec<f64>>>,
) -> String {
    let mut output = String::new();
    let width = dirs.iter().map(|d| d.len()).max().unwrap_or(0);

    for metric in metrics {
        let Some(per_dir) = values.get(metric) else {
            continue;
        };
        let first_has_data = dirs
            .first()
            .and_then(|dir| per_dir.get(dir))
            .map(|series| !series.is_empty())
            .unwrap_or(false);
        if !first_has_data {
            continue;
        }

        let _ = writeln!(output);
        let _ = writeln!(output, "{}", metric);

        for dir in dirs {
            let series = per_dir.get(dir).map(|s| s.as_slice()).unwrap_or(&[]);
            let med = median(series).unwrap_or(0.0);
            let sd = std_dev(series).unwrap_or(0.0);
            let _ = writeln!(
                output,
                "{:>width$}: {} +/- {}",
                dir,
                med.round() as i64,
                sd.round() as i64,
                width = width
            );
        }

        if dirs.len() == 2 {
            let first = per_dir.get(&dirs[0]).and_then(|s| median(s)).unwrap_or(0.0);
            let second = per_dir.get(&dirs[1]).and_then(|s| median(s)).unwrap_or(0.0);

            let diff = first - second;
            let mut pct = diff / first * 100.0;
            if !pct.is_finite() {
                pct = 0.0;
            }

            let _ = writeln!(
                output,
                "{:>width$}: {} ({:.1}%)",
                "diff",
                diff.round() as i64,
                pct,
                width = width
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_report_file() {
        assert!(is_report_file("1.json"));
        assert!(is_report_file("12.json"));
        assert!(!is_report_file("1.jpg"));
        assert!(!is_report_file("1-trace.json"));
        assert!(!is_report_file("1-artifacts.json"));
    }

    #[test]
    fn test_render_summary_skips_empty_series() {
        let metrics = vec!["speed-index".to_string(), "interactive".to_string()];
        let mut values = BTreeMap::new();
        values.insert("speed-index".to_string(), vec![1200.0, 1180.0, 1250.0]);
        values.insert("interactive".to_string(), Vec::new());

        let output = render_directory_summary(&metrics, &values);
        assert!(output.contains("speed-index"));
        assert!(output.contains("median:  1200 +/-"));
        assert!(output.contains("results: 1200, 1180, 1250"));
        assert!(!output.contains("interactive"));
    }

    #[test]
    fn test_render_comparison_two_directory_diff() {
        let dirs = vec!["control".to_string(), "blocked".to_string()];
        let metrics = vec!["interactive".to_string()];
        let mut per_dir = BTreeMap::new();
        per_dir.insert("control".to_string(), vec![100.0, 100.0, 100.0]);
        per_dir.insert("blocked".to_string(), vec![80.0, 80.0, 80.0]);
        let mut values = BTreeMap::new();
        values.insert("interactive".to_string(), per_dir);

        let output = render_comparison(&dirs, &metrics, &values);
        assert!(output.contains("control: 100 +/- 0"));
        assert!(output.contains("blocked: 80 +/- 0"));
        assert!(output.contains("diff: 20 (20.0%)"));
    }

    #[test]
    fn test_render_comparison_zero_first_median_reports_zero_pct() {
        let dirs = vec!["a".to_string(), "b".to_string()];
        let metrics = vec!["m".to_string()];
        let mut per_dir = BTreeMap::new();
        // A zero first median divides to a non-finite percentage, which must
        // still be reported as zero
        per_dir.insert("a".to_string(), vec![0.0]);
        per_dir.insert("b".to_string(), vec![80.0]);
        let mut values = BTreeMap::new();
        values.insert("m".to_string(), per_dir);

        let output = render_comparison(&dirs, &metrics, &values);
        assert!(output.contains("(0.0%)"));
    }

    #[test]
    fn test_render_comparison_right_aligns_to_longest_name() {
        let dirs = vec!["short".to_string(), "much-longer-name".to_string()];
        let metrics = vec!["m".to_string()];
        let mut per_dir = BTreeMap::new();
        per_dir.insert("short".to_string(), vec![10.0]);
        per_dir.insert("much-longer-name".to_string(), vec![20.0]);
        let mut values = BTreeMap::new();
        values.insert("m".to_string(), per_dir);

        let output = render_comparison(&dirs, &metrics, &values);
        assert!(output.contains("           short: 10"));
        assert!(output.contains("much-longer-name: 20"));
    }

    #[test]
    fn test_render_comparison_skips_metric_when_first_dir_empty() {
        let dirs = vec!["a".to_string(), "b".to_string()];
        let metrics = vec!["m".to_string()];
        let mut per_dir = BTreeMap::new();
        per_dir.insert("a".to_string(), Vec::new());
        per_dir.insert("b".to_string(), vec![80.0]);
        let mut values = BTreeMap::new();
        values.insert("m".to_string(), per_dir);

        let output = render_comparison(&dirs, &metrics, &values);
        assert!(output.is_empty());
    }
}
