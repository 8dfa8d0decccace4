//! Per-run score aggregation printed at the end of an audit run.

use std::fmt::Write;

use crate::runner::RunResults;
use crate::stats::{median, std_dev};

/// Render the run-score summary.
///
/// For every run, every category observed across its iterations is reported
/// with the median and standard deviation of `round(score * 100)`, followed
/// by the rounded values in iteration order. A category absent from some
/// iteration simply contributes no value for it.
pub fn render(results: &RunResults) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "Run Scores:");

    for run in &results.runs {
        let _ = writeln!(output, "{}", run.name);

        // Categories in first-seen order, values in iteration order
        let mut order: Vec<String> = Vec::new();
        let mut by_category: Vec<Vec<f64>> = Vec::new();

        for report in &run.reports {
            for (name, category) in &report.categories {
                let Some(score) = category.score else {
                    continue;
                };
                let index = match order.iter().position(|n| n == name) {
                    Some(index) => index,
                    None => {
                        order.push(name.clone());
                        by_category.push(Vec::new());
                        order.len() - 1
                    }
                };
                by_category[index].push((score * 100.0).round());
            }
        }

        for (name, values) in order.iter().zip(&by_category) {
            let med = median(values).unwrap_or(0.0);
            let sd = std_dev(values).unwrap_or(0.0);

            let _ = writeln!(output, "{}: median: {}, stddev: {:.3}", name, format_number(med), sd);
            let _ = writeln!(
                output,
                "> {}",
                values
                    .iter()
                    .map(|v| format!("{}", *v as i64))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }

    output
}

/// Render a median without a trailing `.0` when it is integral
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
