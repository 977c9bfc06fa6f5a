//! Markdown output generation for benchmark reports.

use crate::result::BenchmarkReport;
use std::fmt::Write;

fn format_metric(value: Option<&serde_json::Value>) -> String {
    match value.and_then(serde_json::Value::as_f64) {
        Some(number) => format!("{number:.2}"),
        None => "-".to_string(),
    }
}

/// Names of every metric column across `reports`, sorted.
fn metric_columns(reports: &[BenchmarkReport]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for report in reports {
        let Some(object) = report.aggregated.as_object() else {
            continue;
        };
        for name in object.keys() {
            if name != actor_bench_core::metric_set::META_DATA_KEY && !columns.contains(name) {
                columns.push(name.clone());
            }
        }
    }
    columns.sort();
    columns
}

/// Generate a markdown summary table of `reports`.
pub fn generate_summary(reports: &[BenchmarkReport]) -> String {
    let columns = metric_columns(reports);
    let mut output = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(output, "# Benchmark Summary");
    let _ = writeln!(output);
    let _ = writeln!(output, "Generated: {}", chrono::Utc::now().to_rfc3339());
    let _ = writeln!(output);

    let _ = write!(output, "| Actor | Runs | Attempts |");
    for column in &columns {
        let _ = write!(output, " {column} |");
    }
    let _ = writeln!(output, " Details |");
    let _ = writeln!(output, "|{}", "---|".repeat(columns.len() + 4));

    for report in reports {
        let _ = write!(
            output,
            "| {} | {} | {} |",
            report.subject,
            report.runs.len(),
            report.attempts
        );
        for column in &columns {
            let _ = write!(output, " {} |", format_metric(report.aggregated.get(column)));
        }
        let details = report.record_link.as_deref().unwrap_or("not saved");
        let _ = writeln!(output, " {details} |");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "---");
    let _ = writeln!(output, "Total benchmarks: {}", reports.len());

    output
}

/// Generate a detailed markdown report with full aggregated records.
pub fn generate_detailed_report(reports: &[BenchmarkReport]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Detailed Benchmark Report");
    let _ = writeln!(output);

    for report in reports {
        let _ = writeln!(output, "## {} ({})", report.subject, report.kind);
        let _ = writeln!(output);
        let _ = writeln!(output, "**Timestamp:** {}", report.timestamp.to_rfc3339());
        let runs: Vec<&str> = report.runs.iter().map(|r| r.as_str()).collect();
        let _ = writeln!(output, "**Runs:** {}", runs.join(", "));
        if let Some(link) = &report.metrics_link {
            let _ = writeln!(output, "**Metrics dataset:** {link}");
        }
        let _ = writeln!(output);
        let _ = writeln!(output, "```json");
        let _ = writeln!(
            output,
            "{}",
            serde_json::to_string_pretty(&report.aggregated).unwrap_or_default()
        );
        let _ = writeln!(output, "```");
        let _ = writeln!(output);
    }

    output
}
