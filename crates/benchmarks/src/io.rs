//! I/O operations for benchmark reports.
//!
//! Layout of an output directory:
//!
//! - `raw/<subject>.json` - one report per benchmarked actor
//! - `all_results.json` - every report
//! - `summary.md` - markdown summary
//! - `detailed.md` - markdown report embedding every aggregated record

use crate::markdown;
use crate::result::BenchmarkReport;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Raw reports subdirectory.
pub const RAW_DIR: &str = "raw";

/// Combined reports file name.
pub const ALL_RESULTS_FILE: &str = "all_results.json";

/// Summary file name.
pub const SUMMARY_FILE: &str = "summary.md";

/// Detailed report file name.
pub const DETAILED_FILE: &str = "detailed.md";

/// Ensure the output directories exist under `dir`.
pub fn ensure_output_dirs(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir.join(RAW_DIR))
}

/// File name of a subject's raw report.
///
/// Unreserved URL characters are kept, everything else is percent encoded, so
/// distinct subjects never share a file.
fn raw_file_name(subject: &str) -> String {
    let mut name = String::with_capacity(subject.len() + 5);
    for byte in subject.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'~') {
            name.push(char::from(byte));
        } else {
            let _ = write!(name, "%{byte:02X}");
        }
    }
    name.push_str(".json");
    name
}

/// Write reports to a JSON file.
pub fn write_reports_json(reports: &[BenchmarkReport], path: impl AsRef<Path>) -> io::Result<()> {
    let json = serde_json::to_string_pretty(reports).map_err(io::Error::other)?;
    fs::write(path, json)
}

/// Write one report to the raw directory and return its path.
pub fn write_raw_report(dir: &Path, report: &BenchmarkReport) -> io::Result<PathBuf> {
    ensure_output_dirs(dir)?;
    let path = dir.join(RAW_DIR).join(raw_file_name(&report.subject));
    let json = serde_json::to_string_pretty(report).map_err(io::Error::other)?;
    fs::write(&path, json)?;
    Ok(path)
}

/// Write the markdown summary.
pub fn write_summary(dir: &Path, reports: &[BenchmarkReport]) -> io::Result<()> {
    ensure_output_dirs(dir)?;
    fs::write(dir.join(SUMMARY_FILE), markdown::generate_summary(reports))
}

/// Write the detailed markdown report.
pub fn write_detailed_report(dir: &Path, reports: &[BenchmarkReport]) -> io::Result<()> {
    ensure_output_dirs(dir)?;
    fs::write(dir.join(DETAILED_FILE), markdown::generate_detailed_report(reports))
}

/// Write all outputs (raw JSON, combined JSON, summary and detailed report)
/// under `dir`.
pub fn write_all_outputs(dir: &Path, reports: &[BenchmarkReport]) -> io::Result<()> {
    ensure_output_dirs(dir)?;

    for report in reports {
        write_raw_report(dir, report)?;
    }
    write_reports_json(reports, dir.join(ALL_RESULTS_FILE))?;
    write_summary(dir, reports)?;
    write_detailed_report(dir, reports)?;

    Ok(())
}
