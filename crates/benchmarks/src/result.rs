//! Benchmark report types.

use actor_bench_core::{MetricKind, MetricSet, Result, RunHandle};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one benchmark of one actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    /// Benchmarked actor.
    pub subject: String,
    /// Metric kind name.
    pub kind: String,
    /// Runs the aggregate was computed from.
    pub runs: Vec<RunHandle>,
    /// Number of runs started, including rejected ones.
    pub attempts: u32,
    /// Aggregated full record.
    pub aggregated: serde_json::Value,
    /// Link to the stored full record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_link: Option<String>,
    /// Link to the metrics dataset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_link: Option<String>,
    /// When the report was produced.
    pub timestamp: DateTime<Utc>,
}

impl BenchmarkReport {
    /// Create an unsaved report for an aggregated metric set.
    pub fn new<K: MetricKind>(
        subject: impl Into<String>,
        runs: Vec<RunHandle>,
        attempts: u32,
        aggregated: &MetricSet<K>,
    ) -> Result<Self> {
        Ok(Self {
            subject: subject.into(),
            kind: K::NAME.to_string(),
            runs,
            attempts,
            aggregated: aggregated.to_record()?,
            record_link: None,
            metrics_link: None,
            timestamp: Utc::now(),
        })
    }

    /// Attach the storage links.
    pub fn with_links(mut self, record_link: String, metrics_link: String) -> Self {
        self.record_link = Some(record_link);
        self.metrics_link = Some(metrics_link);
        self
    }

    /// Aggregated value of one metric.
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.aggregated.get(name).and_then(serde_json::Value::as_f64)
    }

    /// Rebuild the aggregated metric set.
    pub fn metric_set<K: MetricKind>(&self) -> Result<MetricSet<K>> {
        MetricSet::from_record(&self.aggregated)
    }
}
