//! Persistence of aggregated benchmarks.
//!
//! Two sinks are written for every benchmark:
//!
//! - the full record (metadata and metrics) in a key-value store named after
//!   the metric kind
//! - a metrics-only row in a dataset named after kind, actor and tag, so
//!   repeated benchmarks form a time series
//!
//! Keys use second precision, two saves of the same actor and tag within one
//! second overwrite each other.

use actor_bench_core::{DatasetStore, MetricKind, MetricSet, RecordStore, Result};
use chrono::{DateTime, Utc};
use tracing::info;

/// Longest store or dataset name the platform accepts.
pub const MAX_NAME_LENGTH: usize = 63;

/// Timestamp format used in record keys.
pub const RECORD_KEY_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// Timestamp format of the `datetime` column.
pub const ROW_TIME_FORMAT: &str = "%Y-%m-%dT %H:%M:%S";

/// Content type of stored records.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Join non-empty components with `-`.
pub fn join_components(components: &[&str]) -> String {
    components
        .iter()
        .filter(|c| !c.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("-")
}

/// Keep at most [`MAX_NAME_LENGTH`] trailing characters of `name`.
pub fn truncate_name(name: &str) -> String {
    let length = name.chars().count();
    name.chars()
        .skip(length.saturating_sub(MAX_NAME_LENGTH))
        .collect()
}

/// Key of a full record.
pub fn record_key(subject: &str, tag: &str, at: DateTime<Utc>) -> String {
    let timestamp = at.format(RECORD_KEY_TIME_FORMAT).to_string();
    join_components(&[subject, tag, &timestamp])
}

/// Name of the dataset holding the metrics of `subject` for `tag`.
pub fn dataset_name(kind: &str, subject: &str, tag: &str) -> String {
    truncate_name(&join_components(&[kind, subject, tag]))
}

/// Writes metric sets to platform storage.
pub struct ResultStore<'a, S> {
    sink: &'a S,
}

impl<'a, S> ResultStore<'a, S> {
    /// Create a store writing to `sink`.
    pub fn new(sink: &'a S) -> Self {
        Self { sink }
    }
}

impl<S: RecordStore> ResultStore<'_, S> {
    /// Save the full record and return its link.
    pub async fn save_full<K: MetricKind>(&self, set: &MetricSet<K>, tag: &str) -> Result<String> {
        self.save_full_at(set, tag, Utc::now()).await
    }

    /// Save the full record with an explicit timestamp.
    pub async fn save_full_at<K: MetricKind>(
        &self,
        set: &MetricSet<K>,
        tag: &str,
        at: DateTime<Utc>,
    ) -> Result<String> {
        let store_id = self.sink.get_or_create_store(&truncate_name(K::NAME)).await?;
        let key = record_key(&set.metadata().subject_name, tag, at);
        let link = self.sink.record_link(&store_id, &key);

        info!(store_id = %store_id, key = %key, link = %link, "Saving benchmark to key-value store");
        self.sink
            .set_record(&store_id, &key, &set.to_record()?, JSON_CONTENT_TYPE)
            .await?;
        Ok(link)
    }
}

impl<S: DatasetStore> ResultStore<'_, S> {
    /// Append the metrics as one dataset row and return the dataset link.
    pub async fn save_metrics<K: MetricKind>(
        &self,
        set: &MetricSet<K>,
        tag: &str,
        related_link: &str,
    ) -> Result<String> {
        self.save_metrics_at(set, tag, related_link, Utc::now()).await
    }

    /// Append the metrics with an explicit timestamp.
    pub async fn save_metrics_at<K: MetricKind>(
        &self,
        set: &MetricSet<K>,
        tag: &str,
        related_link: &str,
        at: DateTime<Utc>,
    ) -> Result<String> {
        let name = dataset_name(K::NAME, &set.metadata().subject_name, tag);
        let dataset_id = self.sink.get_or_create_dataset(&name).await?;

        let mut row = set.metrics_map();
        row.insert(
            "datetime".to_string(),
            at.format(ROW_TIME_FORMAT).to_string().into(),
        );
        row.insert("details".to_string(), related_link.into());

        let link = self.sink.items_link(&dataset_id);
        info!(dataset = %name, link = %link, "Saving benchmark metrics to dataset");
        self.sink
            .push_row(&dataset_id, &serde_json::Value::Object(row))
            .await?;
        Ok(link)
    }
}
