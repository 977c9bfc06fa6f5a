// Copyright 2025 Actor Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Metric sets and metric kinds.
//!
//! A [`MetricSet`] is the result of one benchmark: run metadata plus a fixed
//! list of numeric measurements. Which measurements exist is decided by the
//! set's [`MetricKind`], so generic code (aggregation, storage) never needs to
//! know the concrete schema.

use crate::error::{Error, Result};
use crate::metadata::RunMetadata;
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::marker::PhantomData;

/// Key holding the metadata in a serialized metric set.
pub const META_DATA_KEY: &str = "meta_data";

/// Declares the metrics of one kind of benchmark.
pub trait MetricKind: fmt::Debug + Clone + Default + PartialEq + Send + Sync + 'static {
    /// Kind name, used to name storage buckets.
    const NAME: &'static str;

    /// Metric names in declaration order.
    const METRICS: &'static [&'static str];

    /// Combine the values of one metric across repeated runs.
    fn reduce(_metric: &str, values: &[f64]) -> f64 {
        mean(values)
    }
}

/// Arithmetic mean, `0.0` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Crawler performance benchmark: result count and duration of a crawl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlerPerformance;

impl CrawlerPerformance {
    /// Number of distinct `(title, url)` pairs produced by the crawl.
    pub const VALID_RESULT_COUNT: &'static str = "valid_result_count";
    /// Crawl duration without container startup, in seconds.
    pub const RUNTIME_SECONDS: &'static str = "runtime_seconds";
}

impl MetricKind for CrawlerPerformance {
    const NAME: &'static str = "CrawlerPerformanceBenchmark";
    const METRICS: &'static [&'static str] = &[Self::VALID_RESULT_COUNT, Self::RUNTIME_SECONDS];
}

/// Metadata plus the measurements of one benchmark.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSet<K: MetricKind> {
    metadata: RunMetadata,
    values: Vec<f64>,
    kind: PhantomData<K>,
}

impl<K: MetricKind> MetricSet<K> {
    /// Create a metric set with every metric set to zero.
    pub fn new(metadata: RunMetadata) -> Self {
        Self {
            metadata,
            values: vec![0.0; K::METRICS.len()],
            kind: PhantomData,
        }
    }

    /// Create a metric set from values in [`MetricKind::METRICS`] order.
    pub fn from_values(metadata: RunMetadata, values: Vec<f64>) -> Result<Self> {
        if values.len() != K::METRICS.len() {
            return Err(Error::invalid_input(format!(
                "{} expects {} metrics, got {}",
                K::NAME,
                K::METRICS.len(),
                values.len()
            )));
        }
        Ok(Self {
            metadata,
            values,
            kind: PhantomData,
        })
    }

    /// Create a metric set from named values.
    ///
    /// Every declared metric must be present exactly once and no other name
    /// is accepted.
    pub fn from_metrics<I, S>(metadata: RunMetadata, metrics: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut values: Vec<Option<f64>> = vec![None; K::METRICS.len()];
        for (name, value) in metrics {
            let name = name.as_ref();
            let index = K::METRICS
                .iter()
                .position(|m| *m == name)
                .ok_or_else(|| Error::invalid_input(format!("unknown metric `{name}` for {}", K::NAME)))?;
            if values[index].replace(value).is_some() {
                return Err(Error::invalid_input(format!("duplicate metric `{name}`")));
            }
        }

        let values = values
            .into_iter()
            .zip(K::METRICS)
            .map(|(value, name)| {
                value.ok_or_else(|| Error::invalid_input(format!("missing metric `{name}`")))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::from_values(metadata, values)
    }

    /// Rebuild a metric set from its serialized record.
    pub fn from_record(record: &serde_json::Value) -> Result<Self> {
        let object = record
            .as_object()
            .ok_or_else(|| Error::invalid_input("benchmark record must be a JSON object"))?;
        let metadata = object
            .get(META_DATA_KEY)
            .cloned()
            .ok_or_else(|| Error::invalid_input("benchmark record has no meta_data"))?;
        let metadata: RunMetadata = serde_json::from_value(metadata)?;

        let values = K::METRICS
            .iter()
            .map(|name| {
                object
                    .get(*name)
                    .and_then(|v| v.as_f64())
                    .ok_or_else(|| Error::invalid_input(format!("missing metric `{name}`")))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::from_values(metadata, values)
    }

    /// Kind name of this metric set.
    pub fn kind_name(&self) -> &'static str {
        K::NAME
    }

    /// Run metadata.
    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    /// Value of the named metric.
    pub fn metric(&self, name: &str) -> Option<f64> {
        K::METRICS
            .iter()
            .position(|m| *m == name)
            .map(|index| self.values[index])
    }

    /// Values in declaration order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Named values in declaration order.
    pub fn metrics(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        K::METRICS.iter().copied().zip(self.values.iter().copied())
    }

    /// Flat `name -> value` JSON object.
    pub fn metrics_map(&self) -> serde_json::Map<String, serde_json::Value> {
        self.metrics()
            .map(|(name, value)| (name.to_string(), serde_json::Value::from(value)))
            .collect()
    }

    /// Full record: `meta_data` plus one key per metric.
    pub fn to_record(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

impl<K: MetricKind> Serialize for MetricSet<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1 + self.values.len()))?;
        map.serialize_entry(META_DATA_KEY, &self.metadata)?;
        for (name, value) in self.metrics() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

impl<'de, K: MetricKind> Deserialize<'de> for MetricSet<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let record = serde_json::Value::deserialize(deserializer)?;
        Self::from_record(&record).map_err(serde::de::Error::custom)
    }
}

impl<K: MetricKind> fmt::Display for MetricSet<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Actor: {}", self.metadata.subject_name)?;
        for (name, value) in self.metrics() {
            write!(f, ", {name}: {value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> RunMetadata {
        RunMetadata::builder()
            .subject_name("parsel-crawler")
            .benchmark_version("1")
            .build()
    }

    #[test]
    fn test_new_metric_set_is_zeroed() {
        let set = MetricSet::<CrawlerPerformance>::new(metadata());
        assert_eq!(set.values(), &[0.0, 0.0]);
        assert_eq!(set.kind_name(), "CrawlerPerformanceBenchmark");
    }

    #[test]
    fn test_from_metrics_follows_declaration_order() {
        let set = MetricSet::<CrawlerPerformance>::from_metrics(
            metadata(),
            [("runtime_seconds", 12.5), ("valid_result_count", 40.0)],
        )
        .unwrap();

        assert_eq!(set.values(), &[40.0, 12.5]);
        assert_eq!(set.metric(CrawlerPerformance::RUNTIME_SECONDS), Some(12.5));
        assert_eq!(set.metric("throughput"), None);
    }

    #[test]
    fn test_from_metrics_rejects_schema_violations() {
        let unknown = MetricSet::<CrawlerPerformance>::from_metrics(
            metadata(),
            [("valid_result_count", 1.0), ("runtime_seconds", 1.0), ("cpu", 1.0)],
        );
        assert!(matches!(unknown, Err(Error::InvalidInput(_))));

        let missing =
            MetricSet::<CrawlerPerformance>::from_metrics(metadata(), [("runtime_seconds", 1.0)]);
        assert!(matches!(missing, Err(Error::InvalidInput(_))));

        let wrong_len = MetricSet::<CrawlerPerformance>::from_values(metadata(), vec![1.0]);
        assert!(matches!(wrong_len, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_record_shape() {
        let set =
            MetricSet::<CrawlerPerformance>::from_values(metadata(), vec![3.0, 20.0]).unwrap();
        let record = set.to_record().unwrap();

        assert_eq!(record["meta_data"]["actor_name"], "parsel-crawler");
        assert_eq!(record["valid_result_count"], 3.0);
        assert_eq!(record["runtime_seconds"], 20.0);
        assert_eq!(record.as_object().unwrap().len(), 3);

        let restored = MetricSet::<CrawlerPerformance>::from_record(&record).unwrap();
        assert_eq!(restored.values(), set.values());
        assert_eq!(restored.metadata().created_at, set.metadata().created_at);
    }

    #[test]
    fn test_display() {
        let set =
            MetricSet::<CrawlerPerformance>::from_values(metadata(), vec![3.0, 20.5]).unwrap();
        assert_eq!(
            set.to_string(),
            "Actor: parsel-crawler, valid_result_count: 3, runtime_seconds: 20.5"
        );
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[10.0, 20.0, 30.0]), 20.0);
        assert_eq!(mean(&[]), 0.0);
    }
}
