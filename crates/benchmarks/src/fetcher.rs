//! Measurement of finished runs.
//!
//! The fetcher turns a run id into a [`MetricSet`]: it reads the run's
//! metadata from the platform (actor name, the input that was actually used,
//! run options) and lets the metric kind compute its measurements.

use actor_bench_core::{
    Error, MetricKind, MetricSet, Result, RunHandle, RunMetadata, RunRecord, RunTracker,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Caller supplied part of the run metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchContext {
    /// Contents of the actor's dependency lock file.
    pub lock_file: String,
    /// Version of the benchmark schema.
    pub benchmark_version: String,
    /// Free form annotations.
    pub custom_fields: BTreeMap<String, String>,
}

impl FetchContext {
    /// Create a context for the given benchmark version.
    pub fn new(benchmark_version: impl Into<String>) -> Self {
        Self {
            benchmark_version: benchmark_version.into(),
            ..Self::default()
        }
    }

    /// Set the lock file contents.
    pub fn with_lock_file(mut self, lock_file: impl Into<String>) -> Self {
        self.lock_file = lock_file.into();
        self
    }
}

/// A metric kind that can be measured from a finished run.
#[async_trait]
pub trait Measure: MetricKind {
    /// Compute the values of [`MetricKind::METRICS`], in order.
    async fn measure(&self, tracker: &dyn RunTracker, run: &RunRecord) -> Result<Vec<f64>>;
}

/// Builds metric sets from finished runs.
pub struct MetricFetcher<'a, T: RunTracker> {
    tracker: &'a T,
    context: FetchContext,
}

impl<'a, T: RunTracker> MetricFetcher<'a, T> {
    /// Create a fetcher.
    pub fn new(tracker: &'a T, context: FetchContext) -> Self {
        Self { tracker, context }
    }

    /// Read the metadata of a run from the platform.
    pub async fn metadata(&self, run: &RunRecord) -> Result<RunMetadata> {
        let subject_name = match self.tracker.get_actor(&run.act_id).await? {
            Some(actor) => actor.name,
            None => {
                debug!(actor_id = %run.act_id, "Actor no longer exists, using its id as name");
                run.act_id.clone()
            }
        };

        let input = self
            .tracker
            .get_input_record(&run.id)
            .await?
            .ok_or_else(|| Error::not_found(format!("INPUT record of run {}", run.id)))?;
        let input = match input.value {
            serde_json::Value::Null => serde_json::json!({}),
            value => value,
        };

        Ok(RunMetadata::builder()
            .subject_name(subject_name)
            .benchmark_version(self.context.benchmark_version.clone())
            .input_fingerprint(input)
            .run_options(run.options.clone())
            .dependency_lock_fingerprint(self.context.lock_file.clone())
            .custom_fields(self.context.custom_fields.clone())
            .build())
    }

    /// Measure one finished run.
    pub async fn fetch<K: Measure>(&self, run: &RunHandle) -> Result<MetricSet<K>> {
        let record = self
            .tracker
            .get_run(run)
            .await?
            .ok_or_else(|| Error::not_found(format!("run {run}")))?;

        let metadata = self.metadata(&record).await?;
        let values = K::default().measure(self.tracker, &record).await?;
        let set = MetricSet::from_values(metadata, values)?;

        info!(run_id = %run, benchmark = %set, "Benchmark of run");
        Ok(set)
    }

    /// Measure several runs, at most `concurrency` at a time.
    ///
    /// Results keep the order of `runs`.
    pub async fn fetch_all<K: Measure>(
        &self,
        runs: &[RunHandle],
        concurrency: usize,
    ) -> Result<Vec<MetricSet<K>>> {
        stream::iter(runs)
            .map(|run| self.fetch::<K>(run))
            .buffered(concurrency.max(1))
            .try_collect()
            .await
    }
}
