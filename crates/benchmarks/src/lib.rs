//! Benchmarking of crawler actors.
//!
//! A benchmark runs an actor several times, measures every valid run,
//! aggregates the measurements and stores the aggregate in two places: a full
//! record with metadata and a time series row with the metrics only.
//!
//! # Quick Start
//!
//! ```no_run
//! use actor_bench_adapters::ApifyClient;
//! use actor_bench_benchmarks::{benchmark_subject, BenchmarkPlan};
//! use actor_bench_core::CrawlerPerformance;
//!
//! # async fn example(client: ApifyClient) -> actor_bench_core::Result<()> {
//! let plan = BenchmarkPlan::new("user~parsel-crawler", 5);
//! let report = benchmark_subject::<CrawlerPerformance, _, _>(
//!     &client,
//!     &plan,
//!     std::future::pending(),
//! )
//! .await?;
//! println!("{:?}", report.metric("runtime_seconds"));
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`poller`] - collects valid runs
//! - [`fetcher`] - turns runs into metric sets
//! - [`crawler`] - crawler performance measurements
//! - [`aggregate`] - combines metric sets
//! - [`store`] - persists aggregated metric sets
//! - [`result`] - the `BenchmarkReport` struct
//! - [`io`] - reading and writing reports
//! - [`markdown`] - markdown report generation

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod aggregate;
pub mod crawler;
pub mod fetcher;
pub mod io;
pub mod markdown;
pub mod poller;
pub mod result;
pub mod store;

pub use aggregate::aggregate;
pub use fetcher::{FetchContext, Measure, MetricFetcher};
pub use poller::{PollConfig, PollReport, RunPoller, Validity, ValidityRule};
pub use result::BenchmarkReport;
pub use store::ResultStore;

use actor_bench_core::{Error, MetricSet, Platform, Result, RunHandle, RunRequest, RunTracker};
use std::future::Future;
use tracing::{info, warn};

/// Everything needed to benchmark one deployed actor.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkPlan {
    /// Actor to run, e.g. `user~parsel-crawler`.
    pub subject: String,
    /// Number of valid runs to collect.
    pub repetitions: usize,
    /// Input and options of every run.
    pub request: RunRequest,
    /// Polling behaviour.
    pub poll: PollConfig,
    /// Caller supplied metadata.
    pub context: FetchContext,
    /// Optional tag distinguishing benchmark series.
    pub tag: String,
    /// How many runs are measured at once.
    pub fetch_concurrency: usize,
}

impl BenchmarkPlan {
    /// A plan with default settings.
    pub fn new(subject: impl Into<String>, repetitions: usize) -> Self {
        Self {
            subject: subject.into(),
            repetitions,
            request: RunRequest::default(),
            poll: PollConfig::default(),
            context: FetchContext::new("1"),
            tag: String::new(),
            fetch_concurrency: 1,
        }
    }
}

/// Measure existing runs and aggregate them.
pub async fn benchmark_runs<K: Measure, T: RunTracker>(
    tracker: &T,
    runs: &[RunHandle],
    context: FetchContext,
    concurrency: usize,
) -> Result<MetricSet<K>> {
    let sets = MetricFetcher::new(tracker, context)
        .fetch_all::<K>(runs, concurrency)
        .await?;
    let aggregated = aggregate(&sets)?;
    info!(runs = runs.len(), benchmark = %aggregated, "Aggregated benchmark");
    Ok(aggregated)
}

async fn execute<K: Measure, P: Platform>(platform: &P, plan: &BenchmarkPlan) -> Result<BenchmarkReport> {
    let polled = RunPoller::new(platform, plan.poll.clone())
        .collect_valid_runs(&plan.subject, plan.repetitions, &plan.request)
        .await?;
    info!(
        subject = %plan.subject,
        valid = polled.valid.len(),
        rejected = polled.rejected.len(),
        "Collected benchmark runs"
    );

    let aggregated =
        benchmark_runs::<K, P>(platform, &polled.valid, plan.context.clone(), plan.fetch_concurrency)
            .await?;

    let store = ResultStore::new(platform);
    let record_link = store.save_full(&aggregated, &plan.tag).await?;
    let metrics_link = store.save_metrics(&aggregated, &plan.tag, &record_link).await?;

    Ok(
        BenchmarkReport::new(plan.subject.clone(), polled.valid, polled.attempts, &aggregated)?
            .with_links(record_link, metrics_link),
    )
}

/// Benchmark a deployed actor end to end.
///
/// Polls valid runs, measures and aggregates them and saves the aggregate.
/// The actor is deleted afterwards whether the benchmark succeeded, failed or
/// `interrupt` completed first. Runs already started on the platform are left
/// to finish on their own.
///
/// A failed deletion is logged and does not hide the benchmark outcome.
pub async fn benchmark_subject<K, P, F>(
    platform: &P,
    plan: &BenchmarkPlan,
    interrupt: F,
) -> Result<BenchmarkReport>
where
    K: Measure,
    P: Platform,
    F: Future<Output = ()>,
{
    let outcome = tokio::select! {
        biased;
        () = interrupt => {
            warn!(subject = %plan.subject, "Benchmark interrupted");
            Err(Error::Interrupted)
        }
        outcome = execute::<K, P>(platform, plan) => outcome,
    };

    match platform.delete_subject(&plan.subject).await {
        Ok(()) => info!(subject = %plan.subject, "Deleted actor"),
        Err(err) => warn!(subject = %plan.subject, error = %err, "Failed to delete actor"),
    }

    outcome
}
