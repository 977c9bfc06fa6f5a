//! Crawler performance measurements.
//!
//! - `valid_result_count`: distinct `(title, url)` pairs in the run's dataset
//! - `runtime_seconds`: reported run time minus the container startup delay
//!
//! Pulling and starting the Docker image is noise that has nothing to do with
//! crawler performance, so it is removed from the runtime when the run log
//! allows measuring it. Example log:
//!
//! ```text
//! 2025-06-04T08:27:18.665Z ACTOR: Pulling Docker image of build hLtWx6tpFjza9NbRl from registry.
//! 2025-06-04T08:28:23.025Z ACTOR: Creating Docker container.
//! 2025-06-04T08:29:23.025Z ACTOR: Starting Docker container.
//! 2025-06-04T08:30:23.025Z ...
//! ```

use crate::fetcher::Measure;
use actor_bench_core::{CrawlerPerformance, Result, RunRecord, RunTracker};
use async_trait::async_trait;
use chrono::DateTime;
use futures::TryStreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

static PULL_STARTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z) ACTOR: Pulling Docker image of build")
        .expect("valid regex")
});

static CONTAINER_STARTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"ACTOR: Starting Docker container\.\r?\n(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z)")
        .expect("valid regex")
});

/// `(title, url)` identity of a dataset item, `None` if either is missing.
fn result_key(item: &serde_json::Value) -> Option<(String, String)> {
    let field = |name: &str| item.get(name).filter(|v| !v.is_null()).map(|v| match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    });
    Some((field("title")?, field("url")?))
}

/// Number of distinct `(title, url)` pairs among `items`.
pub fn count_distinct_results<'a>(items: impl IntoIterator<Item = &'a serde_json::Value>) -> usize {
    items
        .into_iter()
        .filter_map(result_key)
        .collect::<HashSet<_>>()
        .len()
}

/// Seconds between pulling the Docker image and the first log line after the
/// container started. Zero when either marker is missing.
pub fn startup_delay_secs(log: &str) -> f64 {
    let timestamp = |re: &Regex| {
        re.captures(log)
            .and_then(|c| c.get(1))
            .and_then(|m| DateTime::parse_from_rfc3339(m.as_str()).ok())
    };

    match (timestamp(&PULL_STARTED), timestamp(&CONTAINER_STARTED)) {
        (Some(start), Some(end)) => {
            let delay = (end - start).num_milliseconds() as f64 / 1000.0;
            delay.max(0.0)
        }
        _ => 0.0,
    }
}

/// Reported runtime without the startup delay, never negative.
pub fn benchmark_runtime(run_time_secs: f64, startup_delay_secs: f64) -> f64 {
    (run_time_secs - startup_delay_secs.max(0.0)).max(0.0)
}

#[async_trait]
impl Measure for CrawlerPerformance {
    async fn measure(&self, tracker: &dyn RunTracker, run: &RunRecord) -> Result<Vec<f64>> {
        let mut distinct = HashSet::new();
        let mut items = tracker.output_records(&run.id);
        while let Some(item) = items.try_next().await? {
            if let Some(key) = result_key(&item) {
                distinct.insert(key);
            }
        }

        let delay = tracker
            .get_log(&run.id)
            .await?
            .map(|log| startup_delay_secs(&log))
            .unwrap_or(0.0);
        let runtime = benchmark_runtime(run.stats.run_time_secs, delay);
        debug!(run_id = %run.id, startup_delay_secs = delay, runtime, "Measured crawler run");

        Ok(vec![distinct.len() as f64, runtime])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actor_bench_adapters::memory::{InMemoryPlatform, RunScript};
    use actor_bench_core::{RunExecutor, RunRequest, RunStatus};
    use serde_json::json;

    const LOG: &str = "2025-06-04T08:27:18.665Z ACTOR: Pulling Docker image of build hLtWx6tpFjza9NbRl from registry.\n\
2025-06-04T08:28:23.025Z ACTOR: Creating Docker container.\n\
2025-06-04T08:29:23.025Z ACTOR: Starting Docker container.\n\
2025-06-04T08:30:23.025Z INFO  Crawler started.\n";

    #[test]
    fn test_distinct_pairs() {
        let items = vec![
            json!({"title": "T1", "url": "U1"}),
            json!({"title": "T1", "url": "U1"}),
            json!({"title": "T1", "url": "U2"}),
            json!({"title": "T2", "url": "U1"}),
        ];
        assert_eq!(count_distinct_results(&items), 3);
    }

    #[test]
    fn test_items_without_title_or_url_are_not_results() {
        let items = vec![
            json!({"title": "T1", "url": "U1"}),
            json!({"url": "U2"}),
            json!({"title": "T3", "url": null}),
        ];
        assert_eq!(count_distinct_results(&items), 1);
    }

    #[test]
    fn test_startup_delay_from_log() {
        // 08:27:18.665 -> 08:30:23.025
        assert_eq!(startup_delay_secs(LOG), 184.36);
    }

    #[test]
    fn test_startup_delay_without_markers_is_zero() {
        assert_eq!(startup_delay_secs(""), 0.0);
        let only_pull = LOG.lines().next().unwrap();
        assert_eq!(startup_delay_secs(only_pull), 0.0);
        let no_pull: String = LOG.lines().skip(1).collect::<Vec<_>>().join("\n");
        assert_eq!(startup_delay_secs(&no_pull), 0.0);
    }

    #[test]
    fn test_startup_delay_never_negative() {
        let reversed = "2025-06-04T08:30:00.000Z ACTOR: Pulling Docker image of build x\n\
2025-06-04T08:20:00.000Z ACTOR: Starting Docker container.\n\
2025-06-04T08:20:01.000Z next\n";
        assert_eq!(startup_delay_secs(reversed), 0.0);
    }

    #[test]
    fn test_runtime_never_negative() {
        assert_eq!(benchmark_runtime(100.0, 40.0), 60.0);
        assert_eq!(benchmark_runtime(100.0, 184.36), 0.0);
        assert_eq!(benchmark_runtime(10.0, -5.0), 10.0);
    }

    #[tokio::test]
    async fn test_measure_subtracts_startup_delay() {
        let platform = InMemoryPlatform::new();
        platform.push_scripts([RunScript {
            run_time_secs: 200.0,
            items: vec![json!({"title": "a", "url": "b"}), json!({"title": "a", "url": "c"})],
            log: Some(LOG.to_string()),
            ..RunScript::with_status(RunStatus::Succeeded)
        }]);
        let run = platform.start("crawler", &RunRequest::default()).await.unwrap();
        let record = platform.wait_for_finish(&run).await.unwrap().unwrap();

        let values = CrawlerPerformance.measure(&platform, &record).await.unwrap();
        assert_eq!(values[0], 2.0);
        assert!((values[1] - 15.64).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_measure_when_startup_exceeds_runtime() {
        let platform = InMemoryPlatform::new();
        platform.push_scripts([RunScript {
            run_time_secs: 100.0,
            log: Some(LOG.to_string()),
            ..RunScript::with_status(RunStatus::Succeeded)
        }]);
        let run = platform.start("crawler", &RunRequest::default()).await.unwrap();
        let record = platform.wait_for_finish(&run).await.unwrap().unwrap();

        let values = CrawlerPerformance.measure(&platform, &record).await.unwrap();
        assert_eq!(values, vec![0.0, 0.0]);
    }
}
