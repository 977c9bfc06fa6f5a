//! Collection of valid benchmark runs.
//!
//! The poller starts one run at a time, waits for it to finish and keeps it
//! only if it is suitable as a benchmark sample. Runs are never started in
//! parallel so the crawled test site is not stressed by concurrent crawls.

use actor_bench_core::{Error, Result, RunExecutor, RunHandle, RunRecord, RunRequest};
use metrics::counter;
use tracing::info;

/// Classification of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validity {
    /// Usable as a benchmark sample.
    Valid,
    /// Skipped, with the reason.
    Rejected(String),
}

impl Validity {
    /// Whether the run counts toward the target.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Decides whether a finished run is a valid benchmark sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidityRule {
    /// Reject runs that were migrated to another host while running.
    pub reject_migrated: bool,
}

impl ValidityRule {
    /// Classify a finished run.
    pub fn check(&self, run: &RunRecord) -> Validity {
        if !run.is_succeeded() {
            return Validity::Rejected(format!("status {}", run.status));
        }
        if self.reject_migrated && run.migration_count() > 0 {
            return Validity::Rejected(format!("migrated {} times", run.migration_count()));
        }
        Validity::Valid
    }
}

/// Poller configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollConfig {
    /// Maximum number of runs to start. `None` keeps trying forever.
    pub max_attempts: Option<u32>,
    /// Classification of finished runs.
    pub validity: ValidityRule,
}

/// Outcome of a polling session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Valid runs, in completion order.
    pub valid: Vec<RunHandle>,
    /// Runs that finished but were rejected.
    pub rejected: Vec<RunHandle>,
    /// Number of runs started.
    pub attempts: u32,
}

/// Starts runs until enough valid ones are collected.
pub struct RunPoller<'a, E: RunExecutor> {
    executor: &'a E,
    config: PollConfig,
}

impl<'a, E: RunExecutor> RunPoller<'a, E> {
    /// Create a poller.
    pub fn new(executor: &'a E, config: PollConfig) -> Self {
        Self { executor, config }
    }

    /// Run `subject` until `target_count` valid runs finished.
    pub async fn collect_valid_runs(
        &self,
        subject: &str,
        target_count: usize,
        request: &RunRequest,
    ) -> Result<PollReport> {
        if target_count == 0 {
            return Err(Error::invalid_input("target run count must be at least 1"));
        }

        let mut report = PollReport::default();
        while report.valid.len() < target_count {
            if let Some(max_attempts) = self.config.max_attempts {
                if report.attempts >= max_attempts {
                    return Err(Error::ExhaustedRetries {
                        attempts: report.attempts,
                        valid: report.valid.len(),
                        target: target_count,
                    });
                }
            }

            report.attempts += 1;
            info!(subject, attempt = report.attempts, "Starting actor run");
            counter!("actor_bench_run_attempts_total").increment(1);

            let run = self.executor.start(subject, request).await?;
            let finished = self
                .executor
                .wait_for_finish(&run)
                .await?
                .ok_or_else(|| Error::MissingRunData(run.to_string()))?;

            match self.config.validity.check(&finished) {
                Validity::Valid => {
                    info!(run_id = %finished.id, "Actor run successfully finished");
                    counter!("actor_bench_runs_total", "outcome" => "valid").increment(1);
                    report.valid.push(finished.id);
                }
                Validity::Rejected(reason) => {
                    // Absorbed here, it only delays reaching the target.
                    let failure = Error::TransientRunFailure {
                        run_id: finished.id.to_string(),
                        reason,
                    };
                    info!(
                        status = %finished.status,
                        migration_count = finished.migration_count(),
                        reason = %failure,
                        "Actor run not suitable for benchmark"
                    );
                    counter!("actor_bench_runs_total", "outcome" => "rejected").increment(1);
                    report.rejected.push(finished.id);
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actor_bench_adapters::memory::{InMemoryPlatform, RunScript};
    use actor_bench_core::{RunStats, RunStatus};
    use async_trait::async_trait;
    use mockall::mock;

    mock! {
        Executor {}

        #[async_trait]
        impl RunExecutor for Executor {
            async fn start(&self, subject: &str, request: &RunRequest) -> Result<RunHandle>;
            async fn wait_for_finish(&self, run: &RunHandle) -> Result<Option<RunRecord>>;
            async fn delete_subject(&self, subject: &str) -> Result<()>;
        }
    }

    fn finished(run: &RunHandle, status: RunStatus) -> RunRecord {
        RunRecord {
            id: run.clone(),
            act_id: "act-1".to_string(),
            status,
            options: serde_json::json!({}),
            stats: RunStats::default(),
        }
    }

    #[tokio::test]
    async fn test_failures_are_skipped_until_target_reached() {
        let mut executor = MockExecutor::new();
        let mut started = 0;
        executor.expect_start().times(4).returning(move |_, _| {
            started += 1;
            Ok(RunHandle::new(format!("run-{started}")))
        });
        executor.expect_wait_for_finish().times(4).returning(|run| {
            let status = match run.as_str() {
                "run-1" | "run-3" => RunStatus::Failed,
                _ => RunStatus::Succeeded,
            };
            Ok(Some(finished(run, status)))
        });

        let poller = RunPoller::new(&executor, PollConfig::default());
        let report = poller
            .collect_valid_runs("user~crawler", 2, &RunRequest::default())
            .await
            .unwrap();

        assert_eq!(report.attempts, 4);
        assert_eq!(report.valid, vec![RunHandle::new("run-2"), RunHandle::new("run-4")]);
        assert_eq!(report.rejected, vec![RunHandle::new("run-1"), RunHandle::new("run-3")]);
    }

    #[tokio::test]
    async fn test_request_is_passed_through() {
        let platform = InMemoryPlatform::new();
        let request = RunRequest::new(Some(serde_json::json!({"maxDepth": 1})), Some(8192));

        RunPoller::new(&platform, PollConfig::default())
            .collect_valid_runs("user~crawler", 1, &request)
            .await
            .unwrap();

        assert_eq!(platform.started(), vec![("user~crawler".to_string(), request)]);
    }

    #[tokio::test]
    async fn test_zero_target_is_rejected() {
        let platform = InMemoryPlatform::new();
        let result = RunPoller::new(&platform, PollConfig::default())
            .collect_valid_runs("user~crawler", 0, &RunRequest::default())
            .await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(platform.started().is_empty());
    }

    #[tokio::test]
    async fn test_missing_run_data_is_fatal() {
        let platform = InMemoryPlatform::new();
        platform.push_scripts([RunScript {
            lost: true,
            ..RunScript::with_status(RunStatus::Succeeded)
        }]);

        let result = RunPoller::new(&platform, PollConfig::default())
            .collect_valid_runs("user~crawler", 1, &RunRequest::default())
            .await;

        assert!(matches!(result, Err(Error::MissingRunData(id)) if id == "run-1"));
    }

    #[tokio::test]
    async fn test_attempt_budget_is_enforced() {
        let platform = InMemoryPlatform::new();
        platform.set_default_script(RunScript::with_status(RunStatus::Failed));
        let config = PollConfig {
            max_attempts: Some(3),
            ..PollConfig::default()
        };

        let result = RunPoller::new(&platform, config)
            .collect_valid_runs("user~crawler", 1, &RunRequest::default())
            .await;

        assert!(matches!(
            result,
            Err(Error::ExhaustedRetries {
                attempts: 3,
                valid: 0,
                target: 1
            })
        ));
        assert_eq!(platform.started().len(), 3);
    }

    #[tokio::test]
    async fn test_migration_rule() {
        let migrated = RunScript {
            migration_count: Some(1),
            ..RunScript::with_status(RunStatus::Succeeded)
        };

        let platform = InMemoryPlatform::new();
        platform.push_scripts([migrated.clone()]);
        let report = RunPoller::new(&platform, PollConfig::default())
            .collect_valid_runs("user~crawler", 1, &RunRequest::default())
            .await
            .unwrap();
        assert_eq!(report.attempts, 1);

        let platform = InMemoryPlatform::new();
        platform.push_scripts([migrated]);
        let config = PollConfig {
            validity: ValidityRule {
                reject_migrated: true,
            },
            ..PollConfig::default()
        };
        let report = RunPoller::new(&platform, config)
            .collect_valid_runs("user~crawler", 1, &RunRequest::default())
            .await
            .unwrap();
        assert_eq!(report.attempts, 2);
        assert_eq!(report.rejected, vec![RunHandle::new("run-1")]);
    }

    #[test]
    fn test_validity_rule_reasons() {
        let run = finished(&RunHandle::new("r"), RunStatus::Aborted);
        assert_eq!(
            ValidityRule::default().check(&run),
            Validity::Rejected("status ABORTED".to_string())
        );

        let mut migrated = finished(&RunHandle::new("m"), RunStatus::Succeeded);
        migrated.stats.migration_count = Some(2);
        assert!(ValidityRule::default().check(&migrated).is_valid());
        assert_eq!(
            ValidityRule { reject_migrated: true }.check(&migrated),
            Validity::Rejected("migrated 2 times".to_string())
        );
    }

    #[tokio::test]
    async fn test_platform_errors_abort_polling() {
        let mut executor = MockExecutor::new();
        executor
            .expect_start()
            .times(1)
            .returning(|_, _| Ok(RunHandle::new("run-1")));
        executor
            .expect_wait_for_finish()
            .times(1)
            .returning(|_| Err(Error::platform("502 Bad Gateway")));

        let result = RunPoller::new(&executor, PollConfig::default())
            .collect_valid_runs("user~crawler", 1, &RunRequest::default())
            .await;

        assert!(matches!(result, Err(Error::Platform(_))));
    }
}
