//! CLI for actor-bench.
//!
//! Deploys crawler actors, benchmarks them on the platform and stores the
//! results, or aggregates runs that already exist.

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod deploy;
mod interrupt;
pub mod telemetry;

use actor_bench_adapters::ApifyClient;
use actor_bench_benchmarks::{
    benchmark_runs, benchmark_subject, io, BenchmarkPlan, BenchmarkReport, FetchContext, PollConfig,
    ResultStore, ValidityRule,
};
use actor_bench_core::{CrawlerPerformance, RunHandle, RunRequest};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use crate::config::{BenchSettings, LogFormat};
use crate::interrupt::Interrupt;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// actor-bench CLI.
#[derive(Parser, Debug)]
#[command(name = "actor-bench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ./actor-bench.toml when present).
    #[arg(long, global = true, env = "ACTOR_BENCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log format, overrides the configured one.
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy and benchmark every actor directory matching a pattern.
    ///
    /// Each actor is pushed with the `apify` CLI, run until enough valid runs
    /// finished, and deleted afterwards.
    Run {
        /// Regex selecting actor directories by path.
        #[arg(default_value = ".*py")]
        pattern: String,

        /// Actor input as JSON.
        #[arg(short, long)]
        input: Option<String>,

        /// Tag classifying the benchmark purpose.
        #[arg(short, long, default_value = "")]
        tag: String,

        /// Valid runs per actor, overrides the configured value.
        #[arg(short, long)]
        repetitions: Option<usize>,

        /// Regenerate lock files before deploying.
        #[arg(long)]
        regenerate_lock_files: bool,

        /// Directory containing the actor directories.
        #[arg(long, default_value = ".")]
        actors_dir: PathBuf,

        /// Maximum runs started per actor, overrides the configured value.
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Write JSON and markdown reports to this directory.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Aggregate runs that already finished.
    Runs {
        /// Run ids.
        #[arg(required = true)]
        run_ids: Vec<String>,

        /// Lock file stored with the benchmark.
        #[arg(long)]
        lock_file: Option<PathBuf>,

        /// Save the aggregate to platform storage.
        #[arg(long)]
        save: bool,

        /// Tag classifying the benchmark purpose.
        #[arg(short, long, default_value = "")]
        tag: String,

        /// Write JSON and markdown reports to this directory.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the effective configuration.
    Status,
}

fn client(settings: &BenchSettings) -> Result<ApifyClient> {
    let token = settings.require_token()?;
    let client = ApifyClient::new(
        settings.api_base_url.clone(),
        token,
        Duration::from_secs(settings.request_timeout_secs),
    )?;
    Ok(client.with_retry(settings.retry_policy()))
}

fn write_outputs(output: Option<&Path>, reports: &[BenchmarkReport]) -> Result<()> {
    if let Some(dir) = output {
        io::write_all_outputs(dir, reports)
            .with_context(|| format!("cannot write reports to {}", dir.display()))?;
        println!("Reports written to {}", dir.display());
    }
    Ok(())
}

fn print_report(report: &BenchmarkReport) {
    println!("{} {}", "✓".green(), report.subject.bold());
    for (name, value) in report
        .aggregated
        .as_object()
        .into_iter()
        .flatten()
        .filter(|(_, value)| value.is_number())
    {
        println!("    {name}: {value}");
    }
    if let Some(link) = &report.record_link {
        println!("    details: {link}");
    }
}

/// Settings of the `run` command that override the configuration.
#[derive(Debug, Clone, Default)]
struct RunOptions {
    input: Option<serde_json::Value>,
    tag: String,
    repetitions: Option<usize>,
    max_attempts: Option<u32>,
    regenerate_lock_files: bool,
}

fn plan(settings: &BenchSettings, options: &RunOptions, subject: String, lock_file: String) -> BenchmarkPlan {
    BenchmarkPlan {
        subject,
        repetitions: options.repetitions.unwrap_or(settings.repetitions),
        request: RunRequest::new(options.input.clone(), Some(settings.memory_mbytes)),
        poll: PollConfig {
            max_attempts: options.max_attempts.or(settings.max_attempts),
            validity: ValidityRule {
                reject_migrated: settings.reject_migrated_runs,
            },
        },
        context: FetchContext::new(settings.benchmark_version.clone()).with_lock_file(lock_file),
        tag: options.tag.clone(),
        fetch_concurrency: settings.fetch_concurrency,
    }
}

async fn run_benchmarks(
    settings: &BenchSettings,
    pattern: &str,
    actors_dir: &Path,
    options: RunOptions,
) -> Result<Vec<BenchmarkReport>> {
    let pattern = Regex::new(pattern).with_context(|| format!("invalid actor pattern `{pattern}`"))?;
    let token = settings.require_token()?;
    deploy::login(token).await?;

    let client = client(settings)?;
    let username = client.current_username().await?;
    let interrupt = Interrupt::on_ctrl_c();

    let mut reports = Vec::new();
    for dir in deploy::discover_actor_dirs(actors_dir, &pattern)? {
        let subject = format!("{username}~{}", deploy::actor_name(&dir)?);
        info!(actor = %subject, dir = %dir.display(), "Benchmarking actor");

        if options.regenerate_lock_files {
            info!(actor = %subject, "Regenerating lock files");
            interrupt.guard(deploy::regenerate_lock_files(&dir)).await?;
        }
        interrupt.guard(deploy::push(&dir)).await?;

        let plan = plan(settings, &options, subject, deploy::read_lock_file(&dir)?);
        let report = benchmark_subject::<CrawlerPerformance, _, _>(&client, &plan, interrupt.clone().wait())
            .await
            .with_context(|| format!("benchmark of {} failed", plan.subject))?;
        print_report(&report);
        reports.push(report);
    }

    if reports.is_empty() {
        println!("{} no actor directory matches `{pattern}`", "!".yellow());
    }
    Ok(reports)
}

async fn aggregate_runs(
    settings: &BenchSettings,
    run_ids: Vec<String>,
    lock_file: Option<&Path>,
    save: bool,
    tag: &str,
) -> Result<BenchmarkReport> {
    let client = client(settings)?;
    let lock_file = match lock_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("cannot read lock file {}", path.display()))?,
        None => String::new(),
    };
    let runs: Vec<RunHandle> = run_ids.into_iter().map(RunHandle::new).collect();
    let context = FetchContext::new(settings.benchmark_version.clone()).with_lock_file(lock_file);

    let aggregated =
        benchmark_runs::<CrawlerPerformance, _>(&client, &runs, context, settings.fetch_concurrency).await?;

    let attempts = u32::try_from(runs.len()).unwrap_or(u32::MAX);
    let subject = aggregated.metadata().subject_name.clone();
    let mut report = BenchmarkReport::new(subject, runs, attempts, &aggregated)?;
    if save {
        let store = ResultStore::new(&client);
        let record_link = store.save_full(&aggregated, tag).await?;
        let metrics_link = store.save_metrics(&aggregated, tag, &record_link).await?;
        report = report.with_links(record_link, metrics_link);
    }
    Ok(report)
}

fn print_status(settings: &BenchSettings) {
    println!("{}", "actor-bench".bold());
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("API base URL:         {}", settings.api_base_url);
    println!("API token:            {}", settings.redacted_token());
    println!("Memory (MB):          {}", settings.memory_mbytes);
    println!("Repetitions:          {}", settings.repetitions);
    println!(
        "Max attempts:         {}",
        settings
            .max_attempts
            .map_or_else(|| "unbounded".to_string(), |n| n.to_string())
    );
    println!("Benchmark version:    {}", settings.benchmark_version);
    println!("Reject migrated runs: {}", settings.reject_migrated_runs);
    println!("Fetch concurrency:    {}", settings.fetch_concurrency);
    println!("Request timeout (s):  {}", settings.request_timeout_secs);
    println!(
        "Request retries:      {} (from {} ms)",
        settings.max_retries, settings.retry_base_delay_ms
    );
}

/// Run the CLI.
pub async fn run(cli: Cli) -> Result<()> {
    let settings = BenchSettings::load(cli.config.as_deref())?;
    telemetry::init_tracing(cli.log_format.unwrap_or(settings.log_format), cli.verbose);

    match cli.command {
        Commands::Run {
            pattern,
            input,
            tag,
            repetitions,
            regenerate_lock_files,
            actors_dir,
            max_attempts,
            output,
        } => {
            let input = input
                .map(|json| serde_json::from_str::<serde_json::Value>(&json))
                .transpose()
                .context("actor input is not valid JSON")?;
            let options = RunOptions {
                input,
                tag,
                repetitions,
                max_attempts,
                regenerate_lock_files,
            };

            let reports = run_benchmarks(&settings, &pattern, &actors_dir, options).await?;
            println!("Completed {} benchmarks", reports.len());
            write_outputs(output.as_deref(), &reports)
        }
        Commands::Runs {
            run_ids,
            lock_file,
            save,
            tag,
            output,
        } => {
            let report = aggregate_runs(&settings, run_ids, lock_file.as_deref(), save, &tag).await?;
            print_report(&report);
            write_outputs(output.as_deref(), std::slice::from_ref(&report))
        }
        Commands::Status => {
            print_status(&settings);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["actor-bench", "run"]).unwrap();
        match cli.command {
            Commands::Run {
                pattern,
                tag,
                repetitions,
                regenerate_lock_files,
                ..
            } => {
                assert_eq!(pattern, ".*py");
                assert_eq!(tag, "");
                assert_eq!(repetitions, None);
                assert!(!regenerate_lock_files);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_runs_requires_ids() {
        assert!(Cli::try_parse_from(["actor-bench", "runs"]).is_err());

        let cli = Cli::try_parse_from(["actor-bench", "runs", "r1", "r2", "--save", "--tag", "nightly"]).unwrap();
        match cli.command {
            Commands::Runs { run_ids, save, tag, .. } => {
                assert_eq!(run_ids, vec!["r1", "r2"]);
                assert!(save);
                assert_eq!(tag, "nightly");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_plan_applies_overrides() {
        let settings = BenchSettings {
            max_attempts: Some(20),
            reject_migrated_runs: true,
            ..BenchSettings::default()
        };
        let options = RunOptions {
            input: Some(serde_json::json!({"maxDepth": 2})),
            tag: "nightly".to_string(),
            repetitions: Some(2),
            ..RunOptions::default()
        };

        let plan = plan(&settings, &options, "user~parsel-crawler".to_string(), "lock".to_string());
        assert_eq!(plan.repetitions, 2);
        assert_eq!(plan.request.memory_mbytes, Some(8192));
        assert_eq!(plan.poll.max_attempts, Some(20));
        assert!(plan.poll.validity.reject_migrated);
        assert_eq!(plan.context.lock_file, "lock");
        assert_eq!(plan.tag, "nightly");

        let defaults = super::plan(&settings, &RunOptions::default(), "s".to_string(), String::new());
        assert_eq!(defaults.repetitions, 5);
        assert_eq!(defaults.request.input, None);
    }
}
