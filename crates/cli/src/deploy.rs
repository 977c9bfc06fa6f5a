//! Local actor sources and deployment through the `apify` CLI.
//!
//! An actor directory contains `.actor/actor.json` with the actor name and,
//! for Python or JavaScript actors, a dependency lock file whose contents are
//! stored with the benchmark.

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Actor configuration file, relative to the actor directory.
pub const ACTOR_CONFIG: &str = ".actor/actor.json";

/// Dependency lock files, in lookup order.
pub const LOCK_FILES: [&str; 2] = ["uv.lock", "package-lock.json"];

#[derive(Debug, Deserialize)]
struct ActorConfig {
    name: String,
}

/// Subdirectories of `root` whose path matches `pattern`, sorted.
pub fn discover_actor_dirs(root: &Path, pattern: &Regex) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(root)
        .with_context(|| format!("cannot list actor directory {}", root.display()))?;

    let mut dirs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() && pattern.is_match(&path.to_string_lossy()) {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Name declared in the actor's `.actor/actor.json`.
pub fn actor_name(dir: &Path) -> Result<String> {
    let path = dir.join(ACTOR_CONFIG);
    let content = fs::read_to_string(&path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let config: ActorConfig = serde_json::from_str(&content)
        .with_context(|| format!("invalid actor configuration {}", path.display()))?;
    Ok(config.name)
}

/// Contents of the first lock file found in `dir`, empty if there is none.
pub fn read_lock_file(dir: &Path) -> Result<String> {
    for name in LOCK_FILES {
        let path = dir.join(name);
        if path.is_file() {
            return fs::read_to_string(&path)
                .with_context(|| format!("cannot read {}", path.display()));
        }
    }
    Ok(String::new())
}

async fn run_command(program: &str, args: &[&str], cwd: Option<&Path>, shown: &str) -> Result<()> {
    let mut command = Command::new(program);
    command.args(args).kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    debug!(command = shown, "Running command");
    let output = command
        .output()
        .await
        .with_context(|| format!("cannot run `{shown}`, is `{program}` installed?"))?;

    if !output.status.success() {
        bail!(
            "`{shown}` failed with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

/// Log the `apify` CLI in with `token`.
pub async fn login(token: &str) -> Result<()> {
    run_command("apify", &["login", "-t", token], None, "apify login").await
}

/// Build and deploy the actor in `dir`.
pub async fn push(dir: &Path) -> Result<()> {
    info!(dir = %dir.display(), "Building actor");
    run_command(
        "apify",
        &["push", "--force", "--no-prompt"],
        Some(dir),
        "apify push --force --no-prompt",
    )
    .await
}

/// Regenerate the lock files present in `dir` so unpinned dependencies update.
pub async fn regenerate_lock_files(dir: &Path) -> Result<()> {
    if dir.join("uv.lock").is_file() {
        run_command("uv", &["lock"], Some(dir), "uv lock").await?;
    }
    if dir.join("package-lock.json").is_file() {
        run_command(
            "npm",
            &["install", "--package-lock"],
            Some(dir),
            "npm install --package-lock",
        )
        .await?;
    }
    Ok(())
}
