// Copyright 2025 Actor Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Remote run types.
//!
//! A benchmark run is one execution of an actor on the remote platform. These
//! types mirror the subset of the platform's run object that benchmarking
//! needs: identity, status, execution options and runtime statistics.
//!
//! # Lifecycle
//!
//! ```text
//! READY -> RUNNING -> SUCCEEDED
//!                  -> FAILED
//!                  -> TIMING-OUT -> TIMED-OUT
//!                  -> ABORTING   -> ABORTED
//! ```
//!
//! Only `SUCCEEDED` runs can become benchmark samples.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a remote run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunHandle(String);

impl RunHandle {
    /// Create a new run handle.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RunHandle {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Status of a remote run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run is queued.
    #[serde(rename = "READY")]
    Ready,
    /// Run is executing.
    #[serde(rename = "RUNNING")]
    Running,
    /// Run finished successfully.
    #[serde(rename = "SUCCEEDED")]
    Succeeded,
    /// Run failed.
    #[serde(rename = "FAILED")]
    Failed,
    /// Run is being stopped because it exceeded its timeout.
    #[serde(rename = "TIMING-OUT")]
    TimingOut,
    /// Run exceeded its timeout.
    #[serde(rename = "TIMED-OUT")]
    TimedOut,
    /// Run is being aborted.
    #[serde(rename = "ABORTING")]
    Aborting,
    /// Run was aborted.
    #[serde(rename = "ABORTED")]
    Aborted,
    /// Any status this client does not know about.
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Whether no further progress can happen in this state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::TimedOut | Self::Aborted
        )
    }

    /// Platform spelling of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::TimingOut => "TIMING-OUT",
            Self::TimedOut => "TIMED-OUT",
            Self::Aborting => "ABORTING",
            Self::Aborted => "ABORTED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime statistics reported for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    /// Wall-clock execution duration in seconds.
    #[serde(default)]
    pub run_time_secs: f64,
    /// Number of times the run was migrated to another host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_count: Option<u32>,
}

/// A run as reported by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    /// Run id.
    pub id: RunHandle,
    /// Id of the actor that was executed.
    pub act_id: String,
    /// Current status.
    pub status: RunStatus,
    /// Execution options (memory, build, timeout, ...).
    #[serde(default)]
    pub options: serde_json::Value,
    /// Runtime statistics.
    #[serde(default)]
    pub stats: RunStats,
}

impl RunRecord {
    /// Whether the run finished successfully.
    pub fn is_succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    /// Number of migrations, zero when the platform does not report it.
    pub fn migration_count(&self) -> u32 {
        self.stats.migration_count.unwrap_or(0)
    }
}

/// Parameters passed unmodified to the remote executor for every run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Actor input, `None` lets the actor use its defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,
    /// Memory ceiling in megabytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mbytes: Option<u32>,
}

impl RunRequest {
    /// Create a request with the given input and memory ceiling.
    pub fn new(input: Option<serde_json::Value>, memory_mbytes: Option<u32>) -> Self {
        Self {
            input,
            memory_mbytes,
        }
    }
}

/// Descriptor of a deployed actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorDescriptor {
    /// Actor id.
    pub id: String,
    /// Human readable actor name.
    pub name: String,
}

/// Record stored in a run's default key-value store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRecord {
    /// Stored value.
    #[serde(default)]
    pub value: serde_json::Value,
}
