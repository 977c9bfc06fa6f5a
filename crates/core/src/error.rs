// Copyright 2025 Actor Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types shared by every actor-bench crate.

use thiserror::Error;

/// Errors produced while collecting, measuring, aggregating or storing
/// benchmark runs.
#[derive(Debug, Error)]
pub enum Error {
    /// A run, actor or record is absent from the remote platform.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller passed something that cannot be processed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Metric sets with diverging metadata were passed to one aggregation.
    #[error("Incompatible benchmarks: entry {index} differs from entry 0 in `{field}`")]
    IncompatibleInputs {
        /// Position of the first diverging entry.
        index: usize,
        /// Name of the first metadata field that differs.
        field: &'static str,
    },

    /// A polled run finished in a state that makes it unusable as a sample.
    #[error("Run {run_id} is not suitable for a benchmark: {reason}")]
    TransientRunFailure {
        /// The rejected run.
        run_id: String,
        /// Human readable rejection reason.
        reason: String,
    },

    /// The platform did not return terminal data for a started run.
    #[error("Missing run data for run {0}")]
    MissingRunData(String),

    /// The attempt budget ran out before enough valid runs were collected.
    #[error("Gave up after {attempts} attempts with {valid} of {target} valid runs")]
    ExhaustedRetries {
        /// Number of runs started.
        attempts: u32,
        /// Valid runs collected so far.
        valid: usize,
        /// Requested number of valid runs.
        target: usize,
    },

    /// The benchmark was interrupted before it completed.
    #[error("Benchmark interrupted")]
    Interrupted,

    /// Transport or API failure reported by the remote platform.
    #[error("Platform error: {0}")]
    Platform(String),

    /// JSON encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a [`Error::NotFound`].
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an [`Error::InvalidInput`].
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an [`Error::Platform`].
    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform(msg.into())
    }

    /// Whether the error only concerns a single discarded run.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientRunFailure { .. })
    }
}

/// Result type for actor-bench operations.
pub type Result<T> = std::result::Result<T, Error>;
