// Copyright 2025 Actor Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run metadata and the comparability relation.
//!
//! Two benchmarks may only be aggregated when their metadata is compatible:
//! every field except the dependency lock file, the creation time and the
//! custom annotations must be equal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity and configuration of a single benchmarked execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Name of the executed actor.
    #[serde(rename = "actor_name")]
    pub subject_name: String,
    /// Version of the measurement schema.
    pub benchmark_version: String,
    /// Input the actor was started with.
    #[serde(rename = "actor_inputs", default = "empty_object")]
    pub input_fingerprint: serde_json::Value,
    /// Execution options, e.g. memory allocation.
    #[serde(default = "empty_object")]
    pub run_options: serde_json::Value,
    /// Exact dependency versions used by the actor. Informational only.
    #[serde(rename = "actor_lock_file", default)]
    pub dependency_lock_fingerprint: String,
    /// When this metadata was constructed.
    #[serde(rename = "created")]
    pub created_at: DateTime<Utc>,
    /// Caller supplied annotations.
    #[serde(default)]
    pub custom_fields: BTreeMap<String, String>,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl Default for RunMetadata {
    fn default() -> Self {
        Self {
            subject_name: String::new(),
            benchmark_version: String::new(),
            input_fingerprint: empty_object(),
            run_options: empty_object(),
            dependency_lock_fingerprint: String::new(),
            created_at: Utc::now(),
            custom_fields: BTreeMap::new(),
        }
    }
}

impl RunMetadata {
    /// Create a new builder.
    pub fn builder() -> RunMetadataBuilder {
        RunMetadataBuilder::default()
    }

    /// Name of the first compared field that differs from `other`.
    ///
    /// Returns `None` when both are compatible.
    pub fn first_difference(&self, other: &Self) -> Option<&'static str> {
        if self.subject_name != other.subject_name {
            Some("actor_name")
        } else if self.benchmark_version != other.benchmark_version {
            Some("benchmark_version")
        } else if self.input_fingerprint != other.input_fingerprint {
            Some("actor_inputs")
        } else if self.run_options != other.run_options {
            Some("run_options")
        } else {
            None
        }
    }

    /// Whether metrics of both runs may be aggregated together.
    pub fn is_compatible(&self, other: &Self) -> bool {
        self.first_difference(other).is_none()
    }
}

impl PartialEq for RunMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.is_compatible(other)
    }
}

/// Builder for [`RunMetadata`].
#[derive(Default)]
pub struct RunMetadataBuilder {
    subject_name: String,
    benchmark_version: String,
    input_fingerprint: Option<serde_json::Value>,
    run_options: Option<serde_json::Value>,
    dependency_lock_fingerprint: String,
    created_at: Option<DateTime<Utc>>,
    custom_fields: BTreeMap<String, String>,
}

impl RunMetadataBuilder {
    /// Set the actor name.
    pub fn subject_name(mut self, name: impl Into<String>) -> Self {
        self.subject_name = name.into();
        self
    }

    /// Set the benchmark version.
    pub fn benchmark_version(mut self, version: impl Into<String>) -> Self {
        self.benchmark_version = version.into();
        self
    }

    /// Set the actor input.
    pub fn input_fingerprint(mut self, input: serde_json::Value) -> Self {
        self.input_fingerprint = Some(input);
        self
    }

    /// Set the run options.
    pub fn run_options(mut self, options: serde_json::Value) -> Self {
        self.run_options = Some(options);
        self
    }

    /// Set the dependency lock file contents.
    pub fn dependency_lock_fingerprint(mut self, lock: impl Into<String>) -> Self {
        self.dependency_lock_fingerprint = lock.into();
        self
    }

    /// Set the creation time. Defaults to `Utc::now()` if not set.
    pub fn created_at(mut self, time: DateTime<Utc>) -> Self {
        self.created_at = Some(time);
        self
    }

    /// Add a custom annotation.
    pub fn custom_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_fields.insert(key.into(), value.into());
        self
    }

    /// Replace all custom annotations.
    pub fn custom_fields(mut self, fields: BTreeMap<String, String>) -> Self {
        self.custom_fields = fields;
        self
    }

    /// Build the [`RunMetadata`].
    pub fn build(self) -> RunMetadata {
        RunMetadata {
            subject_name: self.subject_name,
            benchmark_version: self.benchmark_version,
            input_fingerprint: self.input_fingerprint.unwrap_or_else(empty_object),
            run_options: self.run_options.unwrap_or_else(empty_object),
            dependency_lock_fingerprint: self.dependency_lock_fingerprint,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            custom_fields: self.custom_fields,
        }
    }
}
