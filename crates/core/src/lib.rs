// Copyright 2025 Actor Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Core types for actor-bench.
//!
//! - [`execution`] - remote run identity, status and statistics
//! - [`metadata`] - run metadata and the comparability relation
//! - [`metric_set`] - metric kinds and metric sets
//! - [`platform`] - collaborator traits for the remote platform
//! - [`error`] - shared error type

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod error;
pub mod execution;
pub mod metadata;
pub mod metric_set;
pub mod platform;

pub use error::{Error, Result};
pub use execution::{ActorDescriptor, InputRecord, RunHandle, RunRecord, RunRequest, RunStats, RunStatus};
pub use metadata::RunMetadata;
pub use metric_set::{CrawlerPerformance, MetricKind, MetricSet};
pub use platform::{DatasetStore, Platform, RecordStore, RunExecutor, RunTracker};
