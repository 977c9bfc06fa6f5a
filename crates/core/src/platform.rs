// Copyright 2025 Actor Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Collaborator traits for the remote actor platform.
//!
//! The benchmarking core never talks HTTP itself. It is written against these
//! traits, which are implemented by the Apify REST client and by the
//! in-memory platform used in tests.

use crate::error::Result;
use crate::execution::{ActorDescriptor, InputRecord, RunHandle, RunRecord, RunRequest};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Starts runs, waits for them and removes benchmarked actors.
#[async_trait]
pub trait RunExecutor: Send + Sync {
    /// Start one run of `subject`.
    async fn start(&self, subject: &str, request: &RunRequest) -> Result<RunHandle>;

    /// Block until the run reaches a terminal state.
    ///
    /// `None` means the platform did not return any run data.
    async fn wait_for_finish(&self, run: &RunHandle) -> Result<Option<RunRecord>>;

    /// Delete the benchmarked actor.
    async fn delete_subject(&self, subject: &str) -> Result<()>;
}

/// Read access to finished runs.
#[async_trait]
pub trait RunTracker: Send + Sync {
    /// Fetch a run by id.
    async fn get_run(&self, run: &RunHandle) -> Result<Option<RunRecord>>;

    /// Fetch an actor by id.
    async fn get_actor(&self, actor_id: &str) -> Result<Option<ActorDescriptor>>;

    /// Fetch the `INPUT` record the run was started with.
    async fn get_input_record(&self, run: &RunHandle) -> Result<Option<InputRecord>>;

    /// Lazily iterate the items of the run's default dataset.
    ///
    /// Every call starts a fresh iteration from the first item.
    fn output_records<'a>(&'a self, run: &'a RunHandle) -> BoxStream<'a, Result<serde_json::Value>>;

    /// Fetch the full run log.
    async fn get_log(&self, run: &RunHandle) -> Result<Option<String>>;
}

/// Durable key-value storage.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Return the id of the store named `name`, creating it if absent.
    async fn get_or_create_store(&self, name: &str) -> Result<String>;

    /// Write `value` under `key`.
    async fn set_record(
        &self,
        store_id: &str,
        key: &str,
        value: &serde_json::Value,
        content_type: &str,
    ) -> Result<()>;

    /// Public link to a stored record.
    fn record_link(&self, store_id: &str, key: &str) -> String;
}

/// Durable append-only tables.
#[async_trait]
pub trait DatasetStore: Send + Sync {
    /// Return the id of the dataset named `name`, creating it if absent.
    async fn get_or_create_dataset(&self, name: &str) -> Result<String>;

    /// Append one row.
    async fn push_row(&self, dataset_id: &str, row: &serde_json::Value) -> Result<()>;

    /// Public link to the dataset contents.
    fn items_link(&self, dataset_id: &str) -> String;
}

/// Everything a full benchmark needs from the platform.
pub trait Platform: RunExecutor + RunTracker + RecordStore + DatasetStore {}

impl<T> Platform for T where T: RunExecutor + RunTracker + RecordStore + DatasetStore {}
