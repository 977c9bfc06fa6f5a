// Copyright 2025 Actor Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! In-memory platform.
//!
//! A deterministic stand-in for the remote platform. Runs finish instantly
//! with scripted statuses, and everything written to stores and datasets can
//! be inspected afterwards. Used by pipeline tests and dry runs.

use actor_bench_core::{
    ActorDescriptor, DatasetStore, InputRecord, RecordStore, Result, RunExecutor, RunHandle,
    RunRecord, RunRequest, RunStats, RunStatus, RunTracker,
};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

const LINK_BASE: &str = "memory://";

/// Everything a started run produces.
#[derive(Debug, Clone, Default)]
pub struct RunScript {
    /// Terminal status of the run.
    pub status: Option<RunStatus>,
    /// Reported duration in seconds.
    pub run_time_secs: f64,
    /// Reported migration count.
    pub migration_count: Option<u32>,
    /// Dataset items.
    pub items: Vec<serde_json::Value>,
    /// Run log.
    pub log: Option<String>,
    /// Whether the platform loses the run data after it finishes.
    pub lost: bool,
}

impl RunScript {
    /// A run finishing with `status`.
    pub fn with_status(status: RunStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// A stored key-value record.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// Record value.
    pub value: serde_json::Value,
    /// Content type it was stored with.
    pub content_type: String,
}

#[derive(Debug, Default)]
struct State {
    scripts: VecDeque<RunScript>,
    default_script: RunScript,
    actors: HashMap<String, ActorDescriptor>,
    runs: HashMap<String, RunRecord>,
    inputs: HashMap<String, serde_json::Value>,
    items: HashMap<String, Vec<serde_json::Value>>,
    logs: HashMap<String, String>,
    lost: HashSet<String>,
    started: Vec<(String, RunRequest)>,
    deleted: Vec<String>,
    stores: BTreeMap<String, String>,
    records: BTreeMap<(String, String), StoredRecord>,
    datasets: BTreeMap<String, String>,
    rows: BTreeMap<String, Vec<serde_json::Value>>,
}

/// In-memory implementation of every platform trait.
#[derive(Debug, Default)]
pub struct InMemoryPlatform {
    state: Mutex<State>,
}

impl InMemoryPlatform {
    /// Create an empty platform where every run succeeds.
    pub fn new() -> Self {
        let platform = Self::default();
        platform.lock().default_script = RunScript::with_status(RunStatus::Succeeded);
        platform
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Script used once the queued scripts are exhausted.
    pub fn set_default_script(&self, script: RunScript) {
        self.lock().default_script = script;
    }

    /// Queue scripts for the next started runs, in order.
    pub fn push_scripts(&self, scripts: impl IntoIterator<Item = RunScript>) {
        self.lock().scripts.extend(scripts);
    }

    /// Queue plain statuses for the next started runs.
    pub fn push_statuses(&self, statuses: impl IntoIterator<Item = RunStatus>) {
        let mut state = self.lock();
        let template = state.default_script.clone();
        state.scripts.extend(statuses.into_iter().map(|status| RunScript {
            status: Some(status),
            ..template.clone()
        }));
    }

    /// Register a deployed actor.
    pub fn register_actor(&self, id: impl Into<String>, name: impl Into<String>) {
        let id = id.into();
        let descriptor = ActorDescriptor {
            id: id.clone(),
            name: name.into(),
        };
        self.lock().actors.insert(id, descriptor);
    }

    /// Insert an already finished run.
    ///
    /// `input` of `None` simulates a run whose `INPUT` record is missing.
    pub fn insert_run(
        &self,
        record: RunRecord,
        input: Option<serde_json::Value>,
        items: Vec<serde_json::Value>,
        log: Option<String>,
    ) {
        let mut state = self.lock();
        let id = record.id.as_str().to_string();
        if let Some(input) = input {
            state.inputs.insert(id.clone(), input);
        }
        state.items.insert(id.clone(), items);
        if let Some(log) = log {
            state.logs.insert(id.clone(), log);
        }
        state.runs.insert(id, record);
    }

    /// Subjects and requests of every started run.
    pub fn started(&self) -> Vec<(String, RunRequest)> {
        self.lock().started.clone()
    }

    /// Subjects deleted so far.
    pub fn deleted(&self) -> Vec<String> {
        self.lock().deleted.clone()
    }

    /// Records written to the named key-value store.
    pub fn records(&self, store_name: &str) -> Vec<(String, StoredRecord)> {
        let state = self.lock();
        let Some(store_id) = state.stores.get(store_name) else {
            return Vec::new();
        };
        state
            .records
            .iter()
            .filter(|((id, _), _)| id == store_id)
            .map(|((_, key), record)| (key.clone(), record.clone()))
            .collect()
    }

    /// Rows appended to the named dataset.
    pub fn rows(&self, dataset_name: &str) -> Vec<serde_json::Value> {
        let state = self.lock();
        state
            .datasets
            .get(dataset_name)
            .and_then(|id| state.rows.get(id))
            .cloned()
            .unwrap_or_default()
    }

    /// Names of every created dataset.
    pub fn dataset_names(&self) -> Vec<String> {
        self.lock().datasets.keys().cloned().collect()
    }
}

#[async_trait]
impl RunExecutor for InMemoryPlatform {
    async fn start(&self, subject: &str, request: &RunRequest) -> Result<RunHandle> {
        let mut state = self.lock();
        let script = match state.scripts.pop_front() {
            Some(script) => script,
            None => state.default_script.clone(),
        };

        let id = format!("run-{}", state.started.len() + 1);
        let record = RunRecord {
            id: RunHandle::new(id.clone()),
            act_id: subject.to_string(),
            status: script.status.unwrap_or(RunStatus::Succeeded),
            options: serde_json::json!({ "memoryMbytes": request.memory_mbytes }),
            stats: RunStats {
                run_time_secs: script.run_time_secs,
                migration_count: script.migration_count,
            },
        };

        state.started.push((subject.to_string(), request.clone()));
        state.inputs.insert(
            id.clone(),
            request.input.clone().unwrap_or_else(|| serde_json::json!({})),
        );
        state.items.insert(id.clone(), script.items);
        if let Some(log) = script.log {
            state.logs.insert(id.clone(), log);
        }
        if script.lost {
            state.lost.insert(id.clone());
        }
        state.runs.insert(id.clone(), record);

        Ok(RunHandle::new(id))
    }

    async fn wait_for_finish(&self, run: &RunHandle) -> Result<Option<RunRecord>> {
        let state = self.lock();
        if state.lost.contains(run.as_str()) {
            return Ok(None);
        }
        Ok(state.runs.get(run.as_str()).cloned())
    }

    async fn delete_subject(&self, subject: &str) -> Result<()> {
        self.lock().deleted.push(subject.to_string());
        Ok(())
    }
}

#[async_trait]
impl RunTracker for InMemoryPlatform {
    async fn get_run(&self, run: &RunHandle) -> Result<Option<RunRecord>> {
        Ok(self.lock().runs.get(run.as_str()).cloned())
    }

    async fn get_actor(&self, actor_id: &str) -> Result<Option<ActorDescriptor>> {
        Ok(self.lock().actors.get(actor_id).cloned())
    }

    async fn get_input_record(&self, run: &RunHandle) -> Result<Option<InputRecord>> {
        Ok(self
            .lock()
            .inputs
            .get(run.as_str())
            .cloned()
            .map(|value| InputRecord { value }))
    }

    fn output_records<'a>(&'a self, run: &'a RunHandle) -> BoxStream<'a, Result<serde_json::Value>> {
        let items = self.lock().items.get(run.as_str()).cloned().unwrap_or_default();
        stream::iter(items.into_iter().map(Ok)).boxed()
    }

    async fn get_log(&self, run: &RunHandle) -> Result<Option<String>> {
        Ok(self.lock().logs.get(run.as_str()).cloned())
    }
}

#[async_trait]
impl RecordStore for InMemoryPlatform {
    async fn get_or_create_store(&self, name: &str) -> Result<String> {
        let mut state = self.lock();
        let next_id = format!("kvs-{}", state.stores.len() + 1);
        Ok(state.stores.entry(name.to_string()).or_insert(next_id).clone())
    }

    async fn set_record(
        &self,
        store_id: &str,
        key: &str,
        value: &serde_json::Value,
        content_type: &str,
    ) -> Result<()> {
        self.lock().records.insert(
            (store_id.to_string(), key.to_string()),
            StoredRecord {
                value: value.clone(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn record_link(&self, store_id: &str, key: &str) -> String {
        format!("{LINK_BASE}key-value-stores/{store_id}/records/{key}")
    }
}

#[async_trait]
impl DatasetStore for InMemoryPlatform {
    async fn get_or_create_dataset(&self, name: &str) -> Result<String> {
        let mut state = self.lock();
        let next_id = format!("ds-{}", state.datasets.len() + 1);
        Ok(state.datasets.entry(name.to_string()).or_insert(next_id).clone())
    }

    async fn push_row(&self, dataset_id: &str, row: &serde_json::Value) -> Result<()> {
        self.lock()
            .rows
            .entry(dataset_id.to_string())
            .or_default()
            .push(row.clone());
        Ok(())
    }

    fn items_link(&self, dataset_id: &str) -> String {
        format!("{LINK_BASE}datasets/{dataset_id}/items")
    }
}
