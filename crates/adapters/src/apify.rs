// Copyright 2025 Actor Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Apify REST API adapter.
//!
//! Implements every platform collaborator trait against the Apify v2 API.
//! Missing resources (HTTP 404) are reported as `None`. Throttling (429),
//! server errors (5xx), timeouts and refused connections are retried with
//! exponential backoff according to the client's [`RetryPolicy`]; every other
//! failure, and the last one once retries run out, becomes [`Error::Platform`].
//!
//! # Example
//!
//! ```ignore
//! use actor_bench_adapters::apify::ApifyClient;
//!
//! let client = ApifyClient::new(DEFAULT_BASE_URL, token, Duration::from_secs(120))?;
//! let run = client.start("user~parsel-crawler", &RunRequest::default()).await?;
//! let finished = client.wait_for_finish(&run).await?;
//! ```

use actor_bench_core::{
    ActorDescriptor, DatasetStore, Error, InputRecord, RecordStore, Result, RunExecutor,
    RunHandle, RunRecord, RunRequest, RunStatus, RunTracker,
};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, warn};

/// Public Apify API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.apify.com";

/// Seconds the server may hold a `waitForFinish` request open.
const WAIT_FOR_FINISH_SECS: u32 = 60;

/// Dataset items fetched per page.
const PAGE_SIZE: usize = 1000;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

/// Dataset pagination cursor.
#[derive(Debug, Default)]
struct Page {
    offset: usize,
    buffer: VecDeque<serde_json::Value>,
    exhausted: bool,
}

#[derive(Debug, Deserialize)]
struct User {
    username: String,
}

/// Backoff for transient HTTP failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry, doubled for every further one.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (zero based).
    pub fn delay(&self, retry: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(retry.min(16)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Client for the Apify v2 API.
#[derive(Debug, Clone)]
pub struct ApifyClient {
    http: Client,
    base_url: String,
    token: String,
    retry: RetryPolicy,
}

impl ApifyClient {
    /// Create a client.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        // waitForFinish holds requests open, keep the client timeout above it.
        let timeout = timeout.max(Duration::from_secs(u64::from(WAIT_FOR_FINISH_SECS) + 10));
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("actor-bench/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(transport)?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Base URL of the API.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v2/{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.token)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Option<Response>> {
        let builder = self.authorized(builder);
        let mut retry = 0;
        loop {
            let request = builder
                .try_clone()
                .ok_or_else(|| Error::platform("request body cannot be replayed"))?;
            let outcome = request.send().await;

            let transient = match &outcome {
                Ok(response) if is_transient_status(response.status()) => {
                    Some(response.status().to_string())
                }
                Err(err) if err.is_timeout() || err.is_connect() => Some(err.to_string()),
                _ => None,
            };
            if let Some(reason) = transient {
                if retry < self.retry.max_retries {
                    let delay = self.retry.delay(retry);
                    retry += 1;
                    warn!(retry, delay_ms = delay.as_millis() as u64, %reason, "Retrying platform request");
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }

            let response = outcome.map_err(transport)?;
            if response.status() == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            return Ok(Some(response.error_for_status().map_err(transport)?));
        }
    }

    async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<Option<T>> {
        match self.send(builder).await? {
            Some(response) => Ok(Some(response.json::<T>().await.map_err(transport)?)),
            None => Ok(None),
        }
    }

    async fn data<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<Option<T>> {
        Ok(self.json::<Envelope<T>>(builder).await?.map(|e| e.data))
    }

    async fn create_named(&self, collection: &str, name: &str) -> Result<String> {
        let builder = self.http.post(self.url(collection)).query(&[("name", name)]);
        self.data::<Created>(builder)
            .await?
            .map(|created| created.id)
            .ok_or_else(|| Error::platform(format!("cannot create {collection} `{name}`")))
    }

    /// Name of the user owning the API token.
    pub async fn current_username(&self) -> Result<String> {
        self.data::<User>(self.http.get(self.url("users/me")))
            .await?
            .map(|user| user.username)
            .ok_or_else(|| Error::not_found("user data"))
    }

    async fn next_item(
        &self,
        run: &RunHandle,
        mut page: Page,
    ) -> Result<Option<(serde_json::Value, Page)>> {
        loop {
            if let Some(item) = page.buffer.pop_front() {
                return Ok(Some((item, page)));
            }
            if page.exhausted {
                return Ok(None);
            }
            let builder = self
                .http
                .get(self.url(&format!("actor-runs/{run}/dataset/items")))
                .query(&[("offset", page.offset), ("limit", PAGE_SIZE)]);
            let items = self
                .json::<Vec<serde_json::Value>>(builder)
                .await?
                .unwrap_or_default();
            page.exhausted = items.len() < PAGE_SIZE;
            page.offset += items.len();
            page.buffer.extend(items);
        }
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn transport(err: reqwest::Error) -> Error {
    Error::platform(err.to_string())
}

#[async_trait]
impl RunExecutor for ApifyClient {
    async fn start(&self, subject: &str, request: &RunRequest) -> Result<RunHandle> {
        let mut builder = self.http.post(self.url(&format!("acts/{subject}/runs")));
        if let Some(memory) = request.memory_mbytes {
            builder = builder.query(&[("memory", memory)]);
        }
        if let Some(input) = &request.input {
            builder = builder.json(input);
        }

        let run = self
            .data::<RunRecord>(builder)
            .await?
            .ok_or_else(|| Error::not_found(format!("actor {subject}")))?;
        debug!(run_id = %run.id, subject, "Run started");
        Ok(run.id)
    }

    async fn wait_for_finish(&self, run: &RunHandle) -> Result<Option<RunRecord>> {
        loop {
            let builder = self
                .http
                .get(self.url(&format!("actor-runs/{run}")))
                .query(&[("waitForFinish", WAIT_FOR_FINISH_SECS)]);
            match self.data::<RunRecord>(builder).await? {
                Some(record) if record.status.is_terminal() => return Ok(Some(record)),
                Some(record) if record.status == RunStatus::Unknown => {
                    warn!(run_id = %run, "Run reported an unrecognized status, treating it as final");
                    return Ok(Some(record));
                }
                Some(record) => debug!(run_id = %run, status = %record.status, "Run still in progress"),
                None => return Ok(None),
            }
        }
    }

    async fn delete_subject(&self, subject: &str) -> Result<()> {
        self.send(self.http.delete(self.url(&format!("acts/{subject}"))))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RunTracker for ApifyClient {
    async fn get_run(&self, run: &RunHandle) -> Result<Option<RunRecord>> {
        self.data(self.http.get(self.url(&format!("actor-runs/{run}"))))
            .await
    }

    async fn get_actor(&self, actor_id: &str) -> Result<Option<ActorDescriptor>> {
        self.data(self.http.get(self.url(&format!("acts/{actor_id}"))))
            .await
    }

    async fn get_input_record(&self, run: &RunHandle) -> Result<Option<InputRecord>> {
        let builder = self
            .http
            .get(self.url(&format!("actor-runs/{run}/key-value-store/records/INPUT")));
        Ok(self
            .json::<serde_json::Value>(builder)
            .await?
            .map(|value| InputRecord { value }))
    }

    fn output_records<'a>(&'a self, run: &'a RunHandle) -> BoxStream<'a, Result<serde_json::Value>> {
        stream::try_unfold(Page::default(), move |page| self.next_item(run, page)).boxed()
    }

    async fn get_log(&self, run: &RunHandle) -> Result<Option<String>> {
        match self.send(self.http.get(self.url(&format!("actor-runs/{run}/log")))).await? {
            Some(response) => Ok(Some(response.text().await.map_err(transport)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RecordStore for ApifyClient {
    async fn get_or_create_store(&self, name: &str) -> Result<String> {
        self.create_named("key-value-stores", name).await
    }

    async fn set_record(
        &self,
        store_id: &str,
        key: &str,
        value: &serde_json::Value,
        content_type: &str,
    ) -> Result<()> {
        let body = serde_json::to_vec(value)?;
        let builder = self
            .http
            .put(self.url(&format!("key-value-stores/{store_id}/records/{key}")))
            .header(header::CONTENT_TYPE, content_type)
            .body(body);
        self.send(builder)
            .await?
            .ok_or_else(|| Error::not_found(format!("key-value store {store_id}")))?;
        Ok(())
    }

    fn record_link(&self, store_id: &str, key: &str) -> String {
        self.url(&format!("key-value-stores/{store_id}/records/{key}"))
    }
}

#[async_trait]
impl DatasetStore for ApifyClient {
    async fn get_or_create_dataset(&self, name: &str) -> Result<String> {
        self.create_named("datasets", name).await
    }

    async fn push_row(&self, dataset_id: &str, row: &serde_json::Value) -> Result<()> {
        let builder = self
            .http
            .post(self.url(&format!("datasets/{dataset_id}/items")))
            .json(row);
        self.send(builder)
            .await?
            .ok_or_else(|| Error::not_found(format!("dataset {dataset_id}")))?;
        Ok(())
    }

    fn items_link(&self, dataset_id: &str) -> String {
        self.url(&format!("datasets/{dataset_id}/items"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn client() -> ApifyClient {
        ApifyClient::new("https://api.apify.com/", "token", Duration::from_secs(5)).unwrap()
    }

    /// Serve `responses` in order, one connection each, recording request targets.
    async fn serve(responses: Vec<(u16, String)>) -> (ApifyClient, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let targets = Arc::new(Mutex::new(Vec::new()));

        let seen = Arc::clone(&targets);
        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let target = read_request(&mut socket).await;
                seen.lock().unwrap().push(target);
                let response = format!(
                    "HTTP/1.1 {status} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });

        let client = ApifyClient::new(format!("http://{addr}"), "token", Duration::from_secs(5))
            .unwrap()
            .with_retry(RetryPolicy {
                max_retries: 2,
                base_delay: Duration::from_millis(1),
            });
        (client, targets)
    }

    /// Read one request and return its target (path and query).
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed mid request");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let body_len = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        while buf.len() < header_end + body_len {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed mid body");
            buf.extend_from_slice(&chunk[..n]);
        }
        head.split_whitespace().nth(1).unwrap_or_default().to_string()
    }

    fn run_body(status: &str) -> String {
        serde_json::json!({
            "data": {
                "id": "run-1",
                "actId": "act-1",
                "status": status,
                "stats": {"runTimeSecs": 12.5}
            }
        })
        .to_string()
    }

    #[test]
    fn test_base_url_is_normalized() {
        assert_eq!(client().base_url(), "https://api.apify.com");
    }

    #[test]
    fn test_links() {
        let client = client();
        assert_eq!(
            client.record_link("kvs-1", "parsel-crawler-2025-06-04T08-27-18"),
            "https://api.apify.com/v2/key-value-stores/kvs-1/records/parsel-crawler-2025-06-04T08-27-18"
        );
        assert_eq!(
            client.items_link("ds-1"),
            "https://api.apify.com/v2/datasets/ds-1/items"
        );
    }

    #[test]
    fn test_envelope_parsing() {
        let body = serde_json::json!({
            "data": {
                "id": "run-1",
                "actId": "act-1",
                "status": "RUNNING",
                "stats": {"runTimeSecs": 1.5}
            }
        });
        let envelope: Envelope<RunRecord> = serde_json::from_value(body).unwrap();
        assert_eq!(envelope.data.id.as_str(), "run-1");
        assert!(!envelope.data.status.is_terminal());

        let actor: Envelope<ActorDescriptor> = serde_json::from_value(serde_json::json!({
            "data": {"id": "act-1", "name": "parsel-crawler", "username": "tester"}
        }))
        .unwrap();
        assert_eq!(actor.data.name, "parsel-crawler");
    }

    #[test]
    fn test_retry_delay_doubles() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.delay(0), Duration::from_millis(500));
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(3), Duration::from_secs(4));
    }

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert!(!is_transient_status(StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn test_missing_run_is_none() {
        let (client, targets) = serve(vec![(404, r#"{"error":{"type":"record-not-found"}}"#.to_string())]).await;

        let run = client.get_run(&RunHandle::from("run-1")).await.unwrap();
        assert!(run.is_none());
        assert_eq!(*targets.lock().unwrap(), vec!["/v2/actor-runs/run-1".to_string()]);
    }

    #[tokio::test]
    async fn test_unavailable_server_is_retried() {
        let (client, targets) = serve(vec![
            (503, String::new()),
            (429, String::new()),
            (200, run_body("SUCCEEDED")),
        ])
        .await;

        let run = client.get_run(&RunHandle::from("run-1")).await.unwrap().unwrap();
        assert!(run.is_succeeded());
        assert_eq!(targets.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let (client, targets) = serve(vec![
            (502, String::new()),
            (502, String::new()),
            (502, String::new()),
        ])
        .await;

        let err = client.get_run(&RunHandle::from("run-1")).await.unwrap_err();
        assert!(matches!(err, Error::Platform(_)));
        assert_eq!(targets.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let (client, targets) = serve(vec![(401, String::new())]).await;

        let err = client.get_run(&RunHandle::from("run-1")).await.unwrap_err();
        assert!(matches!(err, Error::Platform(_)));
        assert_eq!(targets.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dataset_items_are_paginated() {
        let full_page: Vec<serde_json::Value> =
            (0..PAGE_SIZE).map(|i| serde_json::json!({"url": format!("https://example.com/{i}")})).collect();
        let (client, targets) = serve(vec![
            (200, serde_json::to_string(&full_page).unwrap()),
            (200, "[]".to_string()),
        ])
        .await;

        let run = RunHandle::from("run-1");
        let items: Vec<serde_json::Value> = client.output_records(&run).try_collect().await.unwrap();
        assert_eq!(items.len(), PAGE_SIZE);
        assert_eq!(items[0]["url"], "https://example.com/0");

        let targets = targets.lock().unwrap();
        assert_eq!(targets.len(), 2);
        assert!(targets[0].contains("offset=0"));
        assert!(targets[1].contains(&format!("offset={PAGE_SIZE}")));
    }

    #[tokio::test]
    async fn test_short_page_ends_pagination() {
        let (client, targets) = serve(vec![(200, r#"[{"url":"a"},{"url":"b"}]"#.to_string())]).await;

        let run = RunHandle::from("run-1");
        let items: Vec<serde_json::Value> = client.output_records(&run).try_collect().await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(targets.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_wait_for_finish_polls_until_terminal() {
        let (client, targets) = serve(vec![
            (200, run_body("READY")),
            (200, run_body("RUNNING")),
            (200, run_body("SUCCEEDED")),
        ])
        .await;

        let record = client
            .wait_for_finish(&RunHandle::from("run-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, RunStatus::Succeeded);

        let targets = targets.lock().unwrap();
        assert_eq!(targets.len(), 3);
        assert!(targets.iter().all(|t| t == "/v2/actor-runs/run-1?waitForFinish=60"));
    }

    #[tokio::test]
    async fn test_wait_for_finish_stops_on_unrecognized_status() {
        let (client, targets) = serve(vec![(200, run_body("HIBERNATED"))]).await;

        let record = client
            .wait_for_finish(&RunHandle::from("run-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, RunStatus::Unknown);
        assert_eq!(targets.lock().unwrap().len(), 1);
    }
}
