//! Task API: where search tasks come from and where results go.
//!
//! The agent pulls work from a [`TaskSource`] and hands finished records to
//! a [`ResultSink`]. [`ApiClient`] implements both over HTTP; the simulated
//! pair drives the loop without a server.

pub mod payload;

pub use payload::{AssignResponse, ProductData, ReportPayload};

use crate::model::{ProductRecord, SearchTask};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://rcheck.techb.kr/api/topr";
pub const USER_AGENT: &str = "WebKit-Agent/1.0";

/// Pull-based source of search tasks.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// The next task, or `None` when no work is available.
    async fn next_task(&self) -> Result<Option<SearchTask>>;
}

/// Receiver of finished records.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn deliver(&self, task_id: i64, record: &ProductRecord) -> Result<()>;
}

/// HTTP client of the task API.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build API client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl TaskSource for ApiClient {
    async fn next_task(&self) -> Result<Option<SearchTask>> {
        let url = self.endpoint("assign");
        tracing::debug!(%url, "requesting task");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("cannot reach task API at {url}"))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::info!("no task available");
            return Ok(None);
        }
        if !status.is_success() {
            bail!("task API returned HTTP {status}");
        }

        let body: AssignResponse = resp.json().await.context("invalid task API response")?;
        let data = match body.data {
            Some(data) if body.success => data,
            _ => bail!("Invalid API response format"),
        };
        let task = data
            .into_task()
            .context("task is missing its id or product code")?;
        tracing::info!(
            task_id = task.id,
            keyword = %task.keyword,
            target = %task.target_code,
            "task assigned"
        );
        Ok(Some(task))
    }
}

#[async_trait]
impl ResultSink for ApiClient {
    async fn deliver(&self, task_id: i64, record: &ProductRecord) -> Result<()> {
        let payload = ReportPayload::from_record(task_id, record);
        let url = self.endpoint("result");
        tracing::debug!(
            task_id,
            payload = %serde_json::to_string(&payload).unwrap_or_default(),
            "posting result"
        );

        let resp = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("cannot reach task API at {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            bail!("result submission failed: HTTP {status}");
        }
        let body: serde_json::Value = resp.json().await.unwrap_or_default();
        if body.get("success").and_then(|v| v.as_bool()) != Some(true) {
            bail!("Result submission failed");
        }
        tracing::info!(task_id, rank = record.rank, "result delivered");
        Ok(())
    }
}

/// Fixed tasks served round-robin, for dry runs.
pub struct SimulatedSource {
    tasks: Vec<SearchTask>,
    cursor: AtomicUsize,
}

impl SimulatedSource {
    pub fn new(tasks: Vec<SearchTask>) -> Self {
        Self {
            tasks,
            cursor: AtomicUsize::new(0),
        }
    }

    /// The built-in sample tasks.
    pub fn sample() -> Self {
        Self::new(vec![
            SearchTask::new(1, "삼성 갤럭시버즈", "6403686318")
                .with_item_id("17738274085")
                .with_vendor_item_id("79520677967"),
            SearchTask::new(2, "에어팟 프로", "6587959920"),
            SearchTask::new(3, "c타입케이블", "8491054718")
                .with_item_id("24575039429")
                .with_vendor_item_id("4104448300"),
            SearchTask::new(4, "무선이어폰", "7279806373")
                .with_item_id("19410495858")
                .with_vendor_item_id("85802089656"),
        ])
    }
}

#[async_trait]
impl TaskSource for SimulatedSource {
    async fn next_task(&self) -> Result<Option<SearchTask>> {
        if self.tasks.is_empty() {
            return Ok(None);
        }
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        let task = self.tasks[i % self.tasks.len()].clone();
        tracing::info!(
            task_id = task.id,
            keyword = %task.keyword,
            target = %task.target_code,
            "simulated task assigned"
        );
        Ok(Some(task))
    }
}

/// Prints payloads instead of posting them.
pub struct NullSink {
    pub quiet: bool,
}

#[async_trait]
impl ResultSink for NullSink {
    async fn deliver(&self, task_id: i64, record: &ProductRecord) -> Result<()> {
        let payload = ReportPayload::from_record(task_id, record);
        if !self.quiet {
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        tracing::info!(task_id, rank = record.rank, "result recorded (simulation)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::new(format!("{}/api/topr/", server.uri()), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_assign_returns_task() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/topr/assign"))
            .and(header("user-agent", USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": {"id": 7, "keyword": "에어팟 프로", "product_id": "6587959920"}
            })))
            .mount(&server)
            .await;

        let task = client(&server).next_task().await.unwrap().unwrap();
        assert_eq!(task.id, 7);
        assert_eq!(task.target_code, "6587959920");
    }

    #[tokio::test]
    async fn test_assign_404_means_no_work() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        assert!(client(&server).next_task().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_assign_malformed_body_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": false})),
            )
            .mount(&server)
            .await;
        assert!(client(&server).next_task().await.is_err());
    }

    #[tokio::test]
    async fn test_deliver_posts_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/topr/result"))
            .and(body_partial_json(serde_json::json!({"id": 3, "rank": 80})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let record = ProductRecord {
            rank: 80,
            ..ProductRecord::default()
        };
        client(&server).deliver(3, &record).await.unwrap();
    }

    #[tokio::test]
    async fn test_deliver_rejected_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": false})),
            )
            .mount(&server)
            .await;
        let err = client(&server)
            .deliver(3, &ProductRecord::not_found())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("submission failed"));
    }

    #[tokio::test]
    async fn test_simulated_source_cycles() {
        let source = SimulatedSource::sample();
        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(source.next_task().await.unwrap().unwrap().id);
        }
        assert_eq!(ids, vec![1, 2, 3, 4, 1]);
    }
}
