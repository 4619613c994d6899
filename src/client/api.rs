//! HTTP client for the queuewatch API.

use crate::backend::{AppQueue, GetQueuesResponse, JobStatus, ListQueuesQuery};
use crate::stats::{GetMetricsResponse, StatsQuery};

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Url};
use serde::Serialize;
use thiserror::Error;

/// Client API error types.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// Operations the dashboard performs against the API server.
#[async_trait]
pub trait DashboardApi: Send + Sync {
    async fn get_queues(&self, query: &ListQueuesQuery) -> Result<Vec<AppQueue>, ApiError>;

    async fn get_queue_stats(&self, query: &StatsQuery) -> Result<GetMetricsResponse, ApiError>;

    async fn retry_all(&self, queue: &str, status: JobStatus) -> Result<(), ApiError>;

    async fn promote_all(&self, queue: &str) -> Result<(), ApiError>;

    async fn clean_all(&self, queue: &str, status: JobStatus) -> Result<(), ApiError>;

    async fn pause_queue(&self, queue: &str) -> Result<(), ApiError>;

    async fn resume_queue(&self, queue: &str) -> Result<(), ApiError>;

    async fn empty_queue(&self, queue: &str) -> Result<(), ApiError>;

    async fn add_job(
        &self,
        queue: &str,
        name: &str,
        data: serde_json::Value,
        options: serde_json::Value,
    ) -> Result<(), ApiError>;
}

#[derive(Serialize)]
struct AddJobBody<'a> {
    name: &'a str,
    data: serde_json::Value,
    options: serde_json::Value,
}

/// [`DashboardApi`] over HTTP using `reqwest`.
#[derive(Clone)]
pub struct HttpApi {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpApi {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(format!("{} cannot be a base url", base_url)));
        }

        Ok(Self {
            base_url,
            client: reqwest::Client::new(),
        })
    }

    /// Build a URL from path segments, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(request: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn queue_action(&self, method: Method, segments: &[&str]) -> Result<(), ApiError> {
        let url = self.url(segments)?;
        Self::send(self.client.request(method, url)).await?;
        Ok(())
    }
}

#[async_trait]
impl DashboardApi for HttpApi {
    async fn get_queues(&self, query: &ListQueuesQuery) -> Result<Vec<AppQueue>, ApiError> {
        let url = self.url(&["api", "queues"])?;
        let response = Self::send(self.client.get(url).query(query)).await?;
        let body: GetQueuesResponse = response.json().await?;
        Ok(body.queues)
    }

    async fn get_queue_stats(&self, query: &StatsQuery) -> Result<GetMetricsResponse, ApiError> {
        let url = self.url(&["api", "stats"])?;
        let response = Self::send(self.client.get(url).query(query)).await?;
        Ok(response.json().await?)
    }

    async fn retry_all(&self, queue: &str, status: JobStatus) -> Result<(), ApiError> {
        self.queue_action(Method::PUT, &["api", "queues", queue, "retry", status.as_str()])
            .await
    }

    async fn promote_all(&self, queue: &str) -> Result<(), ApiError> {
        self.queue_action(Method::PUT, &["api", "queues", queue, "promote"]).await
    }

    async fn clean_all(&self, queue: &str, status: JobStatus) -> Result<(), ApiError> {
        self.queue_action(Method::PUT, &["api", "queues", queue, "clean", status.as_str()])
            .await
    }

    async fn pause_queue(&self, queue: &str) -> Result<(), ApiError> {
        self.queue_action(Method::PUT, &["api", "queues", queue, "pause"]).await
    }

    async fn resume_queue(&self, queue: &str) -> Result<(), ApiError> {
        self.queue_action(Method::PUT, &["api", "queues", queue, "resume"]).await
    }

    async fn empty_queue(&self, queue: &str) -> Result<(), ApiError> {
        self.queue_action(Method::PUT, &["api", "queues", queue, "empty"]).await
    }

    async fn add_job(
        &self,
        queue: &str,
        name: &str,
        data: serde_json::Value,
        options: serde_json::Value,
    ) -> Result<(), ApiError> {
        let url = self.url(&["api", "queues", queue, "add"])?;
        let body = AddJobBody { name, data, options };
        Self::send(self.client.post(url).json(&body)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryQueue, QueueAdapter, QueueRegistry};
    use crate::config::ServerConfig;
    use crate::stats::TimeUnit;
    use crate::web::Server;
    use serde_json::json;
    use std::sync::Arc;

    /// Serve the real router on an ephemeral port.
    async fn spawn_server() -> (HttpApi, Arc<MemoryQueue>) {
        let registry = QueueRegistry::new();
        let emails = Arc::new(MemoryQueue::new("emails"));
        registry.add(emails.clone()).await;
        registry.add(Arc::new(MemoryQueue::new("monthly reports"))).await;

        let router = Server::new(ServerConfig::default(), registry).routes();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        (HttpApi::new(&format!("http://{}", addr)).unwrap(), emails)
    }

    #[test]
    fn test_url_building() {
        let api = HttpApi::new("http://localhost:3000/board/").unwrap();
        let url = api.url(&["api", "queues", "monthly reports", "pause"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/board/api/queues/monthly%20reports/pause");

        assert!(matches!(HttpApi::new("not a url"), Err(ApiError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_round_trip_against_server() {
        let (api, emails) = spawn_server().await;

        api.add_job("emails", "welcome", json!({ "user": 1 }), json!({})).await.unwrap();
        let id = emails.start_next(0).await.unwrap();
        emails.complete(&id, 30.0, chrono::Utc::now().timestamp_millis()).await;

        let queues = api.get_queues(&ListQueuesQuery::default()).await.unwrap();
        let names: Vec<&str> = queues.iter().map(|q| q.name.as_str()).collect();
        assert_eq!(names, vec!["emails", "monthly reports"]);
        assert_eq!(queues[0].counts.completed, 1);

        let stats = api
            .get_queue_stats(&StatsQuery { start: Some(0), end: Some(60), timeframe: TimeUnit::Sec })
            .await
            .unwrap();
        assert_eq!(stats.get("emails").unwrap().average_job_time, 30.0);
        assert!(stats.get("monthly reports").unwrap().metrics.is_none());
    }

    #[tokio::test]
    async fn test_actions_against_server() {
        let (api, emails) = spawn_server().await;

        api.pause_queue("monthly reports").await.unwrap();
        api.pause_queue("emails").await.unwrap();
        assert!(emails.is_paused().await.unwrap());
        api.resume_queue("emails").await.unwrap();
        assert!(!emails.is_paused().await.unwrap());

        api.add_job("emails", "later", json!({}), json!({ "delay": 10 })).await.unwrap();
        api.promote_all("emails").await.unwrap();
        assert_eq!(emails.get_job_counts().await.unwrap().waiting, 1);

        api.empty_queue("emails").await.unwrap();
        assert_eq!(emails.get_job_counts().await.unwrap().waiting, 0);

        api.retry_all("emails", JobStatus::Failed).await.unwrap();
        api.clean_all("emails", JobStatus::Completed).await.unwrap();
    }

    #[tokio::test]
    async fn test_error_status_surfaces() {
        let (api, _) = spawn_server().await;

        let err = api.pause_queue("missing").await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 404, .. }));

        let err = api.add_job("emails", "", json!({}), json!({})).await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 400, .. }));
    }
}
