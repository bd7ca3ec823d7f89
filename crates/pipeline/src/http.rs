//! HTTP adapters for the agent service and the external data providers.
//!
//! Each adapter wraps a shared [`reqwest::Client`] and a base URL, posts a
//! JSON body and decodes a JSON reply. Non-2xx replies carry their status and
//! body in [`ProviderHttpError::ApiError`].

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{PipelineError, PipelineResult};
use crate::providers::{
    AgentInvoker, AgentOutput, AgentRequest, IntelData, IntelProvider, IntelQuery, JobsData,
    JobsProvider, JobsQuery,
};

#[derive(Debug, thiserror::Error)]
pub enum ProviderHttpError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Upstream error ({status}): {body}")]
    ApiError { status: u16, body: String },
}

/// Build a client with a whole-request timeout, shared by every adapter.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, ProviderHttpError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// POST `body` as JSON to `url` and decode the JSON reply.
async fn post_json<B, T>(client: &reqwest::Client, url: &str, body: &B) -> Result<T, ProviderHttpError>
where
    B: serde::Serialize + ?Sized,
    T: serde::de::DeserializeOwned,
{
    let response = client.post(url).json(body).send().await?;
    let response = ensure_success(response).await?;
    Ok(response.json::<T>().await?)
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ProviderHttpError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(ProviderHttpError::ApiError {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

// ---------------------------------------------------------------------------
// Agent service
// ---------------------------------------------------------------------------

/// Invokes personas on the agent service at `POST {base}/agents/{persona}/invoke`.
pub struct HttpAgentClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAgentClient {
    pub fn with_client(client: reqwest::Client, base_url: String) -> Self {
        Self {
            client,
            base_url: trim_base(base_url),
        }
    }
}

#[async_trait]
impl AgentInvoker for HttpAgentClient {
    async fn invoke(&self, request: &AgentRequest) -> PipelineResult<AgentOutput> {
        let url = format!("{}/agents/{}/invoke", self.base_url, request.persona.id());
        post_json(&self.client, &url, request)
            .await
            .map_err(|e| PipelineError::agent(request.persona.id(), e))
    }
}

// ---------------------------------------------------------------------------
// Data providers
// ---------------------------------------------------------------------------

/// Labor-market intel service at `POST {base}/intel`.
pub struct HttpIntelProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpIntelProvider {
    pub fn with_client(client: reqwest::Client, base_url: String) -> Self {
        Self {
            client,
            base_url: trim_base(base_url),
        }
    }
}

#[async_trait]
impl IntelProvider for HttpIntelProvider {
    async fn fetch(&self, query: &IntelQuery) -> PipelineResult<IntelData> {
        let url = format!("{}/intel", self.base_url);
        post_json(&self.client, &url, query)
            .await
            .map_err(|e| PipelineError::provider("intel", e))
    }
}

/// Job-postings search at `POST {base}/jobs/search`.
pub struct HttpJobsProvider {
    name: &'static str,
    client: reqwest::Client,
    base_url: String,
}

impl HttpJobsProvider {
    pub fn with_client(name: &'static str, client: reqwest::Client, base_url: String) -> Self {
        Self {
            name,
            client,
            base_url: trim_base(base_url),
        }
    }
}

#[async_trait]
impl JobsProvider for HttpJobsProvider {
    async fn fetch(&self, query: &JobsQuery) -> PipelineResult<JobsData> {
        let url = format!("{}/jobs/search", self.base_url);
        post_json(&self.client, &url, query)
            .await
            .map_err(|e| PipelineError::provider(self.name, e))
    }
}
