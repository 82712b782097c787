//! JSON-over-HTTP backend for [`RemoteDataProvider`](super::RemoteDataProvider).
//!
//! Endpoints, relative to the base URL:
//!
//! | Request | Endpoint |
//! |---------|----------|
//! | sort | `POST sort` with a [`SortRequest`], answers `[usize]` |
//! | view | `POST view` with `[usize]`, answers `[row]` |
//! | mapping sample | `GET mapping_sample/{column}`, answers `[f64]` |
//! | search | `POST search` with a [`SearchRequest`], answers `[usize]` |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{RankTableError, Result};

use super::remote::{RemoteBackend, SearchRequest, SortRequest};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RankTableError::Config(format!("Failed to create HTTP client: {}", e)))?;
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RankTableError::Remote(format!("{} ({})", status, error_text)));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl RemoteBackend for HttpBackend {
    async fn sort(&self, request: &SortRequest) -> Result<Vec<usize>> {
        tracing::debug!(url = %self.base_url, "remote sort");
        self.send(self.client.post(self.url("sort")).json(request)).await
    }

    async fn view(&self, indices: &[usize]) -> Result<Vec<Value>> {
        self.send(self.client.post(self.url("view")).json(indices)).await
    }

    async fn mapping_sample(&self, column: &str) -> Result<Vec<f64>> {
        self.send(self.client.get(self.url(&format!("mapping_sample/{column}")))).await
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<usize>> {
        self.send(self.client.post(self.url("search")).json(request)).await
    }
}
