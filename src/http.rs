//! Shared outbound HTTP client for commands that call web APIs.

use crate::config::HttpConfig;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    /// The underlying client, shared with the Discord REST transport.
    pub fn inner(&self) -> Client {
        self.client.clone()
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;
        let status = response.status();
        tracing::debug!(url, status = status.as_u16(), "HTTP GET");
        if !status.is_success() {
            anyhow::bail!("GET {url} returned {status}");
        }
        response
            .json::<T>()
            .await
            .with_context(|| format!("GET {url} returned invalid JSON"))
    }
}
