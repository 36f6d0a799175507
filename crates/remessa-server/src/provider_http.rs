//! HTTP provider client for the batch send endpoint.

use std::time::Duration;

use async_trait::async_trait;
use remessa_core::pipeline::ProviderConfig;
use remessa_core::{BatchEmail, Provider, ProviderError};
use reqwest::StatusCode;
use serde::Deserialize;

pub struct HttpProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    data: Vec<BatchItem>,
}

#[derive(Debug, Deserialize)]
struct BatchItem {
    id: String,
}

impl HttpProvider {
    pub fn new(config: &ProviderConfig, api_key: String) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn retry_after(response: &reqwest::Response) -> Option<Duration> {
        response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}

#[async_trait]
impl Provider for HttpProvider {
    async fn send_batch(&self, batch: &[BatchEmail]) -> Result<Vec<String>, ProviderError> {
        let response = self
            .client
            .post(format!("{}/emails/batch", self.base_url))
            .bearer_auth(&self.api_key)
            .json(batch)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Transport(e.to_string())
                }
            })?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited {
                retry_after: Self::retry_after(&response),
            });
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Rejected(format!("{status}: {body}")));
        }

        let parsed: BatchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Transport(format!("invalid batch response: {e}")))?;
        Ok(parsed.data.into_iter().map(|item| item.id).collect())
    }
}
