//! Outbound calls to the configured inference API.

use axum::http::header;
use reqwest::Client;
use std::time::Duration;

use crate::config::{ApiKey, UpstreamConfig};
use crate::conversation::Message;
use crate::error::{Error, Result};
use crate::provider::{self, InferenceProvider, Payload};

/// The configured upstream endpoint plus the provider speaking its format.
pub struct Upstream {
    client: Client,
    name: String,
    url: String,
    api_key: Option<ApiKey>,
    timeout: Duration,
    provider: Box<dyn InferenceProvider>,
}

impl std::fmt::Debug for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upstream")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("api_key", &self.api_key)
            .field("timeout", &self.timeout)
            .field("strategy", &self.provider.strategy())
            .finish()
    }
}

impl Upstream {
    pub fn new(client: Client, config: &UpstreamConfig) -> Self {
        Self::with_provider(client, config, provider::from_config(config))
    }

    /// Use an explicit provider instead of the one the config selects.
    pub fn with_provider(
        client: Client,
        config: &UpstreamConfig,
        provider: Box<dyn InferenceProvider>,
    ) -> Self {
        Self {
            client,
            name: config.name.clone(),
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            timeout: config.timeout(),
            provider,
        }
    }

    pub fn provider(&self) -> &dyn InferenceProvider {
        self.provider.as_ref()
    }

    /// Build the payload for `transcript` and return the model's reply.
    pub async fn complete(&self, transcript: &[Message]) -> Result<String> {
        let payload = self.provider.build_payload(transcript);
        self.call(&payload).await
    }

    /// Send one payload upstream and extract the reply.
    ///
    /// Fails with [`Error::Upstream`] on network errors, timeouts and
    /// non-success statuses, and with [`Error::MalformedResponse`] when a
    /// success body is not JSON or carries no recognizable reply.
    pub async fn call(&self, payload: &Payload) -> Result<String> {
        let mut request = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&payload.body);

        if let Some(api_key) = &self.api_key {
            request = request.header(
                header::AUTHORIZATION,
                format!("Bearer {}", api_key.expose_secret()),
            );
        }

        let response = request.send().await.map_err(|e| {
            let detail = if e.is_timeout() {
                format!("Request timed out after {}s", self.timeout.as_secs())
            } else {
                e.to_string()
            };
            tracing::error!(upstream = %self.name, error = %e, "Failed to reach upstream");
            Error::Upstream {
                status: None,
                detail,
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            tracing::error!(upstream = %self.name, error = %e, "Failed to read upstream body");
            Error::Upstream {
                status: Some(status.as_u16()),
                detail: e.to_string(),
            }
        })?;

        if !status.is_success() {
            tracing::error!(
                upstream = %self.name,
                status = %status,
                body = %text,
                "Upstream returned error"
            );
            return Err(Error::Upstream {
                status: Some(status.as_u16()),
                detail: text,
            });
        }

        let body: serde_json::Value = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(upstream = %self.name, error = %e, "Upstream body is not JSON");
                return Err(Error::MalformedResponse {
                    status: status.as_u16(),
                    detail: text,
                });
            }
        };

        self.provider.parse_reply(&body, payload).map_err(|e| {
            tracing::error!(upstream = %self.name, error = %e, "Unrecognized upstream response");
            Error::MalformedResponse {
                status: status.as_u16(),
                detail: text,
            }
        })
    }
}
