//! Client for a running inference service.
//!
//! Callers get distinct errors for a service that cannot be reached and for a
//! request the service rejected, so each can be shown to the user as its own
//! state.

use log::debug;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::service::ClassifyResponse;

pub const DEFAULT_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Nothing answered at the configured address, or it timed out
    #[error("Service unavailable at {url}: {reason}")]
    ServiceUnavailable { url: String, reason: String },
    /// The service rejected the request
    #[error("Validation error: {0}")]
    Validation(String),
    /// The service failed while handling the request
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },
    /// The service answered with something this client does not understand
    #[error("Protocol error: {0}")]
    Protocol(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct SentimentClient {
    base_url: String,
    http: reqwest::Client,
}

impl SentimentClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, Duration::from_secs(10))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Protocol(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.decode(response).await
    }

    pub async fn classify(&self, text: &str) -> Result<ClassifyResponse, ClientError> {
        debug!("POST {}/classify ({} chars)", self.base_url, text.chars().count());
        let response = self
            .http
            .post(format!("{}/classify", self.base_url))
            .json(&json!({ "text": text }))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.decode(response).await
    }

    fn transport_error(&self, err: reqwest::Error) -> ClientError {
        if err.is_connect() || err.is_timeout() {
            ClientError::ServiceUnavailable {
                url: self.base_url.clone(),
                reason: err.to_string(),
            }
        } else {
            ClientError::Protocol(err.to_string())
        }
    }

    async fn decode<T: for<'de> Deserialize<'de>>(&self, response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;

        if status.is_success() {
            return serde_json::from_slice(&bytes)
                .map_err(|e| ClientError::Protocol(format!("unexpected response body: {}", e)));
        }

        let message = serde_json::from_slice::<Value>(&bytes)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or_else(|| String::from_utf8_lossy(&bytes).into_owned());

        match status {
            StatusCode::BAD_REQUEST => Err(ClientError::Validation(message)),
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
                Err(ClientError::ServiceUnavailable {
                    url: self.base_url.clone(),
                    reason: message,
                })
            }
            s if s.is_server_error() => Err(ClientError::Server {
                status: s.as_u16(),
                message,
            }),
            s => Err(ClientError::Protocol(format!("unexpected status {}: {}", s, message))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_service_is_unavailable() {
        // bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = SentimentClient::new(format!("http://{}/", addr)).unwrap();
        assert_eq!(client.base_url(), format!("http://{}", addr));
        let err = client.health().await.unwrap_err();
        assert!(matches!(err, ClientError::ServiceUnavailable { .. }), "{:?}", err);
    }
}
