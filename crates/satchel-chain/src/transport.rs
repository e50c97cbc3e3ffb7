//! HTTP transport seam.
//!
//! The client speaks to the indexer only through [`Transport`]. A transport
//! returns `Ok` for any response that arrived, whatever its status, and
//! `Err(ChainError::Transport)` when none did. Status interpretation and
//! retries live above this layer.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::ChainError;

/// Longest response body carried into error messages.
const MAX_ERROR_BODY: usize = 512;

/// A received HTTP response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Convert to a `ChainError::Http`, truncating long bodies.
    pub fn into_error(self) -> ChainError {
        let mut body = self.body;
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        ChainError::Http {
            status: self.status,
            body,
        }
    }
}

/// Minimal HTTP client interface used by [`ChainClient`](crate::ChainClient).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, ChainError>;

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<HttpResponse, ChainError>;
}

/// Production transport backed by `reqwest` with a per-call timeout.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    async fn read(resp: reqwest::Response) -> Result<HttpResponse, ChainError> {
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, ChainError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        Self::read(resp).await
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<HttpResponse, ChainError> {
        let resp = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        Self::read(resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(301, "").is_success());
        assert!(!HttpResponse::new(404, "").is_success());
    }

    #[test]
    fn into_error_truncates() {
        let err = HttpResponse::new(500, "x".repeat(2_000)).into_error();
        match err {
            ChainError::Http { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body.len(), MAX_ERROR_BODY);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn reqwest_transport_builds() {
        assert!(ReqwestTransport::new(Duration::from_secs(5)).is_ok());
    }
}
