//! HTTP seam between the harness and cluster nodes.
//!
//! Callers see only `(status, body)` pairs or a `Transport` error; anything
//! richer stays inside the implementation. The real implementation keeps one
//! blocking `reqwest` client for the whole run.

#![allow(missing_docs)]

use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;

use crate::core::errors::{Result, RfhError};

/// Raw HTTP response as observed by the harness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Blocking request surface used by the controller and the API client.
pub trait HttpTransport: Send + Sync {
    fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse>;
    fn post_json(&self, url: &str, body: &Value, timeout: Duration) -> Result<HttpResponse>;
}

/// [`HttpTransport`] backed by a shared `reqwest` blocking client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("rfh/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RfhError::Runtime {
                details: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }

    fn send(
        &self,
        url: &str,
        request: reqwest::blocking::RequestBuilder,
        timeout: Duration,
    ) -> Result<HttpResponse> {
        let request = if timeout.is_zero() {
            request
        } else {
            request.timeout(timeout)
        };
        let response = request.send().map_err(|e| transport_error(url, &e))?;
        let status = response.status().as_u16();
        let body = response.text().map_err(|e| transport_error(url, &e))?;
        Ok(HttpResponse { status, body })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse> {
        self.send(url, self.client.get(url), timeout)
    }

    fn post_json(&self, url: &str, body: &Value, timeout: Duration) -> Result<HttpResponse> {
        self.send(url, self.client.post(url).json(body), timeout)
    }
}

fn transport_error(url: &str, error: &reqwest::Error) -> RfhError {
    let kind = if error.is_timeout() {
        "timeout"
    } else if error.is_connect() {
        "connect"
    } else {
        "request"
    };
    RfhError::Transport {
        endpoint: url.to_string(),
        details: format!("{kind}: {error}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_connection_is_a_transport_error() {
        let transport = ReqwestTransport::new().expect("client builds");
        // Port 9 (discard) is essentially never listening on loopback in CI.
        let err = transport
            .get("http://127.0.0.1:9/raft/status", Duration::from_millis(500))
            .expect_err("nothing listens on port 9");
        assert_eq!(err.code(), "RFH-2002");
    }

    #[test]
    fn only_200_counts_as_ok() {
        assert!(HttpResponse::new(200, "{}").is_ok());
        assert!(!HttpResponse::new(409, "{}").is_ok());
        assert!(!HttpResponse::new(500, "error:x").is_ok());
    }
}
