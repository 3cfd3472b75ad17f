//! Raw reqwest-backed sender: no retry, no rate limiting.

use std::time::Duration;

use crate::{HttpRequest, HttpResponse, HttpSender, TransportError};

#[derive(Debug, Clone)]
pub struct ReqwestSender {
    http: reqwest::Client,
}

impl ReqwestSender {
    /// Client with a per-request timeout, no cookie store and no idle
    /// connection reuse.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| TransportError::InvalidRequest(format!("http client build failed: {e}")))?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl HttpSender for ReqwestSender {
    async fn send(&self, req: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut rb = self.http.request(req.method.clone(), req.url.as_str());
        for (name, value) in &req.headers {
            rb = rb.header(name.as_str(), value.as_str());
        }
        if !req.form.is_empty() {
            rb = rb.form(&req.form);
        }

        let resp = rb.send().await.map_err(|e| {
            if e.is_builder() {
                TransportError::InvalidRequest(e.to_string())
            } else {
                TransportError::Connect(e.to_string())
            }
        })?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError::Connect(format!("body read failed: {e}")))?;

        Ok(HttpResponse { status, body })
    }
}
