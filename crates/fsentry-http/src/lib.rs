//! fsentry-http
//!
//! Outbound transport for every call to the remote API.
//!
//! The transport is a stack of [`HttpSender`] decorators composed
//! outer-to-inner as **retry ∘ rate-limit ∘ raw send**:
//!
//! - [`RetryingSender`] retries only when no response arrived at all.
//! - [`RateLimitedSender`] takes a token from a shared [`TokenBucket`] before
//!   every send and serves a penalty delay after a 429.
//! - [`ReqwestSender`] performs the actual exchange.
//!
//! HTTP error statuses are NOT errors at this layer: a response with status
//! >= 400 is returned as `Ok` and interpreted by the caller.

mod client;
mod error;
mod limiter;
mod ratelimit;
mod retry;

pub use client::ReqwestSender;
pub use error::TransportError;
pub use limiter::TokenBucket;
pub use ratelimit::RateLimitedSender;
pub use retry::RetryingSender;

pub use reqwest::{Method, StatusCode};

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// A fully described outbound request. Cloneable so it can be re-sent on retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// `application/x-www-form-urlencoded` body parameters, in order.
    pub form: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn post_form(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: Vec::new(),
            form,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Value of the first form field named `key`.
    pub fn form_value(&self, key: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// `true` for any status >= 400.
    pub fn is_error(&self) -> bool {
        self.status.is_client_error() || self.status.is_server_error()
    }
}

// ---------------------------------------------------------------------------
// Sender trait
// ---------------------------------------------------------------------------

/// One request/response exchange.
///
/// `Err` means no usable response arrived (connect failure, timeout, body
/// read failure, cancellation). Any status code is an `Ok` response.
#[async_trait::async_trait]
pub trait HttpSender: Send + Sync {
    async fn send(&self, req: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait::async_trait]
impl<T: HttpSender + ?Sized> HttpSender for Arc<T> {
    async fn send(&self, req: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(req).await
    }
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// The production stack.
pub type Transport = RetryingSender<RateLimitedSender<ReqwestSender>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    pub timeout: Duration,
    pub burst: u32,
    pub window: Duration,
    pub penalty: Duration,
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            burst: 3,
            window: Duration::from_millis(200),
            penalty: Duration::from_secs(3),
            max_attempts: 2,
            backoff_base: Duration::from_secs(1),
        }
    }
}

/// Build retry ∘ rate-limit ∘ reqwest. Every blocking point honors `cancel`.
pub fn build_transport(
    opts: &TransportOptions,
    cancel: CancellationToken,
) -> Result<Transport, TransportError> {
    let raw = ReqwestSender::new(opts.timeout)?;
    let bucket = Arc::new(TokenBucket::new(opts.burst, opts.window));
    let limited = RateLimitedSender::new(raw, bucket, opts.penalty, cancel.clone());
    Ok(RetryingSender::new(
        limited,
        opts.max_attempts,
        opts.backoff_base,
        cancel,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_statuses_start_at_400() {
        assert!(!HttpResponse::new(StatusCode::OK, "").is_error());
        assert!(!HttpResponse::new(StatusCode::FOUND, "").is_error());
        assert!(HttpResponse::new(StatusCode::BAD_REQUEST, "").is_error());
        assert!(HttpResponse::new(StatusCode::TOO_MANY_REQUESTS, "").is_error());
        assert!(HttpResponse::new(StatusCode::BAD_GATEWAY, "").is_error());
    }

    #[test]
    fn form_value_returns_first_match() {
        let req = HttpRequest::post_form(
            "https://example.org",
            vec![
                ("action".to_string(), "query".to_string()),
                ("action".to_string(), "ignored".to_string()),
            ],
        )
        .header("User-Agent", "x");
        assert_eq!(req.form_value("action"), Some("query"));
        assert_eq!(req.form_value("missing"), None);
        assert_eq!(req.method, Method::POST);
    }
}
