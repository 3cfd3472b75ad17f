//! Retry decorator.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::limiter::sleep_until_or_cancel;
use crate::{HttpRequest, HttpResponse, HttpSender, TransportError};

/// Re-sends a request only when no response arrived at all.
///
/// Any response, whatever its status, is returned immediately. Between
/// attempts the sender sleeps `backoff_base * 2^(attempt - 1)`. When the
/// attempt budget is spent the last error is returned.
pub struct RetryingSender<S> {
    inner: S,
    max_attempts: u32,
    backoff_base: Duration,
    cancel: CancellationToken,
}

impl<S> RetryingSender<S> {
    pub fn new(
        inner: S,
        max_attempts: u32,
        backoff_base: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            backoff_base,
            cancel,
        }
    }

    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.backoff_base.saturating_mul(1u32 << exp)
    }
}

#[async_trait::async_trait]
impl<S: HttpSender> HttpSender for RetryingSender<S> {
    async fn send(&self, req: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.inner.send(req).await {
                Ok(resp) => return Ok(resp),
                Err(e) => e,
            };

            if !err.is_retryable() || attempt >= self.max_attempts {
                return Err(err);
            }

            let backoff = self.backoff_for(attempt);
            warn!(
                attempt,
                max_attempts = self.max_attempts,
                backoff_ms = backoff.as_millis() as u64,
                method = %req.method,
                url = %req.url,
                error = %err,
                "request failed; retrying"
            );
            sleep_until_or_cancel(Instant::now() + backoff, &self.cancel).await?;
        }
    }
}
