//! Rate-limiting decorator.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{HttpRequest, HttpResponse, HttpSender, StatusCode, TokenBucket, TransportError};

/// Takes one token before each send. After a `429 Too Many Requests` the
/// caller additionally waits out a full-burst reservation `penalty` in the
/// future before the response is returned.
pub struct RateLimitedSender<S> {
    inner: S,
    bucket: Arc<TokenBucket>,
    penalty: Duration,
    cancel: CancellationToken,
}

impl<S> RateLimitedSender<S> {
    pub fn new(
        inner: S,
        bucket: Arc<TokenBucket>,
        penalty: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner,
            bucket,
            penalty,
            cancel,
        }
    }

    pub fn bucket(&self) -> &Arc<TokenBucket> {
        &self.bucket
    }
}

#[async_trait::async_trait]
impl<S: HttpSender> HttpSender for RateLimitedSender<S> {
    async fn send(&self, req: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.bucket.acquire(&self.cancel).await?;

        let resp = self.inner.send(req).await?;

        if resp.status == StatusCode::TOO_MANY_REQUESTS {
            warn!(
                url = %req.url,
                penalty_ms = self.penalty.as_millis() as u64,
                "server reported too many requests; backing off"
            );
            self.bucket.penalize(self.penalty, &self.cancel).await?;
        }

        Ok(resp)
    }
}
