//! Token bucket with reservation semantics.
//!
//! Capacity `burst`, one token refilled per `interval`. A reservation always
//! succeeds immediately and returns the instant at which the caller may act;
//! the balance may go negative, which pushes later reservations further out.
//! Reservations never move the bucket's clock backwards, so a penalty
//! reservation placed in the future delays every caller that comes after it.
//!
//! Uses `tokio::time::Instant` so paused-clock tests are deterministic.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::TransportError;

#[derive(Debug)]
pub struct TokenBucket {
    burst: u32,
    interval: Duration,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last: Instant,
}

impl TokenBucket {
    /// A full bucket. `burst` and `interval` are clamped to at least 1 / 1ns.
    pub fn new(burst: u32, interval: Duration) -> Self {
        let burst = burst.max(1);
        Self {
            burst,
            interval: interval.max(Duration::from_nanos(1)),
            state: Mutex::new(BucketState {
                tokens: f64::from(burst),
                last: Instant::now(),
            }),
        }
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Reserve `n` tokens as of `at`. Returns when the reservation may act.
    pub fn reserve_n_at(&self, at: Instant, n: u32) -> Instant {
        let mut st = self.state.lock().unwrap_or_else(|p| p.into_inner());

        let t = at.max(st.last);
        let elapsed = t.saturating_duration_since(st.last);
        let refill = elapsed.as_secs_f64() / self.interval.as_secs_f64();
        st.tokens = (st.tokens + refill).min(f64::from(self.burst));
        st.last = t;

        st.tokens -= f64::from(n);
        if st.tokens >= 0.0 {
            t
        } else {
            t + self.interval.mul_f64(-st.tokens)
        }
    }

    /// Wait for one token.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), TransportError> {
        let act_at = self.reserve_n_at(Instant::now(), 1);
        sleep_until_or_cancel(act_at, cancel).await
    }

    /// Reserve a full burst `delay` in the future and wait for it.
    pub async fn penalize(
        &self,
        delay: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError> {
        let act_at = self.reserve_n_at(Instant::now() + delay, self.burst);
        sleep_until_or_cancel(act_at, cancel).await
    }
}

pub(crate) async fn sleep_until_or_cancel(
    deadline: Instant,
    cancel: &CancellationToken,
) -> Result<(), TransportError> {
    if deadline <= Instant::now() {
        return if cancel.is_cancelled() {
            Err(TransportError::Cancelled)
        } else {
            Ok(())
        };
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(TransportError::Cancelled),
        _ = tokio::time::sleep_until(deadline) => Ok(()),
    }
}
