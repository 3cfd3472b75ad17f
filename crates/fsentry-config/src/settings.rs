//! Typed daemon settings.
//!
//! Every field has a default so an empty YAML document is a valid config.
//! Durations are stored as integer milliseconds/seconds in YAML and exposed
//! as [`Duration`] through accessor methods.

use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_USER_AGENT: &str = "FreedomSentry/1";

// ---------------------------------------------------------------------------
// Top-level
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentryConfig {
    pub api: ApiSettings,
    pub allow_list: AllowListSettings,
    pub batch: BatchSettings,
    pub scan: ScanSettings,
    pub rate_limit: RateLimitSettings,
    pub retry: RetrySettings,
    /// Log suppression requests instead of sending them.
    pub dry_run: bool,
}

impl SentryConfig {
    /// Reject values that would make the pipeline stall or spin.
    pub fn validate(&self) -> Result<()> {
        if self.api.endpoint.trim().is_empty() {
            bail!("CONFIG_INVALID: api.endpoint is empty (set it in YAML or via API_ENDPOINT)");
        }
        if self.allow_list.page.trim().is_empty() {
            bail!("CONFIG_INVALID: allow_list.page is empty (set it in YAML or via LIST_NAME)");
        }
        if self.batch.capacity == 0 {
            bail!("CONFIG_INVALID: batch.capacity must be > 0");
        }
        if self.rate_limit.burst == 0 {
            bail!("CONFIG_INVALID: rate_limit.burst must be > 0");
        }
        if self.rate_limit.window_ms == 0 {
            bail!("CONFIG_INVALID: rate_limit.window_ms must be > 0");
        }
        if self.retry.max_attempts == 0 {
            bail!("CONFIG_INVALID: retry.max_attempts must be > 0");
        }
        if self.scan.interval_secs == 0 {
            bail!("CONFIG_INVALID: scan.interval_secs must be > 0");
        }
        if self.scan.list_pass_interval_secs == 0 {
            bail!("CONFIG_INVALID: scan.list_pass_interval_secs must be > 0");
        }
        if let AllowListFreshness::Ttl { secs: 0 } = self.allow_list.freshness {
            bail!("CONFIG_INVALID: allow_list.freshness ttl must be > 0 seconds");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Action API endpoint, e.g. `https://wiki.example.org/w/api.php`.
    pub endpoint: String,
    /// NAME of the env var holding the bearer token. Never the token itself.
    pub access_token_env: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_token_env: "ACCESS_TOKEN".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
        }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllowListSettings {
    /// Title of the page whose lines name the pages to suppress.
    pub page: String,
    pub freshness: AllowListFreshness,
}

/// How long a fetched allow-list stays valid.
///
/// `UntilInvalidated` keeps a populated list forever and only refetches after
/// an explicit invalidation (the long-standing production behavior).
/// `Ttl` additionally expires the list after the given age.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AllowListFreshness {
    #[default]
    UntilInvalidated,
    Ttl { secs: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub capacity: usize,
    /// Force-drain period. `0` disables the timer.
    pub flush_period_ms: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            capacity: 500,
            flush_period_ms: 5_000,
        }
    }
}

impl BatchSettings {
    pub fn flush_period(&self) -> Option<Duration> {
        (self.flush_period_ms > 0).then(|| Duration::from_millis(self.flush_period_ms))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub interval_secs: u64,
    /// How far back the first recent-changes scan reaches.
    pub initial_lookback_secs: u64,
    /// Period of the full allow-list re-suppression pass.
    pub list_pass_interval_secs: u64,
    pub skip_initial_list_pass: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            initial_lookback_secs: 30 * 60,
            list_pass_interval_secs: 15 * 60,
            skip_initial_list_pass: false,
        }
    }
}

impl ScanSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn initial_lookback(&self) -> Duration {
        Duration::from_secs(self.initial_lookback_secs)
    }

    pub fn list_pass_interval(&self) -> Duration {
        Duration::from_secs(self.list_pass_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub burst: u32,
    /// One token is refilled per window.
    pub window_ms: u64,
    /// Extra delay after the server answers 429.
    pub penalty_ms: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            burst: 3,
            window_ms: 200,
            penalty_ms: 3_000,
        }
    }
}

impl RateLimitSettings {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn penalty(&self) -> Duration {
        Duration::from_millis(self.penalty_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff_base_ms: 1_000,
        }
    }
}

impl RetrySettings {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> SentryConfig {
        let mut cfg = SentryConfig::default();
        cfg.api.endpoint = "https://wiki.example.org/w/api.php".to_string();
        cfg.allow_list.page = "Project:Suppression list".to_string();
        cfg
    }

    #[test]
    fn defaults_match_production_values() {
        let cfg = SentryConfig::default();
        assert_eq!(cfg.batch.capacity, 500);
        assert_eq!(cfg.batch.flush_period(), Some(Duration::from_secs(5)));
        assert_eq!(cfg.scan.interval(), Duration::from_secs(5));
        assert_eq!(cfg.scan.list_pass_interval(), Duration::from_secs(900));
        assert_eq!(cfg.rate_limit.burst, 3);
        assert_eq!(cfg.rate_limit.window(), Duration::from_millis(200));
        assert_eq!(cfg.retry.max_attempts, 2);
        assert_eq!(cfg.allow_list.freshness, AllowListFreshness::UntilInvalidated);
        assert_eq!(cfg.api.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn zero_flush_period_disables_timer() {
        let b = BatchSettings {
            capacity: 5,
            flush_period_ms: 0,
        };
        assert_eq!(b.flush_period(), None);
    }

    #[test]
    fn validate_accepts_filled_defaults() {
        valid().validate().unwrap();
    }

    #[test]
    fn validate_rejects_missing_endpoint() {
        let mut cfg = valid();
        cfg.api.endpoint = "  ".to_string();
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("api.endpoint"), "{err}");
    }

    #[test]
    fn validate_rejects_zero_capacity_and_zero_ttl() {
        let mut cfg = valid();
        cfg.batch.capacity = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = valid();
        cfg.allow_list.freshness = AllowListFreshness::Ttl { secs: 0 };
        assert!(cfg.validate().is_err());
    }
}
