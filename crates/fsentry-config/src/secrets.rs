//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only the env var NAME of the access token
//!   (`api.access_token_env`, default `ACCESS_TOKEN`).
//! - At startup, callers invoke [`resolve_secrets`] once and pass the result
//!   into constructors; no other module reads credentials from the env.
//! - `Debug` on [`ResolvedSecrets`] redacts the value.
//! - Error messages reference the env var NAME, never the value.

use anyhow::{bail, Result};

use crate::SentryConfig;

/// Secrets resolved from the environment for one daemon instance.
#[derive(Clone)]
pub struct ResolvedSecrets {
    pub access_token: String,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("access_token", &"<REDACTED>")
            .finish()
    }
}

/// Resolve the access token named by `cfg.api.access_token_env`.
pub fn resolve_secrets(cfg: &SentryConfig) -> Result<ResolvedSecrets> {
    resolve_secrets_with(cfg, |name| std::env::var(name).ok())
}

/// Same as [`resolve_secrets`] with an injectable lookup.
pub fn resolve_secrets_with<F>(cfg: &SentryConfig, lookup: F) -> Result<ResolvedSecrets>
where
    F: Fn(&str) -> Option<String>,
{
    let var = cfg.api.access_token_env.trim();
    if var.is_empty() {
        bail!("SECRETS_MISSING: api.access_token_env names no env var");
    }

    match lookup(var) {
        Some(v) if !v.trim().is_empty() => Ok(ResolvedSecrets {
            access_token: v.trim().to_string(),
        }),
        _ => bail!(
            "SECRETS_MISSING: required env var '{}' (access token) is not set or empty",
            var
        ),
    }
}
