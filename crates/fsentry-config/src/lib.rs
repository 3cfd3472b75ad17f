//! fsentry-config
//!
//! Layered YAML configuration for the suppression daemon.
//!
//! - YAML documents are merged in order; later documents override earlier ones.
//! - Leaf strings that look like credentials are rejected: the YAML stores
//!   env var NAMES only (see [`secrets`]).
//! - The merged document is hashed so the daemon can log which config it runs.
//! - `API_ENDPOINT` and `LIST_NAME` from the environment override the YAML.

pub mod secrets;
pub mod settings;

pub use secrets::{resolve_secrets, resolve_secrets_with, ResolvedSecrets};
pub use settings::*;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

pub const ENV_API_ENDPOINT: &str = "API_ENDPOINT";
pub const ENV_LIST_NAME: &str = "LIST_NAME";

/// Prefixes of credential-looking values that must never appear in YAML.
const SECRET_PREFIXES: &[&str] = &[
    "eyJ",        // JWT (OAuth 2 owner-only access tokens)
    "Bearer ",    // pasted Authorization header
    "-----BEGIN", // PEM private keys
    "ghp_",       // GitHub PAT
    "glpat-",     // GitLab PAT
    "xoxb-",      // Slack bot token
];

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub config_json: Value,
    pub config: SentryConfig,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        // An empty document parses as null; treat it as "no overrides".
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        if v_yaml.is_null() {
            continue;
        }
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical = serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = sha256_hex(canonical.as_bytes());
    let config: SentryConfig =
        serde_json::from_value(merged.clone()).context("config does not match schema")?;

    Ok(LoadedConfig {
        config_hash,
        config_json: merged,
        config,
    })
}

/// Apply `API_ENDPOINT` / `LIST_NAME` overrides from the process environment.
pub fn apply_env_overrides(cfg: &mut SentryConfig) {
    apply_env_overrides_with(cfg, |name| std::env::var(name).ok());
}

/// Same as [`apply_env_overrides`] with an injectable lookup.
pub fn apply_env_overrides_with<F>(cfg: &mut SentryConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = non_blank(lookup(ENV_API_ENDPOINT)) {
        cfg.api.endpoint = v;
    }
    if let Some(v) = non_blank(lookup(ENV_LIST_NAME)) {
        cfg.allow_list.page = v;
    }
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    collect_string_leaves(v, "", &mut leaves);

    for (ptr, s) in leaves {
        if looks_like_secret(s) {
            bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
        }
    }
    Ok(())
}

fn collect_string_leaves<'a>(v: &'a Value, prefix: &str, out: &mut Vec<(String, &'a str)>) {
    match v {
        Value::Object(map) => {
            for (k, child) in map {
                collect_string_leaves(child, &format!("{prefix}/{k}"), out);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                collect_string_leaves(child, &format!("{prefix}/{i}"), out);
            }
        }
        Value::String(s) => out.push((prefix.to_string(), s.as_str())),
        _ => {}
    }
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}
