// src/config/mod.rs
//! Startup configuration: intervals, state location, identities.

pub mod identity;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use identity::{Credentials, Identity, IdentityConfig};

pub const ENV_CONFIG_PATH: &str = "DOSIS_CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/dosis.toml";
pub const DEFAULT_JSON_PATH: &str = "config/dosis.json";

fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}
fn default_ingest_interval() -> u64 {
    24 * 3600
}
fn default_publish_interval() -> u64 {
    12 * 3600
}
fn default_network_timeout() -> u64 {
    30
}
fn default_render_limit() -> usize {
    280
}
fn default_feed_base() -> String {
    "https://www.reddit.com".to_string()
}
fn default_publish_api_base() -> String {
    "https://api.x.com".to_string()
}

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    #[serde(default = "default_state_dir")]
    state_dir: PathBuf,
    #[serde(default = "default_ingest_interval")]
    ingest_interval_secs: u64,
    #[serde(default = "default_publish_interval")]
    publish_interval_secs: u64,
    #[serde(default = "default_network_timeout")]
    network_timeout_secs: u64,
    #[serde(default = "default_render_limit")]
    render_limit: usize,
    #[serde(default = "default_feed_base")]
    feed_base_url: String,
    #[serde(default = "default_publish_api_base")]
    publish_api_base: String,
    #[serde(default)]
    dry_run: bool,
    identities: Vec<IdentityConfig>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub state_dir: PathBuf,
    pub ingest_interval: Duration,
    pub publish_interval: Duration,
    pub network_timeout: Duration,
    pub render_limit: usize,
    pub feed_base_url: String,
    pub publish_api_base: String,
    /// Log instead of calling the publishing platform.
    pub dry_run: bool,
    pub identities: Vec<Identity>,
}

impl AppConfig {
    pub fn posts_path(&self) -> PathBuf {
        self.state_dir.join("posts.json")
    }

    pub fn rotation_path(&self) -> PathBuf {
        self.state_dir.join("rotation.json")
    }
}

/// Load from an explicit path. TOML or JSON, picked by extension.
pub fn load_from(path: &Path) -> Result<AppConfig> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse(&content, &ext).with_context(|| format!("parsing config {}", path.display()))
}

/// Load using env var + fallbacks:
/// 1) $DOSIS_CONFIG_PATH
/// 2) config/dosis.toml
/// 3) config/dosis.json
pub fn load_default() -> Result<AppConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
        }
        return load_from(&pb);
    }
    for candidate in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
        let pb = PathBuf::from(candidate);
        if pb.exists() {
            return load_from(&pb);
        }
    }
    Err(anyhow!(
        "no config found (set {ENV_CONFIG_PATH} or create {DEFAULT_TOML_PATH})"
    ))
}

pub fn parse(s: &str, hint_ext: &str) -> Result<AppConfig> {
    let raw: RawConfig = if hint_ext == "json" {
        serde_json::from_str(s)?
    } else {
        toml::from_str(s)?
    };
    validate(raw)
}

fn validate(raw: RawConfig) -> Result<AppConfig> {
    if raw.ingest_interval_secs == 0 || raw.publish_interval_secs == 0 {
        bail!("intervals must be > 0");
    }
    if raw.network_timeout_secs == 0 {
        bail!("network_timeout_secs must be > 0");
    }
    if raw.render_limit == 0 {
        bail!("render_limit must be > 0");
    }
    if raw.identities.is_empty() {
        bail!("at least one identity is required");
    }

    let mut seen = HashSet::new();
    let mut identities = Vec::with_capacity(raw.identities.len());
    for ic in raw.identities {
        let identity = Identity::try_from(ic)?;
        if !seen.insert(identity.id.clone()) {
            bail!("duplicate identity id {}", identity.id);
        }
        identities.push(identity);
    }

    Ok(AppConfig {
        state_dir: raw.state_dir,
        ingest_interval: Duration::from_secs(raw.ingest_interval_secs),
        publish_interval: Duration::from_secs(raw.publish_interval_secs),
        network_timeout: Duration::from_secs(raw.network_timeout_secs),
        render_limit: raw.render_limit,
        feed_base_url: raw.feed_base_url.trim_end_matches('/').to_string(),
        publish_api_base: raw.publish_api_base.trim_end_matches('/').to_string(),
        dry_run: raw.dry_run,
        identities,
    })
}
