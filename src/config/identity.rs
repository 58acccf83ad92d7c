// src/config/identity.rs
use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Opaque publishing credentials. Values are handed to the publishing adapter
/// untouched; `Debug` only shows the keys.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Credentials(BTreeMap<String, String>);

impl Credentials {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self(values)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replace every `env:NAME` value with the content of `$NAME`.
    fn resolve_env(&mut self, identity: &str) -> Result<()> {
        for (key, value) in self.0.iter_mut() {
            let Some(var) = value.trim().strip_prefix("env:").map(|v| v.trim().to_string()) else {
                continue;
            };
            *value = std::env::var(&var).map_err(|_| {
                anyhow!("identity {identity}: credential {key} wants missing env var {var}")
            })?;
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

fn default_hashtag() -> bool {
    true
}

/// Identity as written in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    pub id: String,
    pub sources: Vec<String>,
    pub media_dir: PathBuf,
    #[serde(default)]
    pub archive_dir: Option<PathBuf>,
    #[serde(default = "default_hashtag")]
    pub hashtag: bool,
    #[serde(default)]
    pub credentials: Credentials,
}

/// One publishing account. Immutable after load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    /// Ordered, non-empty list of source names this identity rotates through.
    pub sources: Vec<String>,
    pub media_dir: PathBuf,
    pub archive_dir: PathBuf,
    /// Append `#{source}` to rendered posts.
    pub hashtag: bool,
    pub credentials: Credentials,
}

impl Identity {
    /// Where the media of a post with this fingerprint is downloaded to.
    pub fn media_path(&self, fingerprint: &crate::fingerprint::Fingerprint) -> PathBuf {
        self.media_dir.join(format!("{fingerprint}.jpg"))
    }
}

impl TryFrom<IdentityConfig> for Identity {
    type Error = anyhow::Error;

    fn try_from(raw: IdentityConfig) -> Result<Self> {
        let id = raw.id.trim().to_string();
        if id.is_empty() {
            bail!("identity with empty id");
        }

        // keep configured order, drop blanks and repeats
        let mut sources: Vec<String> = Vec::with_capacity(raw.sources.len());
        for s in raw.sources {
            let t = s.trim();
            if !t.is_empty() && !sources.iter().any(|x| x == t) {
                sources.push(t.to_string());
            }
        }
        if sources.is_empty() {
            bail!("identity {id}: no sources configured");
        }

        let mut credentials = raw.credentials;
        credentials.resolve_env(&id)?;

        let archive_dir = raw
            .archive_dir
            .unwrap_or_else(|| raw.media_dir.join("posted"));

        Ok(Identity {
            id,
            sources,
            media_dir: raw.media_dir,
            archive_dir,
            hashtag: raw.hashtag,
            credentials,
        })
    }
}
