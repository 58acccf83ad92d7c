// src/publish/types.rs
use std::fmt;
use std::path::Path;

use crate::config::Credentials;
use crate::error::Result;

/// Platform-side id of an uploaded media object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaId(pub String);

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the platform hands back for a successful status post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub post_id: String,
    pub permalink: String,
}

/// Three-step publishing sequence. Each step fails with `Error::Publish`.
/// Credentials are whatever the identity was configured with.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn upload_media(&self, creds: &Credentials, bytes: Vec<u8>) -> Result<MediaId>;
    async fn attach_alt_text(&self, creds: &Credentials, media: &MediaId, text: &str) -> Result<()>;
    async fn publish(&self, creds: &Credentials, text: &str, media: &MediaId) -> Result<Receipt>;
    fn name(&self) -> &'static str;
}

/// Moves a published post's media out of the active directory.
#[async_trait::async_trait]
pub trait Archiver: Send + Sync {
    async fn relocate(&self, src: &Path, dest: &Path) -> Result<()>;
}
