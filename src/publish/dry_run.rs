// src/publish/dry_run.rs
//! Publisher that only logs. Used when the service runs with `dry_run = true`.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

use super::types::{MediaId, Publisher, Receipt};
use crate::config::Credentials;
use crate::error::Result;

#[derive(Debug, Default)]
pub struct DryRunPublisher {
    seq: AtomicU64,
}

impl DryRunPublisher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Publisher for DryRunPublisher {
    async fn upload_media(&self, _creds: &Credentials, bytes: Vec<u8>) -> Result<MediaId> {
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        tracing::info!(target: "publish", bytes = bytes.len(), "dry-run upload");
        Ok(MediaId(format!("dry-media-{n}")))
    }

    async fn attach_alt_text(&self, _creds: &Credentials, media: &MediaId, text: &str) -> Result<()> {
        tracing::debug!(target: "publish", %media, alt_len = text.chars().count(), "dry-run alt text");
        Ok(())
    }

    async fn publish(&self, _creds: &Credentials, text: &str, media: &MediaId) -> Result<Receipt> {
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        tracing::info!(target: "publish", %media, text, "dry-run publish");
        Ok(Receipt {
            post_id: format!("dry-{n}"),
            permalink: format!("dry-run://status/{n}"),
        })
    }

    fn name(&self) -> &'static str {
        "dry-run"
    }
}
