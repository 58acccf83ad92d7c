// src/publish/mod.rs
pub mod archive;
pub mod dry_run;
pub mod render;
pub mod types;
pub mod x;

use chrono::Utc;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Identity;
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use crate::store::PostStore;
use types::{Archiver, Publisher, Receipt};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("publish_success_total", "Posts published.");
        describe_counter!(
            "publish_errors_total",
            "Publish attempts that failed; the post stays queued."
        );
        describe_counter!(
            "publish_empty_total",
            "Publish ticks with nothing queued."
        );
        describe_counter!(
            "publish_archive_errors_total",
            "Published posts whose media could not be archived."
        );
        describe_histogram!(
            "publish_duration_ms",
            "Upload + alt text + post, in milliseconds."
        );
    });
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    NothingQueued,
    Published {
        fingerprint: Fingerprint,
        receipt: Receipt,
        text: String,
        /// Where the media ended up; `None` if archival failed.
        archived_to: Option<PathBuf>,
    },
}

/// Select -> render -> publish -> mark done, at most one post per call.
pub struct PublishPipeline {
    publisher: Arc<dyn Publisher>,
    archiver: Arc<dyn Archiver>,
    store: Arc<PostStore>,
    timeout: Duration,
    render_limit: usize,
}

impl PublishPipeline {
    pub fn new(
        publisher: Arc<dyn Publisher>,
        archiver: Arc<dyn Archiver>,
        store: Arc<PostStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            publisher,
            archiver,
            store,
            timeout,
            render_limit: render::DEFAULT_LIMIT,
        }
    }

    pub fn with_render_limit(mut self, limit: usize) -> Self {
        self.render_limit = limit;
        self
    }

    /// Publish one queued post of `identity`.
    ///
    /// Any failure before the platform confirms the post leaves it `Queued`
    /// for the next tick. Archival problems after success are logged only.
    pub async fn run_once(&self, identity: &Identity) -> Result<PublishOutcome> {
        ensure_metrics_described();

        if let Err(e) = self.store.flush() {
            tracing::warn!(target: "publish", identity = %identity.id, error = %e, "snapshot still behind memory");
        }

        let Some(post) = self.store.pick_one_queued(&identity.id)? else {
            counter!("publish_empty_total").increment(1);
            tracing::info!(target: "publish", identity = %identity.id, "nothing to publish");
            return Ok(PublishOutcome::NothingQueued);
        };

        let text = render::render_post(&post, identity.hashtag, self.render_limit);
        let media_path = post
            .local_media_path
            .clone()
            .ok_or_else(|| Error::NotFound(format!("post {} has no media", post.fingerprint)))?;
        let bytes = tokio::fs::read(&media_path)
            .await
            .map_err(|e| Error::NotFound(format!("{}: {e}", media_path.display())))?;

        let t0 = Instant::now();
        let receipt = match self.send(identity, bytes, &text).await {
            Ok(r) => r,
            Err(e) => {
                counter!("publish_errors_total").increment(1);
                return Err(e);
            }
        };
        histogram!("publish_duration_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        if let Err(e) = self
            .store
            .mark_published(&identity.id, post.fingerprint, Utc::now())
        {
            tracing::error!(target: "publish", identity = %identity.id, fingerprint = %post.fingerprint, permalink = %receipt.permalink, error = %e, "published but snapshot write failed; kept published in memory");
            return Err(e);
        }
        counter!("publish_success_total").increment(1);
        tracing::info!(
            target: "publish",
            identity = %identity.id,
            fingerprint = %post.fingerprint,
            publisher = self.publisher.name(),
            permalink = %receipt.permalink,
            "published"
        );

        let archived_to = self.archive(identity, post.fingerprint, media_path).await;

        Ok(PublishOutcome::Published {
            fingerprint: post.fingerprint,
            receipt,
            text,
            archived_to,
        })
    }

    async fn send(&self, identity: &Identity, bytes: Vec<u8>, text: &str) -> Result<Receipt> {
        let creds = &identity.credentials;
        let media = self
            .bounded("upload", self.publisher.upload_media(creds, bytes))
            .await?;
        self.bounded("alt text", self.publisher.attach_alt_text(creds, &media, text))
            .await?;
        self.bounded("post", self.publisher.publish(creds, text, &media))
            .await
    }

    async fn bounded<T>(&self, step: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .unwrap_or_else(|_| Err(Error::Publish(format!("{step} timed out"))))
    }

    async fn archive(
        &self,
        identity: &Identity,
        fp: Fingerprint,
        media_path: PathBuf,
    ) -> Option<PathBuf> {
        let file_name = media_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| format!("{fp}.jpg").into());
        let dest = identity.archive_dir.join(file_name);

        if let Err(e) = self.archiver.relocate(&media_path, &dest).await {
            counter!("publish_archive_errors_total").increment(1);
            tracing::warn!(target: "publish", identity = %identity.id, fingerprint = %fp, error = %e, "archiving media failed");
            return None;
        }
        if let Err(e) = self.store.set_media_path(&identity.id, fp, dest.clone()) {
            tracing::warn!(target: "publish", identity = %identity.id, fingerprint = %fp, error = %e, "recording archived path failed");
        }
        Some(dest)
    }
}
