// src/ingest/mod.rs
pub mod providers;
pub mod types;

use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Identity;
use crate::error::{Error, Result};
use crate::post::{Post, PostState};
use crate::rotation::SourceRotation;
use crate::store::PostStore;
use types::{Candidate, MediaFetcher, MediaResolver, Scraper};

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "ingest_candidates_total",
            "Candidates returned by scrapers."
        );
        describe_counter!("ingest_queued_total", "Posts persisted as queued.");
        describe_counter!(
            "ingest_discarded_total",
            "Posts persisted as discarded (no media or fetch failure)."
        );
        describe_counter!(
            "ingest_duplicates_total",
            "Candidates dropped because their fingerprint is already known."
        );
        describe_counter!(
            "ingest_source_errors_total",
            "Scraper fetch/parse failures."
        );
        describe_gauge!(
            "ingest_last_run_ts",
            "Unix ts of the last ingestion run."
        );
    });
}

/// Normalize a scraped title: decode entities and collapse whitespace.
/// Angle brackets are kept; feed titles are plain text once decoded.
pub fn normalize_title(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&decoded, " ").trim().to_string()
}

/// True if the URL path ends in an image file extension.
pub fn is_image_link(link: &str) -> bool {
    static RE_IMG: OnceCell<Regex> = OnceCell::new();
    let re = RE_IMG.get_or_init(|| {
        Regex::new(r"(?i)^https?://[^\s?#]+\.(?:jpe?g|png|gif|webp)(?:[?#]\S*)?$").unwrap()
    });
    re.is_match(link.trim())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Queued,
    Discarded,
    Duplicate,
    /// Nothing usable (e.g. empty title); not remembered.
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub source: String,
    pub candidates: usize,
    pub queued: usize,
    pub discarded: usize,
    pub duplicates: usize,
    pub skipped: usize,
}

impl IngestReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Queued => self.queued += 1,
            Outcome::Discarded => self.discarded += 1,
            Outcome::Duplicate => self.duplicates += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }
}

/// Discovery -> dedup -> media fetch -> persist, for one identity per call.
pub struct IngestPipeline {
    scraper: Arc<dyn Scraper>,
    resolver: Arc<dyn MediaResolver>,
    fetcher: Arc<dyn MediaFetcher>,
    store: Arc<PostStore>,
    rotation: Arc<SourceRotation>,
    timeout: Duration,
}

impl IngestPipeline {
    pub fn new(
        scraper: Arc<dyn Scraper>,
        resolver: Arc<dyn MediaResolver>,
        fetcher: Arc<dyn MediaFetcher>,
        store: Arc<PostStore>,
        rotation: Arc<SourceRotation>,
        timeout: Duration,
    ) -> Self {
        Self {
            scraper,
            resolver,
            fetcher,
            store,
            rotation,
            timeout,
        }
    }

    /// Run one ingestion tick for `identity`.
    ///
    /// A scraper failure is returned as an error with no post written. Per-item
    /// failures are absorbed into the report; only a store failure stops the
    /// remaining candidates.
    pub async fn run_once(&self, identity: &Identity) -> Result<IngestReport> {
        ensure_metrics_described();

        let Some(source) = self.rotation.next(&identity.id, &identity.sources)? else {
            return Ok(IngestReport::default());
        };

        let fetched = tokio::time::timeout(self.timeout, self.scraper.fetch_candidates(&source))
            .await
            .unwrap_or_else(|_| Err(Error::Fetch(format!("scraping {source} timed out"))));
        let candidates = match fetched {
            Ok(c) => c,
            Err(e) => {
                counter!("ingest_source_errors_total").increment(1);
                return Err(e);
            }
        };

        let mut report = IngestReport {
            source: source.clone(),
            candidates: candidates.len(),
            ..Default::default()
        };
        counter!("ingest_candidates_total").increment(candidates.len() as u64);

        for cand in candidates {
            let outcome = self.process_candidate(identity, &source, cand).await?;
            report.record(outcome);
        }

        counter!("ingest_queued_total").increment(report.queued as u64);
        counter!("ingest_discarded_total").increment(report.discarded as u64);
        counter!("ingest_duplicates_total").increment(report.duplicates as u64);
        gauge!("ingest_last_run_ts").set(Utc::now().timestamp() as f64);

        tracing::info!(
            target: "ingest",
            identity = %identity.id,
            source = %source,
            scraper = self.scraper.name(),
            candidates = report.candidates,
            queued = report.queued,
            discarded = report.discarded,
            duplicates = report.duplicates,
            "ingest tick"
        );
        Ok(report)
    }

    async fn process_candidate(
        &self,
        identity: &Identity,
        source: &str,
        cand: Candidate,
    ) -> Result<Outcome> {
        let title = normalize_title(&cand.title);
        if title.is_empty() {
            return Ok(Outcome::Skipped);
        }

        let author = cand
            .author
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());
        let mut post = Post::discovered(&identity.id, &title, cand.link.trim(), source, author, Utc::now());

        if self.store.exists(&identity.id, post.fingerprint)? {
            return Ok(Outcome::Duplicate);
        }

        let media_url = match self.locate_media(&post.source_url).await {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!(target: "ingest", identity = %identity.id, fingerprint = %post.fingerprint, error = %e, "no media");
                return self.persist_discarded(post);
            }
        };
        post.advance(PostState::MediaFetched);

        let dest = identity.media_path(&post.fingerprint);
        let downloaded = tokio::time::timeout(self.timeout, self.fetcher.download(&media_url, &dest))
            .await
            .unwrap_or_else(|_| Err(Error::Fetch(format!("downloading {media_url} timed out"))));
        if let Err(e) = downloaded {
            tracing::warn!(target: "ingest", identity = %identity.id, fingerprint = %post.fingerprint, url = %media_url, error = %e, "media fetch failed");
            remove_partial(&dest).await;
            return self.persist_discarded(post);
        }

        post.local_media_path = Some(dest);
        post.advance(PostState::Queued);
        self.persist(post, Outcome::Queued)
    }

    async fn locate_media(&self, link: &str) -> Result<String> {
        if is_image_link(link) {
            return Ok(link.to_string());
        }
        let resolved = tokio::time::timeout(self.timeout, self.resolver.resolve_image_link(link))
            .await
            .unwrap_or_else(|_| Err(Error::Fetch(format!("resolving {link} timed out"))))?;
        if is_image_link(&resolved) {
            Ok(resolved)
        } else {
            Err(Error::NotFound(format!("{resolved} is not an image link")))
        }
    }

    fn persist_discarded(&self, mut post: Post) -> Result<Outcome> {
        post.advance(PostState::Discarded);
        self.persist(post, Outcome::Discarded)
    }

    fn persist(&self, post: Post, outcome: Outcome) -> Result<Outcome> {
        match self.store.insert(post) {
            Ok(()) => Ok(outcome),
            Err(e) if e.is_duplicate() => Ok(Outcome::Duplicate),
            Err(e) => Err(e),
        }
    }
}

/// Drop whatever a failed or timed-out download left behind.
async fn remove_partial(dest: &Path) {
    match tokio::fs::remove_file(dest).await {
        Ok(()) => tracing::debug!(target: "ingest", path = %dest.display(), "removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(target: "ingest", path = %dest.display(), error = %e, "could not remove partial download"),
    }
}
