// tests/common/mod.rs
// Fake adapters and a small harness shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use history_dosis::config::{Credentials, Identity};
use history_dosis::error::{Error, Result};
use history_dosis::ingest::types::{Candidate, MediaFetcher, MediaResolver, Scraper};
use history_dosis::ingest::IngestPipeline;
use history_dosis::publish::archive::FsArchiver;
use history_dosis::publish::types::{MediaId, Publisher, Receipt};
use history_dosis::publish::PublishPipeline;
use history_dosis::rotation::SourceRotation;
use history_dosis::PostStore;

pub const MEDIA_BYTES: &[u8] = b"\xff\xd8\xff\xe0fake-jpeg";

/// Longer than any pipeline timeout used by the harness.
pub const STALL: Duration = Duration::from_secs(600);

fn write_partial(dest: &Path) {
    if let Some(dir) = dest.parent() {
        std::fs::create_dir_all(dir).unwrap();
    }
    std::fs::write(dest, &MEDIA_BYTES[..4]).unwrap();
}

#[derive(Default)]
pub struct FakeScraper {
    pub feeds: Mutex<HashMap<String, Vec<Candidate>>>,
    pub failing: Mutex<HashSet<String>>,
    pub stalled: Mutex<HashSet<String>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeScraper {
    pub fn set(&self, source: &str, cands: Vec<Candidate>) {
        self.feeds.lock().unwrap().insert(source.to_string(), cands);
    }

    pub fn fail(&self, source: &str) {
        self.failing.lock().unwrap().insert(source.to_string());
    }

    /// Make `source` hang well past the pipeline timeout.
    pub fn stall(&self, source: &str) {
        self.stalled.lock().unwrap().insert(source.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Scraper for FakeScraper {
    async fn fetch_candidates(&self, source: &str) -> Result<Vec<Candidate>> {
        self.calls.lock().unwrap().push(source.to_string());
        let stalled = self.stalled.lock().unwrap().contains(source);
        if stalled {
            tokio::time::sleep(STALL).await;
        }
        if self.failing.lock().unwrap().contains(source) {
            return Err(Error::Fetch(format!("{source} unreachable")));
        }
        Ok(self
            .feeds
            .lock()
            .unwrap()
            .get(source)
            .cloned()
            .unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

#[derive(Default)]
pub struct FakeResolver {
    pub pages: Mutex<HashMap<String, String>>,
}

impl FakeResolver {
    pub fn set(&self, page: &str, image: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(page.to_string(), image.to_string());
    }
}

#[async_trait]
impl MediaResolver for FakeResolver {
    async fn resolve_image_link(&self, page_url: &str) -> Result<String> {
        self.pages
            .lock()
            .unwrap()
            .get(page_url)
            .cloned()
            .ok_or_else(|| Error::NotFound(page_url.to_string()))
    }
}

/// Writes [`MEDIA_BYTES`] to the destination. Broken and stalled URLs leave a
/// truncated file behind, like an interrupted transfer.
#[derive(Default)]
pub struct FakeFetcher {
    pub broken: Mutex<HashSet<String>>,
    pub stalled: Mutex<HashSet<String>>,
    pub downloads: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn break_url(&self, url: &str) {
        self.broken.lock().unwrap().insert(url.to_string());
    }

    pub fn stall_url(&self, url: &str) {
        self.stalled.lock().unwrap().insert(url.to_string());
    }
}

#[async_trait]
impl MediaFetcher for FakeFetcher {
    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        self.downloads.lock().unwrap().push(url.to_string());
        let stalled = self.stalled.lock().unwrap().contains(url);
        if stalled {
            write_partial(dest);
            tokio::time::sleep(STALL).await;
        }
        if self.broken.lock().unwrap().contains(url) {
            write_partial(dest);
            return Err(Error::Fetch(format!("{url}: connection reset")));
        }
        if let Some(dir) = dest.parent() {
            std::fs::create_dir_all(dir).unwrap();
        }
        std::fs::write(dest, MEDIA_BYTES).unwrap();
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Upload,
    AltText,
    Post,
}

#[derive(Default)]
pub struct FakePublisher {
    pub fail_at: Mutex<Option<Step>>,
    pub stall_at: Mutex<Option<Step>>,
    pub uploads: Mutex<Vec<Vec<u8>>>,
    pub alt_texts: Mutex<Vec<String>>,
    pub posts: Mutex<Vec<String>>,
}

impl FakePublisher {
    pub fn fail_at(&self, step: Option<Step>) {
        *self.fail_at.lock().unwrap() = step;
    }

    pub fn stall_at(&self, step: Option<Step>) {
        *self.stall_at.lock().unwrap() = step;
    }

    async fn check(&self, step: Step) -> Result<()> {
        let stalled = *self.stall_at.lock().unwrap() == Some(step);
        if stalled {
            tokio::time::sleep(STALL).await;
        }
        if *self.fail_at.lock().unwrap() == Some(step) {
            return Err(Error::Publish(format!("{step:?} rejected")));
        }
        Ok(())
    }
}

#[async_trait]
impl Publisher for FakePublisher {
    async fn upload_media(&self, _creds: &Credentials, bytes: Vec<u8>) -> Result<MediaId> {
        self.check(Step::Upload).await?;
        self.uploads.lock().unwrap().push(bytes);
        Ok(MediaId("m-1".into()))
    }

    async fn attach_alt_text(&self, _creds: &Credentials, _media: &MediaId, text: &str) -> Result<()> {
        self.check(Step::AltText).await?;
        self.alt_texts.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn publish(&self, _creds: &Credentials, text: &str, _media: &MediaId) -> Result<Receipt> {
        self.check(Step::Post).await?;
        let mut posts = self.posts.lock().unwrap();
        posts.push(text.to_string());
        let id = posts.len().to_string();
        Ok(Receipt {
            permalink: format!("https://social.test/status/{id}"),
            post_id: id,
        })
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

pub fn identity(root: &Path, id: &str, sources: &[&str]) -> Identity {
    Identity {
        id: id.to_string(),
        sources: sources.iter().map(|s| s.to_string()).collect(),
        media_dir: root.join("media").join(id),
        archive_dir: root.join("archive").join(id),
        hashtag: true,
        credentials: Credentials::default(),
    }
}

/// Fakes + real store/rotation rooted in a temp dir.
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub scraper: Arc<FakeScraper>,
    pub resolver: Arc<FakeResolver>,
    pub fetcher: Arc<FakeFetcher>,
    pub publisher: Arc<FakePublisher>,
    pub store: Arc<PostStore>,
    pub rotation: Arc<SourceRotation>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(PostStore::open(dir.path().join("state/posts.json")).unwrap());
        let rotation =
            Arc::new(SourceRotation::open(dir.path().join("state/rotation.json")).unwrap());
        Self {
            dir,
            scraper: Arc::default(),
            resolver: Arc::default(),
            fetcher: Arc::default(),
            publisher: Arc::default(),
            store,
            rotation,
        }
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn identity(&self, id: &str, sources: &[&str]) -> Identity {
        identity(self.dir.path(), id, sources)
    }

    pub fn ingest(&self) -> IngestPipeline {
        IngestPipeline::new(
            self.scraper.clone(),
            self.resolver.clone(),
            self.fetcher.clone(),
            self.store.clone(),
            self.rotation.clone(),
            Duration::from_secs(5),
        )
    }

    pub fn publish(&self) -> PublishPipeline {
        PublishPipeline::new(
            self.publisher.clone(),
            Arc::new(FsArchiver),
            self.store.clone(),
            Duration::from_secs(5),
        )
    }

    /// Reopen the store from disk, as a restarted process would.
    pub fn reopen_store(&self) -> PostStore {
        PostStore::open(self.store.path()).unwrap()
    }
}
