// src/ingest/types.rs
use std::path::Path;

use crate::error::Result;

/// Raw candidate as handed back by a scraper, before normalization.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    /// Direct media URL or the page that hosts the media.
    pub link: String,
    pub author: Option<String>,
}

impl Candidate {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            author: None,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}

/// Lists candidate posts of one named source. `Fetch` on network failure,
/// `Parse` on an unexpected document.
#[async_trait::async_trait]
pub trait Scraper: Send + Sync {
    async fn fetch_candidates(&self, source: &str) -> Result<Vec<Candidate>>;
    fn name(&self) -> &'static str;
}

/// Finds the image embedded in a page. `NotFound` when there is none.
#[async_trait::async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve_image_link(&self, page_url: &str) -> Result<String>;
}

/// Downloads `url` to `dest`.
#[async_trait::async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn download(&self, url: &str, dest: &Path) -> Result<()>;
}
