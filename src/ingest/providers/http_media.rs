// src/ingest/providers/http_media.rs
//! Plain HTTP media resolver and downloader.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::path::Path;

use crate::error::{Error, Result};
use crate::ingest::types::{MediaFetcher, MediaResolver};

/// Finds the first absolute image URL mentioned in a page body.
pub struct HttpMediaResolver {
    client: reqwest::Client,
}

impl HttpMediaResolver {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// First `http(s)` URL in `body` whose path ends in an image extension.
pub fn find_image_url(body: &str) -> Option<String> {
    static RE_IMG: OnceCell<Regex> = OnceCell::new();
    let re = RE_IMG.get_or_init(|| {
        Regex::new(r#"(?i)https?://[^\s"'<>()?#]+\.(?:jpe?g|png|gif|webp)(?:\?[^\s"'<>()#]*)?"#)
            .unwrap()
    });
    re.find(body)
        .map(|m| html_escape::decode_html_entities(m.as_str()).to_string())
}

#[async_trait]
impl MediaResolver for HttpMediaResolver {
    async fn resolve_image_link(&self, page_url: &str) -> Result<String> {
        let body = self
            .client
            .get(page_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        find_image_url(&body).ok_or_else(|| Error::NotFound(format!("no image on {page_url}")))
    }
}

pub struct HttpMediaFetcher {
    client: reqwest::Client,
}

impl HttpMediaFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let bytes = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        if bytes.is_empty() {
            return Err(Error::Parse(format!("empty body from {url}")));
        }

        if let Some(dir) = dest.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| Error::Store(format!("creating {}: {e}", dir.display())))?;
        }
        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| Error::Store(format!("writing {}: {e}", dest.display())))?;

        tracing::debug!(target: "ingest", url, dest = %dest.display(), bytes = bytes.len(), "media downloaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_first_image_url() {
        let body = r#"<html><meta property="og:image" content="https://i.imgur.com/Abc.jpg?fb&amp;x=1">
            <img src="https://i.imgur.com/Other.png"></html>"#;
        assert_eq!(
            find_image_url(body).as_deref(),
            Some("https://i.imgur.com/Abc.jpg?fb&x=1")
        );
    }

    #[test]
    fn none_when_page_has_no_image() {
        assert_eq!(find_image_url("<p>just text, see https://example.test/about</p>"), None);
    }
}
