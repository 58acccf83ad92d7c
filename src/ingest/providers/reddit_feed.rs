// src/ingest/providers/reddit_feed.rs
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use quick_xml::de::from_str;
use regex::Regex;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::ingest::is_image_link;
use crate::ingest::types::{Candidate, Scraper};

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    title: Option<String>,
    #[serde(rename = "link", default)]
    links: Vec<Link>,
    author: Option<Author>,
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "@href")]
    href: String,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(rename = "$text", default)]
    html: String,
}

/// Candidates from a community's Atom feed (`{base}/r/{source}/.rss`).
pub struct RedditFeedScraper {
    base_url: String,
    client: reqwest::Client,
}

impl RedditFeedScraper {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn feed_url(&self, source: &str) -> String {
        format!("{}/r/{}/.rss", self.base_url, source)
    }
}

/// Parse an Atom document into candidates. Entries without a title or link
/// are dropped.
pub fn parse_feed(xml: &str) -> Result<Vec<Candidate>> {
    let feed: Feed = from_str(xml).map_err(|e| Error::Parse(format!("atom feed: {e}")))?;

    let mut out = Vec::with_capacity(feed.entries.len());
    for entry in feed.entries {
        let Some(title) = entry.title.filter(|t| !t.trim().is_empty()) else {
            continue;
        };
        let page = entry.links.into_iter().next().map(|l| l.href);
        let direct = entry
            .content
            .as_ref()
            .and_then(|c| first_image_href(&c.html));
        let Some(link) = direct.or(page) else {
            continue;
        };

        let mut cand = Candidate::new(title, link);
        if let Some(name) = entry.author.and_then(|a| a.name) {
            let name = name.trim().trim_start_matches('/');
            if !name.is_empty() {
                cand = cand.with_author(name);
            }
        }
        out.push(cand);
    }
    Ok(out)
}

/// First `href` in an HTML fragment that points straight at an image.
fn first_image_href(html: &str) -> Option<String> {
    static RE_HREF: OnceCell<Regex> = OnceCell::new();
    let re = RE_HREF.get_or_init(|| Regex::new(r#"href="([^"]+)""#).unwrap());
    re.captures_iter(html)
        .map(|c| html_escape::decode_html_entities(&c[1]).to_string())
        .find(|href| is_image_link(href))
}

#[async_trait]
impl Scraper for RedditFeedScraper {
    async fn fetch_candidates(&self, source: &str) -> Result<Vec<Candidate>> {
        let url = self.feed_url(source);
        let body = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let cands = parse_feed(&body)?;
        tracing::debug!(target: "ingest", source, url = %url, candidates = cands.len(), "feed parsed");
        Ok(cands)
    }

    fn name(&self) -> &'static str {
        "reddit-feed"
    }
}
