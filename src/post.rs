// src/post.rs
//! Post record and its lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::fingerprint::{fingerprint, Fingerprint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostState {
    Discovered,
    MediaFetched,
    Queued,
    Published,
    Discarded,
}

impl PostState {
    /// Allowed lifecycle edges:
    /// Discovered -> MediaFetched -> Queued -> Published, and
    /// Discovered | MediaFetched -> Discarded.
    pub fn can_transition_to(self, next: PostState) -> bool {
        use PostState::*;
        matches!(
            (self, next),
            (Discovered, MediaFetched)
                | (Discovered, Discarded)
                | (MediaFetched, Queued)
                | (MediaFetched, Discarded)
                | (Queued, Published)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PostState::Discovered => "discovered",
            PostState::MediaFetched => "media_fetched",
            PostState::Queued => "queued",
            PostState::Published => "published",
            PostState::Discarded => "discarded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub fingerprint: Fingerprint,
    pub identity_id: String,
    pub title: String,
    /// Link as discovered: either the media itself or the page hosting it.
    pub source_url: String,
    pub source_name: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub local_media_path: Option<PathBuf>,
    pub state: PostState,
    pub discovered_at: DateTime<Utc>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl Post {
    /// New post in `Discovered` state, keyed by the fingerprint of its title.
    pub fn discovered(
        identity_id: &str,
        title: &str,
        source_url: &str,
        source_name: &str,
        author: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            fingerprint: fingerprint(title),
            identity_id: identity_id.to_string(),
            title: title.to_string(),
            source_url: source_url.to_string(),
            source_name: source_name.to_string(),
            author,
            local_media_path: None,
            state: PostState::Discovered,
            discovered_at: now,
            published_at: None,
        }
    }

    /// Move to `next` if the lifecycle allows it. Returns false (and leaves the
    /// post untouched) otherwise.
    pub fn advance(&mut self, next: PostState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        true
    }
}
