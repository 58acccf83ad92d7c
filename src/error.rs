// src/error.rs
//! Error taxonomy shared by the store, the pipelines and the adapters.
//!
//! Every variant is recoverable at the item or identity boundary; nothing here
//! is allowed to take the whole process down.

use thiserror::Error;

use crate::fingerprint::Fingerprint;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Network failure or timeout while scraping or downloading.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Upstream returned something we could not make sense of.
    #[error("unexpected shape: {0}")]
    Parse(String),

    /// `(identity, fingerprint)` is already known. Benign.
    #[error("duplicate key {identity}/{fingerprint}")]
    DuplicateKey {
        identity: String,
        fingerprint: Fingerprint,
    },

    #[error("not found: {0}")]
    NotFound(String),

    /// The publishing platform rejected one of the three publish calls.
    #[error("publish failed: {0}")]
    Publish(String),

    /// Persistence layer failure.
    #[error("store failure: {0}")]
    Store(String),
}

impl Error {
    /// True for errors that only mean "we have seen this one already".
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Error::DuplicateKey { .. })
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Error::Parse(err.to_string())
        } else {
            Error::Fetch(err.to_string())
        }
    }
}
