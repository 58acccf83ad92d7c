// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod ingest;
pub mod post;
pub mod publish;
pub mod rotation;
pub mod scheduler;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::error::{Error, Result};
pub use crate::fingerprint::{fingerprint, Fingerprint};
pub use crate::post::{Post, PostState};
pub use crate::scheduler::Service;
pub use crate::store::PostStore;
