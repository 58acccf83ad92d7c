// src/store.rs
//! Durable post table plus dedup index, keyed by `(identity, fingerprint)`.
//!
//! The whole table lives in memory behind a mutex and is written to a JSON
//! snapshot (temp file + rename) after every mutation. Reopening the same path
//! rebuilds the exact dedup index and queue contents.

use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use crate::post::{Post, PostState};

type Key = (String, Fingerprint);

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    posts: Vec<Post>,
}

/// Per-state tally for one identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub queued: usize,
    pub published: usize,
    pub discarded: usize,
}

#[derive(Debug)]
pub struct PostStore {
    path: PathBuf,
    posts: Mutex<HashMap<Key, Post>>,
    /// In-memory table is ahead of the snapshot on disk.
    dirty: AtomicBool,
}

impl PostStore {
    /// Open (or create) the store backed by the snapshot at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let posts = match fs::read_to_string(&path) {
            Ok(s) => {
                let snap: Snapshot = serde_json::from_str(&s).map_err(|e| {
                    Error::Store(format!("corrupt snapshot {}: {e}", path.display()))
                })?;
                if snap.version != SNAPSHOT_VERSION {
                    return Err(Error::Store(format!(
                        "unsupported snapshot version {} in {}",
                        snap.version,
                        path.display()
                    )));
                }
                snap.posts
                    .into_iter()
                    .map(|p| ((p.identity_id.clone(), p.fingerprint), p))
                    .collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(Error::Store(format!("reading {}: {e}", path.display())));
            }
        };

        tracing::debug!(target: "store", path = %path.display(), posts = posts.len(), "post store opened");
        Ok(Self {
            path,
            posts: Mutex::new(posts),
            dirty: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True if a post with this key exists in any state.
    pub fn exists(&self, identity_id: &str, fp: Fingerprint) -> Result<bool> {
        let posts = self.lock()?;
        Ok(posts.contains_key(&(identity_id.to_string(), fp)))
    }

    pub fn get(&self, identity_id: &str, fp: Fingerprint) -> Result<Option<Post>> {
        let posts = self.lock()?;
        Ok(posts.get(&(identity_id.to_string(), fp)).cloned())
    }

    /// Insert a new `Queued` or `Discarded` post. The key check and the insert
    /// happen under one lock, so a concurrent writer for the same key gets
    /// `DuplicateKey`.
    pub fn insert(&self, post: Post) -> Result<()> {
        if !matches!(post.state, PostState::Queued | PostState::Discarded) {
            return Err(Error::Store(format!(
                "refusing to persist post {} in state {}",
                post.fingerprint,
                post.state.as_str()
            )));
        }

        let key = (post.identity_id.clone(), post.fingerprint);
        let mut posts = self.lock()?;
        if posts.contains_key(&key) {
            return Err(Error::DuplicateKey {
                identity: key.0,
                fingerprint: key.1,
            });
        }

        posts.insert(key.clone(), post);
        if let Err(e) = self.persist(&posts) {
            posts.remove(&key);
            return Err(e);
        }
        Ok(())
    }

    /// Uniformly random `Queued` post of this identity.
    pub fn pick_one_queued(&self, identity_id: &str) -> Result<Option<Post>> {
        self.pick_one_queued_with(identity_id, &mut rand::rng())
    }

    pub fn pick_one_queued_with<R: Rng + ?Sized>(
        &self,
        identity_id: &str,
        rng: &mut R,
    ) -> Result<Option<Post>> {
        let posts = self.lock()?;
        let mut queued: Vec<&Post> = posts
            .values()
            .filter(|p| p.identity_id == identity_id && p.state == PostState::Queued)
            .collect();
        // HashMap order is not stable; sort so a seeded rng is reproducible.
        queued.sort_by_key(|p| p.fingerprint);
        Ok(queued.choose(rng).map(|p| (*p).clone()))
    }

    /// `Queued` -> `Published`. `NotFound` if the post is missing or not queued.
    ///
    /// The platform has already accepted the post when this is called, so a
    /// failed snapshot write does not undo the transition: the post stays
    /// `Published` in memory, the store is flagged dirty and the next
    /// successful write (or [`PostStore::flush`]) carries it to disk.
    pub fn mark_published(
        &self,
        identity_id: &str,
        fp: Fingerprint,
        now: DateTime<Utc>,
    ) -> Result<Post> {
        let key = (identity_id.to_string(), fp);
        let mut posts = self.lock()?;
        let post = match posts.get_mut(&key) {
            Some(p) if p.state == PostState::Queued => p,
            _ => {
                return Err(Error::NotFound(format!(
                    "no queued post {fp} for identity {identity_id}"
                )))
            }
        };

        post.advance(PostState::Published);
        post.published_at = Some(now);
        let after = post.clone();

        if let Err(e) = self.persist(&posts) {
            self.dirty.store(true, Ordering::SeqCst);
            return Err(e);
        }
        Ok(after)
    }

    /// Record where the media of a post lives now (after archival). This is the
    /// only field that may change on a `Published` post.
    pub fn set_media_path(&self, identity_id: &str, fp: Fingerprint, path: PathBuf) -> Result<()> {
        let key = (identity_id.to_string(), fp);
        let mut posts = self.lock()?;
        let Some(post) = posts.get_mut(&key) else {
            return Err(Error::NotFound(format!(
                "no post {fp} for identity {identity_id}"
            )));
        };

        let previous = post.local_media_path.replace(path);
        if let Err(e) = self.persist(&posts) {
            if let Some(p) = posts.get_mut(&key) {
                p.local_media_path = previous;
            }
            return Err(e);
        }
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Rewrite the snapshot if an earlier write failed. No-op when clean.
    pub fn flush(&self) -> Result<()> {
        if !self.is_dirty() {
            return Ok(());
        }
        let posts = self.lock()?;
        self.persist(&posts)
    }

    pub fn counts(&self, identity_id: &str) -> Result<StateCounts> {
        let posts = self.lock()?;
        let mut out = StateCounts::default();
        for p in posts.values().filter(|p| p.identity_id == identity_id) {
            match p.state {
                PostState::Queued => out.queued += 1,
                PostState::Published => out.published += 1,
                PostState::Discarded => out.discarded += 1,
                PostState::Discovered | PostState::MediaFetched => {}
            }
        }
        Ok(out)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Key, Post>>> {
        self.posts
            .lock()
            .map_err(|_| Error::Store("post store mutex poisoned".into()))
    }

    fn persist(&self, posts: &HashMap<Key, Post>) -> Result<()> {
        let mut list: Vec<Post> = posts.values().cloned().collect();
        list.sort_by(|a, b| {
            (a.discovered_at, &a.identity_id, a.fingerprint).cmp(&(
                b.discovered_at,
                &b.identity_id,
                b.fingerprint,
            ))
        });
        let snap = Snapshot {
            version: SNAPSHOT_VERSION,
            posts: list,
        };
        let json = serde_json::to_vec_pretty(&snap)
            .map_err(|e| Error::Store(format!("encoding snapshot: {e}")))?;
        write_atomic(&self.path, &json)
            .map_err(|e| Error::Store(format!("writing {}: {e}", self.path.display())))?;
        self.dirty.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Run blocking file I/O off the async scheduler when a multi-threaded runtime
/// allows it; current-thread runtimes (and plain threads) run it inline.
pub(crate) fn blocking_io<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(h) if h.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// Write through a sibling temp file and rename over the target.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    blocking_io(|| {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
        fs::rename(tmp, path)
    })
}
