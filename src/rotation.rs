// src/rotation.rs
//! Round-robin source selection per identity.
//!
//! One monotonically increasing counter per identity, persisted as a small JSON
//! map next to the post snapshot. `next` returns `sources[counter % len]` and
//! bumps the counter.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::store::write_atomic;

#[derive(Debug)]
pub struct SourceRotation {
    path: PathBuf,
    counters: Mutex<BTreeMap<String, u64>>,
}

impl SourceRotation {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let counters = match fs::read_to_string(&path) {
            Ok(s) => serde_json::from_str(&s).map_err(|e| {
                Error::Store(format!("corrupt rotation state {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(Error::Store(format!("reading {}: {e}", path.display()))),
        };
        Ok(Self {
            path,
            counters: Mutex::new(counters),
        })
    }

    /// Next source for `identity_id`. `None` when the list is empty.
    pub fn next(&self, identity_id: &str, sources: &[String]) -> Result<Option<String>> {
        if sources.is_empty() {
            return Ok(None);
        }

        let mut counters = self
            .counters
            .lock()
            .map_err(|_| Error::Store("rotation mutex poisoned".into()))?;
        let counter = counters.get(identity_id).copied().unwrap_or(0);
        let idx = (counter % sources.len() as u64) as usize;
        counters.insert(identity_id.to_string(), counter.wrapping_add(1));

        let json = serde_json::to_vec_pretty(&*counters)
            .map_err(|e| Error::Store(format!("encoding rotation state: {e}")))?;
        if let Err(e) = write_atomic(&self.path, &json) {
            counters.insert(identity_id.to_string(), counter);
            return Err(Error::Store(format!("writing {}: {e}", self.path.display())));
        }

        Ok(Some(sources[idx].clone()))
    }

    /// Current counter value (number of `next` calls so far).
    pub fn counter(&self, identity_id: &str) -> Result<u64> {
        let counters = self
            .counters
            .lock()
            .map_err(|_| Error::Store("rotation mutex poisoned".into()))?;
        Ok(counters.get(identity_id).copied().unwrap_or(0))
    }
}
