// src/publish/archive.rs
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;

use super::types::Archiver;
use crate::error::{Error, Result};

/// Filesystem archiver: rename, or copy + delete when rename is not possible
/// (e.g. archive on another device).
#[derive(Debug, Default, Clone, Copy)]
pub struct FsArchiver;

#[async_trait]
impl Archiver for FsArchiver {
    async fn relocate(&self, src: &Path, dest: &Path) -> Result<()> {
        if let Some(dir) = dest.parent() {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| Error::Store(format!("creating {}: {e}", dir.display())))?;
        }

        match fs::rename(src, dest).await {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("{}: {e}", src.display())));
            }
            Err(e) => {
                tracing::debug!(target: "publish", src = %src.display(), error = %e, "rename failed, copying");
            }
        }

        fs::copy(src, dest)
            .await
            .map_err(|e| Error::Store(format!("copying {} -> {}: {e}", src.display(), dest.display())))?;
        fs::remove_file(src)
            .await
            .map_err(|e| Error::Store(format!("removing {}: {e}", src.display())))?;
        Ok(())
    }
}
