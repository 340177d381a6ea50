//! store/lock — advisory single-writer lock on `<root>/LOCK` (fs2).
//!
//! Released on Drop; unlock errors at drop time are deliberately
//! ignored.

use anyhow::{anyhow, Context, Result};
use fs2::FileExt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct LockGuard {
    file: std::fs::File,
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Take the exclusive store lock without blocking.
pub fn acquire_exclusive_lock(root: &Path) -> Result<LockGuard> {
    let path = root.join("LOCK");
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&path)
        .with_context(|| format!("open lock file {}", path.display()))?;
    file.try_lock_exclusive()
        .map_err(|e| anyhow!("store at {} is locked by another process: {}", root.display(), e))?;
    Ok(LockGuard { file, path })
}
