//! Data-directory lock (fs2 advisory lock on <root>/LOCK).
//!
//! - Exclusive: the process that owns the store (boot / recover).
//! - Shared: offline inspection from the CLI; refuses while an owner runs.
//!
//! The lock is released when the guard drops.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::consts::LOCK_FILE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

#[derive(Debug)]
pub struct LockGuard {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn open_lock_file(root: &Path) -> Result<(File, PathBuf)> {
    let path = root.join(LOCK_FILE);
    let f = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&path)
        .with_context(|| format!("open lock file {}", path.display()))?;
    Ok((f, path))
}

/// Blocks until the lock is granted.
pub fn acquire_lock(root: &Path, mode: LockMode) -> Result<LockGuard> {
    let (file, path) = open_lock_file(root)?;
    match mode {
        LockMode::Shared => file
            .lock_shared()
            .with_context(|| format!("lock_shared {}", path.display()))?,
        LockMode::Exclusive => file
            .lock_exclusive()
            .with_context(|| format!("lock_exclusive {}", path.display()))?,
    }
    Ok(LockGuard { file, path, mode })
}

/// Fails immediately if a conflicting lock is held.
pub fn try_acquire_lock(root: &Path, mode: LockMode) -> Result<LockGuard> {
    let (file, path) = open_lock_file(root)?;
    match mode {
        LockMode::Shared => file.try_lock_shared().with_context(|| {
            format!("{} is owned by a running process", root.display())
        })?,
        LockMode::Exclusive => file.try_lock_exclusive().with_context(|| {
            format!("{} is already locked by another process", root.display())
        })?,
    }
    Ok(LockGuard { file, path, mode })
}

pub fn try_acquire_exclusive_lock(root: &Path) -> Result<LockGuard> {
    try_acquire_lock(root, LockMode::Exclusive)
}

pub fn try_acquire_shared_lock(root: &Path) -> Result<LockGuard> {
    try_acquire_lock(root, LockMode::Shared)
}
