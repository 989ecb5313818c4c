//! Bring up a standalone store rooted at a directory.
//!
//! Порядок:
//! 1) LOCK (exclusive), control file;
//! 2) allocator + WAL from the control file;
//! 3) shmem_init, valid range, startup if tracking was on at the last checkpoint;
//! 4) replay после redo_lsn;
//! 5) complete_init по конфигу и end-of-recovery checkpoint (он же пишет control).

use anyhow::{anyhow, Context, Result};
use log::info;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use super::CommitTs;
use crate::config::CtsConfig;
use crate::control::read_control;
use crate::lock::try_acquire_exclusive_lock;
use crate::wal::{replay_wal, WalFile, INVALID_LSN};
use crate::xid::{xid_is_valid, FullTransactionId, XidAllocator, FIRST_NORMAL_XID};

pub fn boot(root: &Path, cfg: CtsConfig) -> Result<CommitTs> {
    cfg.validate()?;
    fs::create_dir_all(root).with_context(|| format!("create root {}", root.display()))?;
    let lock = try_acquire_exclusive_lock(root)?;

    let control = read_control(root)?;
    if let Some(c) = &control {
        if c.page_size as usize != cfg.page_size {
            return Err(anyhow!(
                "{} was created with page_size={}, configured page_size={}",
                root.display(),
                c.page_size,
                cfg.page_size
            ));
        }
    }

    let (next_fxid, oldest_xid) = control
        .map(|c| (c.next_fxid, c.oldest_xid))
        .unwrap_or((FullTransactionId::FIRST_NORMAL, FIRST_NORMAL_XID));
    let xids = Arc::new(XidAllocator::new(next_fxid, oldest_xid));
    let wal = Arc::new(WalFile::open(root, cfg.wal_fsync)?);

    let mut cts = CommitTs::shmem_init(root, cfg, wal, xids)?;
    cts.attach_dir(lock);

    match &control {
        None => cts.bootstrap()?,
        Some(c) => {
            if xid_is_valid(c.oldest_cts_xid) {
                cts.set_limit(c.oldest_cts_xid, c.newest_cts_xid);
            }
            if c.tracking_active {
                cts.startup();
            }
        }
    }

    let redo_lsn = control.map_or(INVALID_LSN, |c| c.redo_lsn);
    let stats = replay_wal(root, &cts, redo_lsn)?;
    cts.update_cached_xid_range();

    cts.complete_init();
    let ck = cts.checkpoint();
    info!(
        "commit_ts ready at {}: tracking={} next_xid={} replayed={} redo_lsn={}",
        root.display(),
        cts.is_enabled(),
        cts.xids().read_next_full_xid(),
        stats.applied,
        ck.redo_lsn
    );
    Ok(cts)
}
