//! Redo pass over the WAL file.
//!
//! - Записи до redo_lsn включительно пропускаются (уже в сегментах после checkpoint).
//! - Записи чужих менеджеров ресурсов игнорируются.
//! - Частичный хвост или CRC mismatch = конец WAL.
//! - Нераспознанная запись commit_ts — фатально: продолжать без неё нельзя.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::fs::File;
use std::path::Path;

use super::{read_next_record, read_wal_file_header, wal_path, CtsRecord, Lsn, RM_COMMIT_TS_ID, WAL_HDR_SIZE};
use crate::cts::CommitTs;
use crate::error::fatal;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub records: usize,
    pub applied: usize,
    pub skipped_before_redo: usize,
    pub skipped_foreign: usize,
    pub last_lsn: Lsn,
}

/// Replay <root>/wal-000001.log into `cts`, starting after `redo_lsn`.
/// The store is flagged as in recovery for the duration.
pub fn replay_wal(root: &Path, cts: &CommitTs, redo_lsn: Lsn) -> Result<ReplayStats> {
    let path = wal_path(root);
    let mut stats = ReplayStats::default();
    if !path.exists() {
        debug!("replay: WAL file not found at {}, nothing to do", path.display());
        return Ok(stats);
    }

    let mut f = File::open(&path).with_context(|| format!("open wal {}", path.display()))?;
    if f.metadata()?.len() < WAL_HDR_SIZE as u64 {
        debug!("replay: WAL smaller than its header, nothing to do");
        return Ok(stats);
    }
    let base_lsn = read_wal_file_header(&mut f)
        .with_context(|| format!("read wal header {}", path.display()))?;
    let len = f.metadata()?.len();

    let was_in_recovery = cts.in_recovery();
    cts.set_in_recovery(true);
    debug!(
        "replay: {} base_lsn={} redo_lsn={} len={}",
        path.display(),
        base_lsn,
        redo_lsn,
        len
    );

    let mut pos = WAL_HDR_SIZE as u64;
    loop {
        let (rec, next) = match read_next_record(&mut f, pos, len) {
            Ok(Some(x)) => x,
            Ok(None) => break,
            Err(e) => {
                warn!("replay: stop at pos {}: {:#}", pos, e);
                break;
            }
        };
        pos = next;
        stats.records += 1;
        stats.last_lsn = rec.lsn;

        if rec.rmgr != RM_COMMIT_TS_ID {
            stats.skipped_foreign += 1;
            continue;
        }
        if rec.lsn <= redo_lsn {
            stats.skipped_before_redo += 1;
            continue;
        }

        let decoded = match CtsRecord::decode(rec.info, &rec.payload) {
            Ok(d) => d,
            Err(e) => fatal(&format!("commit_ts redo at lsn {}", rec.lsn), &e),
        };
        if let Err(e) = cts.redo(&decoded) {
            fatal(
                &format!("commit_ts redo {} at lsn {}", decoded.kind_name(), rec.lsn),
                &e,
            );
        }
        stats.applied += 1;
    }
    cts.set_in_recovery(was_in_recovery);

    if stats.applied > 0 {
        info!(
            "replay: applied {} of {} records (last lsn {})",
            stats.applied, stats.records, stats.last_lsn
        );
    }
    Ok(stats)
}
