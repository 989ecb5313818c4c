//! Lifecycle: construction, activation, page extension, checkpoint,
//! truncation and the valid-range bookkeeping.

use anyhow::{Context, Result};
use log::{debug, info};
use parking_lot::RwLock;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::{CommitTs, CtsShared};
use crate::config::CtsConfig;
use crate::consts::{CONTROL_VERSION, CTS_DIR};
use crate::control::{write_control, ControlData};
use crate::error::OrFatal;
use crate::metrics::record_cts_truncation;
use crate::page::PageLayout;
use crate::slru::{SegmentStore, Slru};
use crate::wal::{CtsRecord, Lsn, WalSink};
use crate::xid::{
    xid_is_valid, xid_precedes, TransactionId, XidAllocator, FIRST_NORMAL_XID, INVALID_XID,
};

/// What a checkpoint did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CheckpointStats {
    pub redo_lsn: Lsn,
    pub pages_written: usize,
    pub segments_synced: usize,
}

impl CommitTs {
    /// Size the buffer pool and set up shared state. Tracking starts off.
    pub fn shmem_init(
        root: &Path,
        cfg: CtsConfig,
        wal: Arc<dyn WalSink>,
        xids: Arc<XidAllocator>,
    ) -> Result<Self> {
        cfg.validate()?;
        let layout = PageLayout::new(cfg.page_size)?;
        let store = SegmentStore::open(&root.join(CTS_DIR), layout, cfg.fsync_mode)?;
        let slru = Slru::new("CommitTs", store, cfg.pool_size(), wal.clone());
        let next = xids.read_next_full_xid();
        Ok(Self {
            root: root.to_path_buf(),
            cfg,
            layout,
            slru,
            shared: RwLock::new(CtsShared::RESET),
            enabled: AtomicBool::new(false),
            in_recovery: AtomicBool::new(false),
            ckpt_gate: RwLock::new(()),
            wal,
            xids,
            xid_ref: AtomicU64::new(next.0),
            persist_control: false,
            _dir_lock: None,
        })
    }

    pub(crate) fn attach_dir(&mut self, lock: crate::lock::LockGuard) {
        self._dir_lock = Some(lock);
        self.persist_control = true;
    }

    /// Fresh cluster: nothing is created eagerly; the directory just has to exist.
    pub fn bootstrap(&self) -> Result<()> {
        let dir = self.slru.store().dir();
        fs::create_dir_all(dir).with_context(|| format!("create dir {}", dir.display()))?;
        debug!("commit_ts bootstrap at {}", dir.display());
        Ok(())
    }

    /// Startup after a checkpoint taken with tracking on.
    pub fn startup(&self) {
        self.activate();
    }

    /// End of recovery: settle on the configured state.
    pub fn complete_init(&self) {
        if self.cfg.tracking_enabled {
            self.activate();
        } else {
            self.deactivate();
        }
    }

    /// The primary flipped the setting (seen in its WAL).
    pub fn parameter_change(&self, new_on: bool, old_on: bool) {
        debug!("commit_ts parameter change: {} -> {}", old_on, new_on);
        if new_on {
            self.activate();
        } else if self.is_enabled() {
            self.deactivate();
        }
    }

    pub fn activate(&self) {
        self.try_activate().or_fatal("commit_ts activate")
    }

    fn try_activate(&self) -> Result<()> {
        {
            let _g = self.shared.read();
            if self.is_enabled() {
                return Ok(());
            }
        }

        let next_xid = self.xids.read_next_full_xid().xid();
        let pageno = self.layout.page_of(next_xid);

        self.slru.lock().set_latest_page(pageno);

        {
            let mut st = self.shared.write();
            if st.oldest_cts_xid == INVALID_XID {
                st.oldest_cts_xid = next_xid;
                st.newest_cts_xid = next_xid;
            }
        }

        // Create the current segment so that lookups of the head page hit a file.
        {
            let mut g = self.slru.lock();
            if !g.does_physical_page_exist(pageno)? {
                let slot = g.zero_page(pageno)?;
                g.mark_dirty(slot, None);
                g.write_page(slot)?;
                self.slru
                    .store()
                    .fsync_segment(self.layout.segment_of(pageno))?;
            }
        }

        {
            let _g = self.shared.write();
            self.enabled.store(true, Ordering::Release);
        }
        info!(
            "commit timestamps enabled at xid {} (page {})",
            next_xid, pageno
        );
        Ok(())
    }

    /// Turn tracking off and drop all data. Cached pages are discarded so a
    /// later activation does not see stale buffers.
    pub fn deactivate(&self) {
        {
            let mut st = self.shared.write();
            self.enabled.store(false, Ordering::Release);
            *st = CtsShared::RESET;
        }

        let mut g = self.slru.lock();
        g.invalidate_all();
        let n = self
            .slru
            .store()
            .unlink_all()
            .or_fatal("commit_ts deactivate");
        if n > 0 {
            info!("commit timestamps disabled, removed {} segment(s)", n);
        }
    }

    /// Called for every new xid under XidGenLock: the first xid of a page
    /// (and FirstNormal) zeroes that page.
    pub fn extend(&self, xid: TransactionId) {
        if !self.is_enabled() {
            return;
        }
        if self.layout.entry_of(xid) != 0 && xid != FIRST_NORMAL_XID {
            return;
        }
        self.try_extend(xid).or_fatal("commit_ts extend")
    }

    fn try_extend(&self, xid: TransactionId) -> Result<()> {
        let pageno = self.layout.page_of(xid);
        let _gate = self.ckpt_gate.read();
        let mut g = self.slru.lock();
        let slot = g.zero_page(pageno)?;
        let lsn = if self.in_recovery() {
            None
        } else {
            Some(self.wal.append(&CtsRecord::ZeroPage { page_no: pageno })?)
        };
        g.mark_dirty(slot, lsn);
        debug!("commit_ts page {} zeroed for xid {}", pageno, xid);
        Ok(())
    }

    /// Write back every dirty page and drain the segment fsync queue.
    /// Standalone stores also persist the control file here.
    pub fn checkpoint(&self) -> CheckpointStats {
        self.try_checkpoint().or_fatal("commit_ts checkpoint")
    }

    fn try_checkpoint(&self) -> Result<CheckpointStats> {
        let redo_lsn = {
            let _gate = self.ckpt_gate.write();
            self.wal.insert_lsn()
        };
        self.wal.flush(redo_lsn)?;

        let pages_written = self.slru.lock().write_all()?;
        let segments_synced = self.slru.store().sync_pending()?;

        if self.persist_control {
            write_control(&self.root, &self.control_snapshot(redo_lsn))?;
            self.wal.checkpoint_done(redo_lsn)?;
        }
        debug!(
            "commit_ts checkpoint: redo_lsn={} pages={} segments={}",
            redo_lsn, pages_written, segments_synced
        );
        Ok(CheckpointStats {
            redo_lsn,
            pages_written,
            segments_synced,
        })
    }

    /// Clean shutdown: a final checkpoint.
    pub fn shutdown(&self) {
        let st = self.checkpoint();
        info!("commit_ts shutdown, redo_lsn={}", st.redo_lsn);
    }

    pub fn control_snapshot(&self, redo_lsn: Lsn) -> ControlData {
        let gen = self.xids.snapshot();
        let st = self.shared_state();
        ControlData {
            version: CONTROL_VERSION,
            page_size: self.layout.page_size() as u32,
            next_fxid: gen.next_fxid,
            oldest_xid: gen.oldest_xid,
            oldest_cts_xid: st.oldest_cts_xid,
            newest_cts_xid: st.newest_cts_xid,
            redo_lsn,
            tracking_active: self.is_enabled(),
        }
    }

    /// Remove segments wholly before the segment holding `oldest_xact`.
    /// The caller advances the valid range separately.
    pub fn truncate(&self, oldest_xact: TransactionId) {
        self.try_truncate(oldest_xact).or_fatal("commit_ts truncate")
    }

    fn try_truncate(&self, oldest_xact: TransactionId) -> Result<()> {
        let cutoff = self.layout.page_of(oldest_xact);
        if !self
            .slru
            .store()
            .any_removable(self.layout.segment_align(cutoff))?
        {
            return Ok(());
        }

        {
            let _gate = self.ckpt_gate.read();
            let lsn = self.wal.append(&CtsRecord::Truncate {
                page_no: cutoff,
                oldest_xid: oldest_xact,
            })?;
            // unlinking is irreversible: the record goes first
            self.wal.flush(lsn)?;
        }

        let n = self.slru.lock().truncate(cutoff)?;
        record_cts_truncation();
        info!(
            "commit_ts truncated before xid {} (page {}), {} segment(s) removed",
            oldest_xact, cutoff, n
        );
        Ok(())
    }

    /// Install a valid range. An existing range only moves forward at the
    /// bottom and backward at the top.
    pub fn set_limit(&self, oldest: TransactionId, newest: TransactionId) {
        let mut st = self.shared.write();
        if st.oldest_cts_xid != INVALID_XID {
            if xid_precedes(st.oldest_cts_xid, oldest) {
                st.oldest_cts_xid = oldest;
            }
            if newest != INVALID_XID && xid_precedes(newest, st.newest_cts_xid) {
                st.newest_cts_xid = newest;
            }
        } else {
            debug_assert_eq!(st.newest_cts_xid, INVALID_XID);
            st.oldest_cts_xid = oldest;
            st.newest_cts_xid = newest;
        }
    }

    /// Move the bottom of a valid range up; no-op without a range.
    pub fn advance_oldest(&self, oldest: TransactionId) {
        let mut st = self.shared.write();
        if xid_is_valid(st.oldest_cts_xid) && xid_precedes(st.oldest_cts_xid, oldest) {
            st.oldest_cts_xid = oldest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::MemWal;
    use crate::xid::FullTransactionId;
    use std::path::PathBuf;

    fn unique_root(prefix: &str) -> PathBuf {
        let pid = std::process::id();
        let t = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("qcts-{}-{}-{}", prefix, pid, t))
    }

    /// Store whose allocator starts at xid 1000; activation pins the range there.
    fn open_at_1000(prefix: &str, tracking: bool) -> Result<CommitTs> {
        let root = unique_root(prefix);
        let wal = Arc::new(MemWal::new());
        let xids = Arc::new(XidAllocator::new(
            FullTransactionId::from_epoch_and_xid(0, 1000),
            FIRST_NORMAL_XID,
        ));
        let cfg = CtsConfig::default().with_tracking(tracking);
        let cts = CommitTs::shmem_init(&root, cfg, wal, xids)?;
        cts.bootstrap()?;
        cts.complete_init();
        Ok(cts)
    }

    #[test]
    fn set_limit_never_widens_existing_range() -> Result<()> {
        let cts = open_at_1000("limit-widen", true)?;
        let st = cts.shared_state();
        assert_eq!((st.oldest_cts_xid, st.newest_cts_xid), (1000, 1000));

        cts.set_limit(500, 2000);
        let st = cts.shared_state();
        assert_eq!((st.oldest_cts_xid, st.newest_cts_xid), (1000, 1000));
        Ok(())
    }

    #[test]
    fn advance_oldest_ignores_older_xid() -> Result<()> {
        let cts = open_at_1000("advance-back", true)?;
        cts.advance_oldest(900);
        let st = cts.shared_state();
        assert_eq!(st.oldest_cts_xid, 1000);
        assert_eq!(st.newest_cts_xid, 1000);

        cts.advance_oldest(1000);
        assert_eq!(cts.shared_state().oldest_cts_xid, 1000);
        Ok(())
    }

    #[test]
    fn advance_oldest_without_range_is_noop() -> Result<()> {
        let cts = open_at_1000("advance-disabled", false)?;
        assert!(!cts.is_enabled());
        cts.advance_oldest(900);
        let st = cts.shared_state();
        assert_eq!(st.oldest_cts_xid, INVALID_XID);
        assert_eq!(st.newest_cts_xid, INVALID_XID);
        Ok(())
    }
}
