//! Commit-timestamp store.
//!
//! For every committed transaction id we keep (commit time, origin) in a
//! dense array of 10-byte entries paged through an SLRU. The module can be
//! switched on and off at runtime; while off it holds no data.
//!
//! Раскладка:
//! - mod.rs       — CommitTs, общее состояние (CommitTsLock), статус.
//! - lifecycle.rs — shmem_init/bootstrap/startup/activate/deactivate/extend/
//!                  checkpoint/truncate/лимиты.
//! - set_get.rs   — запись дерева транзакции и чтение меток.
//! - redo.rs      — применение WAL-записей.
//! - boot.rs      — подъём каталога: control file, replay, end-of-recovery checkpoint.
//!
//! Locks, outermost first: XidGenLock (allocator), the checkpoint gate,
//! SlruLock, CommitTsLock. CommitTsLock is never held while taking SlruLock.

pub mod boot;
pub mod lifecycle;
pub mod redo;
pub mod set_get;

use parking_lot::RwLock;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::CtsConfig;
use crate::lock::LockGuard;
use crate::page::{CommitTsEntry, PageLayout, PageNo};
use crate::slru::Slru;
use crate::wal::WalSink;
use crate::xid::{FullTransactionId, TransactionId, XidAllocator, XidReference};

pub use boot::boot;

/// State under CommitTsLock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CtsShared {
    /// Cache of the most recent commit recorded by this process.
    pub last_xid: TransactionId,
    pub last_entry: CommitTsEntry,
    /// Valid range of xids with data; both Invalid or both valid.
    pub oldest_cts_xid: TransactionId,
    pub newest_cts_xid: TransactionId,
}

impl CtsShared {
    const RESET: CtsShared = CtsShared {
        last_xid: crate::xid::INVALID_XID,
        last_entry: CommitTsEntry::EMPTY,
        oldest_cts_xid: crate::xid::INVALID_XID,
        newest_cts_xid: crate::xid::INVALID_XID,
    };
}

pub struct CommitTs {
    root: PathBuf,
    cfg: CtsConfig,
    layout: PageLayout,
    slru: Slru,
    shared: RwLock<CtsShared>,
    /// Written only while CommitTsLock is held exclusively; fast paths read it bare.
    enabled: AtomicBool,
    in_recovery: AtomicBool,
    /// WAL append + page update vs. checkpoint redo point (cf. delayChkpt).
    ckpt_gate: RwLock<()>,
    wal: Arc<dyn WalSink>,
    xids: Arc<XidAllocator>,
    /// next_fxid snapshot used to widen xids; see update_cached_xid_range.
    xid_ref: AtomicU64,
    persist_control: bool,
    _dir_lock: Option<LockGuard>,
}

/// Point-in-time view for `status` style reporting.
#[derive(Clone, Debug, Serialize)]
pub struct CtsStatus {
    pub enabled: bool,
    pub in_recovery: bool,
    pub page_size: usize,
    pub entries_per_page: u32,
    pub buffers: usize,
    pub latest_page: PageNo,
    pub next_fxid: FullTransactionId,
    pub oldest_xid: TransactionId,
    #[serde(flatten)]
    pub shared: CtsShared,
}

impl CommitTs {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &CtsConfig {
        &self.cfg
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn slru(&self) -> &Slru {
        &self.slru
    }

    pub fn xids(&self) -> &Arc<XidAllocator> {
        &self.xids
    }

    pub fn wal(&self) -> &Arc<dyn WalSink> {
        &self.wal
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    #[inline]
    pub fn in_recovery(&self) -> bool {
        self.in_recovery.load(Ordering::Acquire)
    }

    pub fn set_in_recovery(&self, on: bool) {
        self.in_recovery.store(on, Ordering::Release);
    }

    /// Copy of the CommitTsLock-protected state.
    pub fn shared_state(&self) -> CtsShared {
        *self.shared.read()
    }

    /// Allocate the next xid, making sure its page exists first.
    pub fn assign_xid(&self) -> TransactionId {
        self.xids.allocate_with(|xid| self.extend(xid))
    }

    /// Refresh the (next_xid, next_fxid) reference from the allocator.
    pub fn update_cached_xid_range(&self) {
        let next = self.xids.read_next_full_xid();
        self.xid_ref.store(next.0, Ordering::Release);
    }

    pub fn full_xid_from_xid(&self, xid: TransactionId) -> FullTransactionId {
        XidReference::new(FullTransactionId(self.xid_ref.load(Ordering::Acquire)))
            .full_xid_from_xid(xid)
    }

    pub fn status(&self) -> CtsStatus {
        let gen = self.xids.snapshot();
        CtsStatus {
            enabled: self.is_enabled(),
            in_recovery: self.in_recovery(),
            page_size: self.layout.page_size(),
            entries_per_page: self.layout.entries_per_page(),
            buffers: self.slru.num_slots(),
            latest_page: self.slru.latest_page(),
            next_fxid: gen.next_fxid,
            oldest_xid: gen.oldest_xid,
            shared: self.shared_state(),
        }
    }
}
