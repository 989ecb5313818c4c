//! slru/core — Slru и SlruGuard.
//!
//! One RwLock guards slot metadata and buffers alike. Exclusive holders get
//! a [`SlruGuard`] and may zero, read, dirty and write pages. Readers of a
//! resident page go through [`Slru::with_page_shared`], which only takes the
//! lock in shared mode and falls back to the exclusive path on a miss.
//!
//! I/O happens with the lock held. The pool is small and page I/O is rare
//! next to lookups, so nothing here tries to drop the lock around reads.

use anyhow::{Context, Result};
use log::{debug, warn};
use parking_lot::{RwLock, RwLockWriteGuard};
use std::sync::Arc;

use super::buffer::{SlotStatus, SlruShared, Victim};
use super::segment::SegmentStore;
use crate::metrics::{
    record_dirty_eviction, record_page_read, record_page_write, record_page_zeroed,
    record_slru_hit, record_slru_miss,
};
use crate::page::{PageLayout, PageNo};
use crate::wal::{Lsn, WalSink};
use crate::xid::TransactionId;

pub struct Slru {
    name: &'static str,
    layout: PageLayout,
    store: SegmentStore,
    shared: RwLock<SlruShared>,
    wal: Arc<dyn WalSink>,
}

pub struct SlruGuard<'a> {
    slru: &'a Slru,
    shared: RwLockWriteGuard<'a, SlruShared>,
}

impl Slru {
    pub fn new(
        name: &'static str,
        store: SegmentStore,
        nslots: usize,
        wal: Arc<dyn WalSink>,
    ) -> Self {
        let layout = *store.layout();
        debug!(
            "{}: {} slots of {} bytes in {}",
            name,
            nslots,
            layout.page_size(),
            store.dir().display()
        );
        Self {
            name,
            layout,
            store,
            shared: RwLock::new(SlruShared::new(nslots, layout.page_size())),
            wal,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn store(&self) -> &SegmentStore {
        &self.store
    }

    pub fn num_slots(&self) -> usize {
        self.shared.read().slots.len()
    }

    /// Take SlruLock exclusively.
    pub fn lock(&self) -> SlruGuard<'_> {
        SlruGuard {
            slru: self,
            shared: self.shared.write(),
        }
    }

    pub fn latest_page(&self) -> PageNo {
        self.shared.read().latest_page_no
    }

    /// Run `f` over the contents of `page`. Resident pages are read under the
    /// shared lock; otherwise the page is loaded under the exclusive lock.
    pub fn with_page_shared<R, F>(&self, page: PageNo, xid: TransactionId, f: F) -> Result<R>
    where
        F: FnOnce(&[u8]) -> R,
    {
        {
            let sh = self.shared.read();
            if let Some(i) = sh.find(page) {
                sh.touch(i);
                record_slru_hit();
                return Ok(f(&sh.slots[i].buf));
            }
        }
        let mut g = self.lock();
        let slot = g.read_page(page, xid)?;
        Ok(f(g.page(slot)))
    }
}

impl SlruGuard<'_> {
    pub fn latest_page(&self) -> PageNo {
        self.shared.latest_page_no
    }

    pub fn set_latest_page(&mut self, page: PageNo) {
        self.shared.latest_page_no = page;
    }

    pub fn page(&self, slot: usize) -> &[u8] {
        &self.shared.slots[slot].buf
    }

    pub fn page_mut(&mut self, slot: usize) -> &mut [u8] {
        &mut self.shared.slots[slot].buf
    }

    pub fn slot_page(&self, slot: usize) -> Option<PageNo> {
        let s = &self.shared.slots[slot];
        (s.status != SlotStatus::Empty).then_some(s.page_no)
    }

    pub fn is_dirty(&self, slot: usize) -> bool {
        self.shared.slots[slot].dirty
    }

    /// Mark a slot modified; `lsn` (if any) must be flushed before write-back.
    pub fn mark_dirty(&mut self, slot: usize, lsn: Option<Lsn>) {
        let s = &mut self.shared.slots[slot];
        s.dirty = true;
        if let Some(lsn) = lsn {
            if lsn > s.recent_lsn {
                s.recent_lsn = lsn;
            }
        }
    }

    /// Get a slot for `page`, writing back a dirty victim if that is all we have.
    fn claim_slot(&mut self, page: PageNo) -> Result<(usize, bool)> {
        match self.shared.select_victim(page) {
            Victim::Resident(i) => Ok((i, true)),
            Victim::Clean(i) => Ok((i, false)),
            Victim::Dirty(i) => {
                debug!(
                    "{}: evicting dirty page {} for page {}",
                    self.slru.name, self.shared.slots[i].page_no, page
                );
                self.write_page(i)?;
                record_dirty_eviction();
                Ok((i, false))
            }
        }
    }

    /// Assign a slot to `page` filled with zeroes. The slot is left clean;
    /// callers that want the page on disk mark it dirty.
    pub fn zero_page(&mut self, page: PageNo) -> Result<usize> {
        let (slot, _) = self.claim_slot(page)?;
        let s = &mut self.shared.slots[slot];
        s.page_no = page;
        s.status = SlotStatus::Valid;
        s.dirty = false;
        s.recent_lsn = 0;
        s.buf.fill(0);
        self.shared.touch(slot);
        self.shared.latest_page_no = page;
        record_page_zeroed();
        Ok(slot)
    }

    /// Make `page` resident and return its slot.
    pub fn read_page(&mut self, page: PageNo, xid: TransactionId) -> Result<usize> {
        let (slot, resident) = self.claim_slot(page)?;
        if resident {
            self.shared.touch(slot);
            record_slru_hit();
            return Ok(slot);
        }
        record_slru_miss();

        let store = &self.slru.store;
        let s = &mut self.shared.slots[slot];
        s.reset();
        store.read_page(page, &mut s.buf).with_context(|| {
            format!(
                "{}: could not access status of transaction {} (page {})",
                self.slru.name, xid, page
            )
        })?;
        s.page_no = page;
        s.status = SlotStatus::Valid;
        self.shared.touch(slot);
        record_page_read();
        Ok(slot)
    }

    /// Write a dirty slot back, flushing WAL up to its LSN first.
    pub fn write_page(&mut self, slot: usize) -> Result<()> {
        let (page, lsn) = {
            let s = &self.shared.slots[slot];
            if s.status != SlotStatus::Valid || !s.dirty {
                return Ok(());
            }
            (s.page_no, s.recent_lsn)
        };
        if lsn > 0 {
            self.slru.wal.flush(lsn)?;
        }

        let store = &self.slru.store;
        let s = &mut self.shared.slots[slot];
        s.status = SlotStatus::WriteInProgress;
        s.dirty = false;
        let res = store.write_page(page, &s.buf);
        s.status = SlotStatus::Valid;
        if let Err(e) = res {
            s.dirty = true;
            return Err(e.context(format!("{}: write-back of page {}", self.slru.name, page)));
        }
        record_page_write();
        Ok(())
    }

    /// Write every dirty slot. Returns how many went to disk.
    pub fn write_all(&mut self) -> Result<usize> {
        let mut n = 0usize;
        for slot in 0..self.shared.slots.len() {
            if self.shared.slots[slot].dirty {
                self.write_page(slot)?;
                n += 1;
            }
        }
        Ok(n)
    }

    pub fn does_physical_page_exist(&self, page: PageNo) -> Result<bool> {
        self.slru.store.physical_page_exists(page)
    }

    /// Drop every buffered page without writing it.
    pub fn invalidate_all(&mut self) {
        for s in self.shared.slots.iter_mut() {
            s.reset();
        }
    }

    /// Remove every segment wholly before `cutoff_page`, which is first
    /// rounded down to its segment start.
    pub fn truncate(&mut self, cutoff_page: PageNo) -> Result<usize> {
        let layout = self.slru.layout;
        let cutoff = layout.segment_align(cutoff_page);

        // The log's head must not fall into the range being removed.
        if layout.page_precedes(self.shared.latest_page_no, cutoff) {
            warn!(
                "could not truncate directory \"{}\": apparent wraparound",
                self.slru.store.dir().display()
            );
            return Ok(0);
        }

        for s in self.shared.slots.iter_mut() {
            if s.status != SlotStatus::Empty && layout.page_precedes(s.page_no, cutoff) {
                s.reset();
            }
        }
        self.slru.store.unlink_segments(cutoff)
    }
}
