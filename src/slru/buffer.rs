//! Fixed pool of page slots with approximate LRU.
//!
//! Design:
//! - Vec of slots, linear search by page number (pool is 4..=16 slots by default).
//! - Every access stamps the slot with a global access counter; the victim is
//!   the slot whose stamp is oldest. Stamps are atomics so a reader holding
//!   the pool lock in shared mode can still record its access.
//! - Victim preference: empty slot, then oldest clean slot, then oldest dirty
//!   slot (the caller writes it back first). The latest page is never chosen
//!   while any other slot is available.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::page::PageNo;
use crate::wal::{Lsn, INVALID_LSN};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotStatus {
    Empty,
    Valid,
    WriteInProgress,
}

pub(crate) struct BufferSlot {
    pub(crate) page_no: PageNo,
    pub(crate) status: SlotStatus,
    pub(crate) dirty: bool,
    lru_count: AtomicU32,
    /// Highest WAL LSN that touched this page; flushed before write-back.
    pub(crate) recent_lsn: Lsn,
    pub(crate) buf: Box<[u8]>,
}

impl BufferSlot {
    fn new(page_size: usize) -> Self {
        Self {
            page_no: 0,
            status: SlotStatus::Empty,
            dirty: false,
            lru_count: AtomicU32::new(0),
            recent_lsn: INVALID_LSN,
            buf: vec![0u8; page_size].into_boxed_slice(),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.status = SlotStatus::Empty;
        self.dirty = false;
        self.recent_lsn = INVALID_LSN;
    }
}

/// What select_victim found for a page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Victim {
    /// The page is already resident here.
    Resident(usize),
    /// Free or clean slot, usable as-is.
    Clean(usize),
    /// Must be written back before reuse.
    Dirty(usize),
}

pub(crate) struct SlruShared {
    pub(crate) slots: Vec<BufferSlot>,
    cur_lru_count: AtomicU32,
    /// Page most recently zeroed (the log's current head).
    pub(crate) latest_page_no: PageNo,
}

impl SlruShared {
    pub(crate) fn new(nslots: usize, page_size: usize) -> Self {
        Self {
            slots: (0..nslots).map(|_| BufferSlot::new(page_size)).collect(),
            cur_lru_count: AtomicU32::new(1),
            latest_page_no: 0,
        }
    }

    pub(crate) fn find(&self, page: PageNo) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.status != SlotStatus::Empty && s.page_no == page)
    }

    /// Stamp `slot` as most recently used. Callable under a shared lock.
    #[inline]
    pub(crate) fn touch(&self, slot: usize) {
        let s = &self.slots[slot];
        let cur = self.cur_lru_count.load(Ordering::Relaxed);
        if s.lru_count.load(Ordering::Relaxed) != cur {
            let next = self.cur_lru_count.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            s.lru_count.store(next, Ordering::Relaxed);
        }
    }

    #[inline]
    fn age(&self, slot: usize) -> u32 {
        self.cur_lru_count
            .load(Ordering::Relaxed)
            .wrapping_sub(self.slots[slot].lru_count.load(Ordering::Relaxed))
    }

    pub(crate) fn select_victim(&self, page: PageNo) -> Victim {
        if let Some(i) = self.find(page) {
            return Victim::Resident(i);
        }
        if let Some(i) = self
            .slots
            .iter()
            .position(|s| s.status == SlotStatus::Empty)
        {
            return Victim::Clean(i);
        }

        let mut best_clean: Option<(usize, u32)> = None;
        let mut best_any: Option<(usize, u32)> = None;
        for (i, s) in self.slots.iter().enumerate() {
            if s.page_no == self.latest_page_no {
                continue;
            }
            let age = self.age(i);
            if best_any.map_or(true, |(_, a)| age > a) {
                best_any = Some((i, age));
            }
            if !s.dirty && best_clean.map_or(true, |(_, a)| age > a) {
                best_clean = Some((i, age));
            }
        }

        if let Some((i, _)) = best_clean {
            return Victim::Clean(i);
        }
        match best_any {
            Some((i, _)) => Victim::Dirty(i),
            // single-slot pool holding the latest page
            None => {
                if self.slots[0].dirty {
                    Victim::Dirty(0)
                } else {
                    Victim::Clean(0)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(sh: &mut SlruShared, pages: &[PageNo]) {
        for (i, &p) in pages.iter().enumerate() {
            sh.slots[i].page_no = p;
            sh.slots[i].status = SlotStatus::Valid;
            sh.touch(i);
        }
    }

    #[test]
    fn prefers_empty_then_oldest_clean() {
        let mut sh = SlruShared::new(4, 64);
        assert_eq!(sh.select_victim(9), Victim::Clean(0));

        fill(&mut sh, &[10, 11, 12, 13]);
        assert_eq!(sh.select_victim(12), Victim::Resident(2));
        // slot 0 is the oldest
        assert_eq!(sh.select_victim(99), Victim::Clean(0));
        sh.touch(0);
        assert_eq!(sh.select_victim(99), Victim::Clean(1));
    }

    #[test]
    fn skips_latest_and_dirty_when_possible() {
        let mut sh = SlruShared::new(4, 64);
        fill(&mut sh, &[10, 11, 12, 13]);
        sh.latest_page_no = 10;
        sh.slots[1].dirty = true;
        assert_eq!(sh.select_victim(99), Victim::Clean(2));

        for i in 1..4 {
            sh.slots[i].dirty = true;
        }
        assert_eq!(sh.select_victim(99), Victim::Dirty(1));
    }
}
