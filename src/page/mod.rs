//! Page geometry for the commit-timestamp log.
//!
//! xid -> (page, entry) is a plain division by entries-per-page; pages are
//! grouped 32 to a segment file. Page order is circular: it is derived from
//! the wrap-around order of the first normal xid mapped to each page, so
//! page 0 follows the highest page.

pub mod entry;

use anyhow::{anyhow, Result};

use crate::consts::{
    ENTRY_SIZE, MAX_PAGE_SIZE, MIN_PAGE_SIZE, MIN_SEGMENT_NAME_WIDTH, PAGES_PER_SEGMENT,
};
use crate::xid::{xid_precedes, TransactionId, FIRST_NORMAL_XID, MAX_XID};

pub use entry::{entry_read, entry_write, CommitTsEntry, RepOriginId, TimestampTz, INVALID_ORIGIN};

pub type PageNo = u32;
pub type SegmentNo = u32;

/// Validate page size (power of two in [1 KiB .. 64 KiB]).
pub fn validate_page_size(ps: usize) -> Result<()> {
    if !ps.is_power_of_two() || !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&ps) {
        return Err(anyhow!(
            "page_size must be a power of two in [{}..={}], got {}",
            MIN_PAGE_SIZE,
            MAX_PAGE_SIZE,
            ps
        ));
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageLayout {
    page_size: usize,
    entries_per_page: u32,
    pages_per_segment: u32,
}

impl PageLayout {
    pub fn new(page_size: usize) -> Result<Self> {
        validate_page_size(page_size)?;
        Ok(Self {
            page_size,
            entries_per_page: (page_size / ENTRY_SIZE) as u32,
            pages_per_segment: PAGES_PER_SEGMENT,
        })
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[inline]
    pub fn entries_per_page(&self) -> u32 {
        self.entries_per_page
    }

    #[inline]
    pub fn pages_per_segment(&self) -> u32 {
        self.pages_per_segment
    }

    #[inline]
    pub fn page_of(&self, xid: TransactionId) -> PageNo {
        xid / self.entries_per_page
    }

    #[inline]
    pub fn entry_of(&self, xid: TransactionId) -> u32 {
        xid % self.entries_per_page
    }

    /// Byte offset of entry `entryno` inside its page.
    #[inline]
    pub fn entry_offset(&self, entryno: u32) -> usize {
        entryno as usize * ENTRY_SIZE
    }

    /// Highest page number reachable by any xid.
    #[inline]
    pub fn max_page(&self) -> PageNo {
        MAX_XID / self.entries_per_page
    }

    #[inline]
    pub fn segment_of(&self, page: PageNo) -> SegmentNo {
        page / self.pages_per_segment
    }

    #[inline]
    pub fn segment_first_page(&self, seg: SegmentNo) -> PageNo {
        seg * self.pages_per_segment
    }

    /// Last page of a segment; the final segment is short.
    #[inline]
    pub fn segment_last_page(&self, seg: SegmentNo) -> PageNo {
        (seg * self.pages_per_segment + self.pages_per_segment - 1).min(self.max_page())
    }

    #[inline]
    pub fn max_segment(&self) -> SegmentNo {
        self.segment_of(self.max_page())
    }

    /// Byte offset of `page` inside its segment file.
    #[inline]
    pub fn offset_in_segment(&self, page: PageNo) -> u64 {
        (page % self.pages_per_segment) as u64 * self.page_size as u64
    }

    /// Round a page down to the first page of its segment.
    #[inline]
    pub fn segment_align(&self, page: PageNo) -> PageNo {
        page - page % self.pages_per_segment
    }

    /// Hex digits needed to name the highest segment (at least 4).
    pub fn segment_name_width(&self) -> usize {
        let max = self.max_segment();
        let digits = (32 - max.leading_zeros() as usize).div_ceil(4);
        digits.max(MIN_SEGMENT_NAME_WIDTH)
    }

    /// p1 < p2 in circular page order.
    pub fn page_precedes(&self, p1: PageNo, p2: PageNo) -> bool {
        let x1 = p1
            .wrapping_mul(self.entries_per_page)
            .wrapping_add(FIRST_NORMAL_XID);
        let x2 = p2
            .wrapping_mul(self.entries_per_page)
            .wrapping_add(FIRST_NORMAL_XID);
        xid_precedes(x1, x2)
    }

    /// A segment may be unlinked when both its first and last page precede the cutoff.
    pub fn segment_precedes(&self, seg: SegmentNo, cutoff: PageNo) -> bool {
        self.page_precedes(self.segment_first_page(seg), cutoff)
            && self.page_precedes(self.segment_last_page(seg), cutoff)
    }
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            page_size: crate::consts::DEFAULT_PAGE_SIZE,
            entries_per_page: (crate::consts::DEFAULT_PAGE_SIZE / ENTRY_SIZE) as u32,
            pages_per_segment: PAGES_PER_SEGMENT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_geometry() {
        let l = PageLayout::default();
        assert_eq!(l.entries_per_page(), 819);
        assert_eq!(l.page_of(100_000), 122);
        assert_eq!(l.page_of(50_000), 61);
        assert_eq!(l.entry_of(819), 0);
        assert_eq!(l.entry_offset(818), 8180);
        assert_eq!(l.max_page(), 5_244_160);
        assert_eq!(l.max_segment(), 0x28028);
        assert_eq!(l.segment_name_width(), 5);
        assert_eq!(l.segment_last_page(l.max_segment()), l.max_page());
        assert_eq!(l.segment_last_page(0), 31);
        assert_eq!(l.offset_in_segment(33), 8192);
    }

    #[test]
    fn small_pages_need_wider_names() {
        let l = PageLayout::new(1024).unwrap();
        assert_eq!(l.entries_per_page(), 102);
        assert_eq!(l.segment_name_width(), 6);
        assert!(PageLayout::new(1000).is_err());
        assert!(PageLayout::new(128 * 1024).is_err());
    }

    #[test]
    fn page_order_is_circular() {
        let l = PageLayout::default();
        assert!(l.page_precedes(10, 11));
        assert!(!l.page_precedes(11, 10));
        assert!(!l.page_precedes(7, 7));
        // page 0 follows the highest page
        assert!(l.page_precedes(l.max_page(), 0));
        assert!(l.page_precedes(l.page_of(0xFFFF_FFFE), l.page_of(3)));
    }

    #[test]
    fn segment_precedes_needs_both_ends() {
        let l = PageLayout::default();
        assert!(l.segment_precedes(0, 32));
        assert!(l.segment_precedes(0, 64));
        assert!(!l.segment_precedes(1, 32));
        assert!(!l.segment_precedes(2, 32));
    }
}
