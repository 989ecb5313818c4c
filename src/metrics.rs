//! Lightweight global metrics for QuiverCTS.
//!
//! Потокобезопасные атомарные счётчики для подсистем:
//! - SLRU buffer pool (hits/misses, page I/O, zeroed pages)
//! - Segment files (fsync, unlink)
//! - WAL (appends, bytes, flushes, truncation)
//! - Commit-timestamp API (sets, gets, last-commit cache, redo)

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

// ----- SLRU -----
static SLRU_HITS: AtomicU64 = AtomicU64::new(0);
static SLRU_MISSES: AtomicU64 = AtomicU64::new(0);
static SLRU_PAGE_READS: AtomicU64 = AtomicU64::new(0);
static SLRU_PAGE_WRITES: AtomicU64 = AtomicU64::new(0);
static SLRU_PAGES_ZEROED: AtomicU64 = AtomicU64::new(0);
static SLRU_EVICTIONS_DIRTY: AtomicU64 = AtomicU64::new(0);

// ----- Segments -----
static SEGMENT_FSYNCS: AtomicU64 = AtomicU64::new(0);
static SEGMENTS_UNLINKED: AtomicU64 = AtomicU64::new(0);

// ----- WAL -----
static WAL_APPENDS_TOTAL: AtomicU64 = AtomicU64::new(0);
static WAL_BYTES_WRITTEN: AtomicU64 = AtomicU64::new(0);
static WAL_FLUSH_CALLS: AtomicU64 = AtomicU64::new(0);
static WAL_TRUNCATIONS: AtomicU64 = AtomicU64::new(0);

// ----- Commit timestamps -----
static CTS_SETS: AtomicU64 = AtomicU64::new(0);
static CTS_GETS: AtomicU64 = AtomicU64::new(0);
static CTS_LAST_COMMIT_HITS: AtomicU64 = AtomicU64::new(0);
static CTS_TRUNCATIONS: AtomicU64 = AtomicU64::new(0);
static REDO_RECORDS_APPLIED: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    // SLRU
    pub slru_hits: u64,
    pub slru_misses: u64,
    pub slru_page_reads: u64,
    pub slru_page_writes: u64,
    pub slru_pages_zeroed: u64,
    pub slru_evictions_dirty: u64,

    // Segments
    pub segment_fsyncs: u64,
    pub segments_unlinked: u64,

    // WAL
    pub wal_appends_total: u64,
    pub wal_bytes_written: u64,
    pub wal_flush_calls: u64,
    pub wal_truncations: u64,

    // Commit timestamps
    pub cts_sets: u64,
    pub cts_gets: u64,
    pub cts_last_commit_hits: u64,
    pub cts_truncations: u64,
    pub redo_records_applied: u64,
}

impl MetricsSnapshot {
    pub fn slru_hit_ratio(&self) -> f64 {
        let total = self.slru_hits + self.slru_misses;
        if total == 0 {
            0.0
        } else {
            self.slru_hits as f64 / total as f64
        }
    }

    pub fn avg_wal_record_bytes(&self) -> f64 {
        if self.wal_appends_total == 0 {
            0.0
        } else {
            self.wal_bytes_written as f64 / self.wal_appends_total as f64
        }
    }
}

// ----- Recorders (SLRU) -----
pub fn record_slru_hit() {
    SLRU_HITS.fetch_add(1, Ordering::Relaxed);
}
pub fn record_slru_miss() {
    SLRU_MISSES.fetch_add(1, Ordering::Relaxed);
}

pub fn record_page_read() {
    SLRU_PAGE_READS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_page_write() {
    SLRU_PAGE_WRITES.fetch_add(1, Ordering::Relaxed);
}

pub fn record_page_zeroed() {
    SLRU_PAGES_ZEROED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_dirty_eviction() {
    SLRU_EVICTIONS_DIRTY.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Segments) -----
pub fn record_segment_fsync() {
    SEGMENT_FSYNCS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_segment_unlinked() {
    SEGMENTS_UNLINKED.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (WAL) -----
pub fn record_wal_append(record_len: usize) {
    WAL_APPENDS_TOTAL.fetch_add(1, Ordering::Relaxed);
    WAL_BYTES_WRITTEN.fetch_add(record_len as u64, Ordering::Relaxed);
}

pub fn record_wal_flush() {
    WAL_FLUSH_CALLS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_wal_truncation() {
    WAL_TRUNCATIONS.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Commit timestamps) -----
pub fn record_cts_set(nxids: usize) {
    CTS_SETS.fetch_add(nxids as u64, Ordering::Relaxed);
}

pub fn record_cts_get() {
    CTS_GETS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_last_commit_hit() {
    CTS_LAST_COMMIT_HITS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_cts_truncation() {
    CTS_TRUNCATIONS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_redo_applied() {
    REDO_RECORDS_APPLIED.fetch_add(1, Ordering::Relaxed);
}

// ----- Snapshot / Reset -----
pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        slru_hits: SLRU_HITS.load(Ordering::Relaxed),
        slru_misses: SLRU_MISSES.load(Ordering::Relaxed),
        slru_page_reads: SLRU_PAGE_READS.load(Ordering::Relaxed),
        slru_page_writes: SLRU_PAGE_WRITES.load(Ordering::Relaxed),
        slru_pages_zeroed: SLRU_PAGES_ZEROED.load(Ordering::Relaxed),
        slru_evictions_dirty: SLRU_EVICTIONS_DIRTY.load(Ordering::Relaxed),

        segment_fsyncs: SEGMENT_FSYNCS.load(Ordering::Relaxed),
        segments_unlinked: SEGMENTS_UNLINKED.load(Ordering::Relaxed),

        wal_appends_total: WAL_APPENDS_TOTAL.load(Ordering::Relaxed),
        wal_bytes_written: WAL_BYTES_WRITTEN.load(Ordering::Relaxed),
        wal_flush_calls: WAL_FLUSH_CALLS.load(Ordering::Relaxed),
        wal_truncations: WAL_TRUNCATIONS.load(Ordering::Relaxed),

        cts_sets: CTS_SETS.load(Ordering::Relaxed),
        cts_gets: CTS_GETS.load(Ordering::Relaxed),
        cts_last_commit_hits: CTS_LAST_COMMIT_HITS.load(Ordering::Relaxed),
        cts_truncations: CTS_TRUNCATIONS.load(Ordering::Relaxed),
        redo_records_applied: REDO_RECORDS_APPLIED.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    SLRU_HITS.store(0, Ordering::Relaxed);
    SLRU_MISSES.store(0, Ordering::Relaxed);
    SLRU_PAGE_READS.store(0, Ordering::Relaxed);
    SLRU_PAGE_WRITES.store(0, Ordering::Relaxed);
    SLRU_PAGES_ZEROED.store(0, Ordering::Relaxed);
    SLRU_EVICTIONS_DIRTY.store(0, Ordering::Relaxed);

    SEGMENT_FSYNCS.store(0, Ordering::Relaxed);
    SEGMENTS_UNLINKED.store(0, Ordering::Relaxed);

    WAL_APPENDS_TOTAL.store(0, Ordering::Relaxed);
    WAL_BYTES_WRITTEN.store(0, Ordering::Relaxed);
    WAL_FLUSH_CALLS.store(0, Ordering::Relaxed);
    WAL_TRUNCATIONS.store(0, Ordering::Relaxed);

    CTS_SETS.store(0, Ordering::Relaxed);
    CTS_GETS.store(0, Ordering::Relaxed);
    CTS_LAST_COMMIT_HITS.store(0, Ordering::Relaxed);
    CTS_TRUNCATIONS.store(0, Ordering::Relaxed);
    REDO_RECORDS_APPLIED.store(0, Ordering::Relaxed);
}
