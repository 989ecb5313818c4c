//! On-page entry codec: [timestamp i64][origin u16], native byte order.

use byteorder::{ByteOrder, NativeEndian};
use serde::Serialize;

use crate::consts::ENTRY_SIZE;

pub type TimestampTz = i64;
pub type RepOriginId = u16;

pub const INVALID_ORIGIN: RepOriginId = 0;

/// What is recorded for one committed transaction. A zero timestamp
/// means "never recorded".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CommitTsEntry {
    pub timestamp: TimestampTz,
    pub origin: RepOriginId,
}

impl CommitTsEntry {
    pub const EMPTY: CommitTsEntry = CommitTsEntry {
        timestamp: 0,
        origin: INVALID_ORIGIN,
    };

    pub fn new(timestamp: TimestampTz, origin: RepOriginId) -> Self {
        Self { timestamp, origin }
    }

    #[inline]
    pub fn is_recorded(&self) -> bool {
        self.timestamp != 0
    }
}

#[inline]
pub fn entry_write(page: &mut [u8], entryno: u32, e: &CommitTsEntry) {
    let off = entryno as usize * ENTRY_SIZE;
    NativeEndian::write_i64(&mut page[off..off + 8], e.timestamp);
    NativeEndian::write_u16(&mut page[off + 8..off + ENTRY_SIZE], e.origin);
}

#[inline]
pub fn entry_read(page: &[u8], entryno: u32) -> CommitTsEntry {
    let off = entryno as usize * ENTRY_SIZE;
    CommitTsEntry {
        timestamp: NativeEndian::read_i64(&page[off..off + 8]),
        origin: NativeEndian::read_u16(&page[off + 8..off + ENTRY_SIZE]),
    }
}
