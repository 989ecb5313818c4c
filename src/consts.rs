//! Общие константы форматов (cts directory, segments, control file, WAL).

// -------- Layout --------
pub const CTS_DIR: &str = "cts";
pub const DEFAULT_PAGE_SIZE: usize = 8192;
pub const MIN_PAGE_SIZE: usize = 1024;
pub const MAX_PAGE_SIZE: usize = 64 * 1024;

// Entry = [timestamp i64][origin u16], native byte order, no padding.
pub const ENTRY_SIZE: usize = 10;

// Classic SLRU geometry: 32 pages per segment file.
pub const PAGES_PER_SEGMENT: u32 = 32;

// Segment names are upper-case hex, zero padded; never narrower than this.
pub const MIN_SEGMENT_NAME_WIDTH: usize = 4;

// -------- Buffer pool --------
pub const MIN_CTS_BUFFERS: usize = 4;
pub const MAX_CTS_BUFFERS: usize = 16;
// shared_buffers / 1024, clamped to [MIN, MAX]
pub const CTS_BUFFERS_DIVISOR: usize = 1024;
pub const DEFAULT_SHARED_BUFFERS: usize = 16384;

// -------- Control file --------
pub const CONTROL_FILE: &str = "cts_control";
pub const CONTROL_MAGIC: &[u8; 8] = b"CTSCTRL1";
pub const CONTROL_VERSION: u32 = 1;

// -------- Lock --------
pub const LOCK_FILE: &str = "LOCK";
