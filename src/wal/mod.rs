//! WAL for the commit-timestamp resource manager (CTSWAL01).
//!
//! Разделение:
//! - record.rs — CtsRecord (ZeroPage / Truncate / SetTs) и кодирование payload.
//! - encode.rs — заголовок записи с CRC32C и запись кадра.
//! - reader.rs — последовательное чтение кадров с проверкой CRC.
//! - writer.rs — WalFile: append, flush (fsync коалессация), усечение после checkpoint.
//! - replay.rs — redo всех записей после redo_lsn через CommitTs::redo.
//!
//! LSN is a byte position in an ever-growing stream: lsn = base_lsn + file
//! offset, where base_lsn lives in the file header and moves forward every
//! time the file is truncated back to its header. A record's LSN is the
//! position just past its last byte, so flush(lsn) covers the whole record.

use anyhow::{bail, Result};
use byteorder::{ByteOrder, LittleEndian};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub mod encode;
pub mod reader;
pub mod record;
pub mod replay;
pub mod writer;

pub use reader::{read_next_record, WalRecord};
pub use record::CtsRecord;
pub use replay::{replay_wal, ReplayStats};
pub use writer::WalFile;

pub type Lsn = u64;
pub const INVALID_LSN: Lsn = 0;

// -------------------- File format --------------------

pub const WAL_FILE: &str = "wal-000001.log";
pub const WAL_MAGIC: &[u8; 8] = b"CTSWAL01";
pub const WAL_HDR_SIZE: usize = 16; // magic8 + base_lsn u64
pub const WAL_HDR_OFF_BASE_LSN: usize = 8;

// Record header: 20 bytes
// [rmgr u8][info u8][reserved u16][lsn u64][len u32][crc32c u32]
pub const WAL_REC_HDR_SIZE: usize = 20;

pub const WAL_REC_OFF_RMGR: usize = 0;
pub const WAL_REC_OFF_INFO: usize = 1;
pub const WAL_REC_OFF_RESERVED: usize = 2;
pub const WAL_REC_OFF_LSN: usize = 4;
pub const WAL_REC_OFF_LEN: usize = 12;
pub const WAL_REC_OFF_CRC32: usize = 16;

// Resource manager id; records of other managers are skipped by replay.
pub const RM_COMMIT_TS_ID: u8 = 14;

pub const COMMIT_TS_ZEROPAGE: u8 = 0x00;
pub const COMMIT_TS_TRUNCATE: u8 = 0x10;
pub const COMMIT_TS_SETTS: u8 = 0x20;

/// Where the commit-timestamp module sends its WAL. The engine's log
/// manager implements this; [`WalFile`] is the standalone file-backed one.
pub trait WalSink: Send + Sync {
    /// Append a record, returning its end LSN.
    fn append(&self, rec: &CtsRecord) -> Result<Lsn>;

    /// Make everything up to `upto` durable.
    fn flush(&self, upto: Lsn) -> Result<()>;

    /// LSN just past the last appended record.
    fn insert_lsn(&self) -> Lsn;

    /// Called after a checkpoint whose redo point is `redo_lsn` is durable.
    fn checkpoint_done(&self, _redo_lsn: Lsn) -> Result<()> {
        Ok(())
    }
}

/// In-memory sink: keeps records in order and treats flush as a no-op.
#[derive(Default)]
pub struct MemWal {
    inner: Mutex<MemWalInner>,
}

#[derive(Default)]
struct MemWalInner {
    records: Vec<(Lsn, CtsRecord)>,
    end: Lsn,
    flushed: Lsn,
}

impl MemWal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(Lsn, CtsRecord)> {
        self.inner.lock().records.clone()
    }

    pub fn flushed_lsn(&self) -> Lsn {
        self.inner.lock().flushed
    }
}

impl WalSink for MemWal {
    fn append(&self, rec: &CtsRecord) -> Result<Lsn> {
        let mut g = self.inner.lock();
        g.end += (WAL_REC_HDR_SIZE + rec.payload_len()) as Lsn;
        let lsn = g.end;
        g.records.push((lsn, rec.clone()));
        Ok(lsn)
    }

    fn flush(&self, upto: Lsn) -> Result<()> {
        let mut g = self.inner.lock();
        if upto > g.flushed {
            g.flushed = upto.min(g.end);
        }
        Ok(())
    }

    fn insert_lsn(&self) -> Lsn {
        self.inner.lock().end
    }
}

// -------------------- Общие утилиты --------------------

/// CRC32C по header[0..crc) + payload без промежуточных аллокаций.
#[inline]
pub fn crc32c_of_parts(head_without_crc: &[u8], payload: &[u8]) -> u32 {
    let c = crc32c::crc32c_append(0, head_without_crc);
    crc32c::crc32c_append(c, payload)
}

pub fn wal_path(root: &Path) -> PathBuf {
    root.join(WAL_FILE)
}

/// Записать 16-байтовый заголовок: MAGIC + base_lsn (LE).
pub fn write_wal_file_header(f: &mut File, base_lsn: Lsn) -> Result<()> {
    let mut hdr = [0u8; WAL_HDR_SIZE];
    hdr[..8].copy_from_slice(WAL_MAGIC);
    LittleEndian::write_u64(
        &mut hdr[WAL_HDR_OFF_BASE_LSN..WAL_HDR_OFF_BASE_LSN + 8],
        base_lsn,
    );
    f.seek(SeekFrom::Start(0))?;
    f.write_all(&hdr)?;
    Ok(())
}

/// Прочитать base_lsn; ошибка при неверной магии или коротком файле.
pub fn read_wal_file_header(f: &mut File) -> Result<Lsn> {
    if f.metadata()?.len() < WAL_HDR_SIZE as u64 {
        bail!("wal too small (< header)");
    }
    let mut hdr = [0u8; WAL_HDR_SIZE];
    f.seek(SeekFrom::Start(0))?;
    f.read_exact(&mut hdr)?;
    if &hdr[..8] != WAL_MAGIC {
        bail!("bad WAL magic");
    }
    Ok(LittleEndian::read_u64(
        &hdr[WAL_HDR_OFF_BASE_LSN..WAL_HDR_OFF_BASE_LSN + 8],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_wal_lsns_grow_by_record_size() {
        let w = MemWal::new();
        let a = w.append(&CtsRecord::ZeroPage { page_no: 1 }).unwrap();
        let b = w
            .append(&CtsRecord::Truncate {
                page_no: 2,
                oldest_xid: 3,
            })
            .unwrap();
        assert_eq!(a, (WAL_REC_HDR_SIZE + 4) as Lsn);
        assert_eq!(b, a + (WAL_REC_HDR_SIZE + 8) as Lsn);
        assert_eq!(w.insert_lsn(), b);
        w.flush(a).unwrap();
        assert_eq!(w.flushed_lsn(), a);
        assert_eq!(w.records().len(), 2);
    }
}
