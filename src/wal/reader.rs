//! wal/reader — последовательное чтение кадров WAL с проверкой CRC.
//!
//! Использование:
//!   let len = file.metadata()?.len();
//!   let mut pos = WAL_HDR_SIZE as u64;
//!   while let Some((rec, next)) = read_next_record(&mut file, pos, len)? {
//!       /* обработка rec */
//!       pos = next;
//!   }

use anyhow::{anyhow, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use super::{
    crc32c_of_parts, Lsn, WAL_REC_HDR_SIZE, WAL_REC_OFF_CRC32, WAL_REC_OFF_INFO, WAL_REC_OFF_LEN,
    WAL_REC_OFF_LSN, WAL_REC_OFF_RMGR,
};

/// Одна запись WAL, считанная с диска.
#[derive(Debug, Clone)]
pub struct WalRecord {
    pub rmgr: u8,
    pub info: u8,
    pub lsn: Lsn,
    pub payload: Vec<u8>,
    /// File offset of the record header.
    pub pos: u64,
}

/// Считать следующую запись с позиции pos. file_len — текущая длина файла.
///
/// - Ok(Some((rec, next_pos))) — запись валидна.
/// - Ok(None) — EOF или частичный хвост (заголовок/payload не умещаются).
/// - Err(e) — CRC mismatch или I/O ошибка.
pub fn read_next_record(
    f: &mut File,
    pos: u64,
    file_len: u64,
) -> Result<Option<(WalRecord, u64)>> {
    if pos + (WAL_REC_HDR_SIZE as u64) > file_len {
        return Ok(None);
    }

    f.seek(SeekFrom::Start(pos))?;
    let mut hdr = [0u8; WAL_REC_HDR_SIZE];
    f.read_exact(&mut hdr)?;

    let len = LittleEndian::read_u32(&hdr[WAL_REC_OFF_LEN..WAL_REC_OFF_LEN + 4]) as u64;
    let total = WAL_REC_HDR_SIZE as u64 + len;
    if pos + total > file_len {
        return Ok(None);
    }

    let mut payload = vec![0u8; len as usize];
    f.read_exact(&mut payload)?;

    let stored = LittleEndian::read_u32(&hdr[WAL_REC_OFF_CRC32..WAL_REC_OFF_CRC32 + 4]);
    let actual = crc32c_of_parts(&hdr[..WAL_REC_OFF_CRC32], &payload);
    if stored != actual {
        return Err(anyhow!(
            "WAL CRC mismatch at pos {}: stored={:#010x} actual={:#010x}",
            pos,
            stored,
            actual
        ));
    }

    let rec = WalRecord {
        rmgr: hdr[WAL_REC_OFF_RMGR],
        info: hdr[WAL_REC_OFF_INFO],
        lsn: LittleEndian::read_u64(&hdr[WAL_REC_OFF_LSN..WAL_REC_OFF_LSN + 8]),
        payload,
        pos,
    };
    Ok(Some((rec, pos + total)))
}

/// Walk the file from the header and return the offset just past the last
/// intact record. Anything after it is a torn tail.
pub fn scan_valid_end(f: &mut File, start: u64) -> Result<(u64, usize)> {
    let len = f.metadata()?.len();
    let mut pos = start;
    let mut n = 0usize;
    loop {
        match read_next_record(f, pos, len) {
            Ok(Some((_, next))) => {
                pos = next;
                n += 1;
            }
            Ok(None) => break,
            Err(e) => {
                log::warn!("wal scan: stopping at pos {}: {:#}", pos, e);
                break;
            }
        }
    }
    Ok((pos, n))
}
