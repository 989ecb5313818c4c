//! wal/encode — заголовок записи (20 байт) с CRC32C и запись кадра [header][payload].

use anyhow::{anyhow, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::io::Write;

use super::{
    crc32c_of_parts, Lsn, WAL_REC_HDR_SIZE, WAL_REC_OFF_CRC32, WAL_REC_OFF_INFO, WAL_REC_OFF_LEN,
    WAL_REC_OFF_LSN, WAL_REC_OFF_RESERVED, WAL_REC_OFF_RMGR,
};

/// CRC считается по header[0..WAL_REC_OFF_CRC32] + payload.
pub fn build_hdr_with_crc(rmgr: u8, info: u8, lsn: Lsn, payload: &[u8]) -> [u8; WAL_REC_HDR_SIZE] {
    let mut hdr = [0u8; WAL_REC_HDR_SIZE];
    hdr[WAL_REC_OFF_RMGR] = rmgr;
    hdr[WAL_REC_OFF_INFO] = info;
    LittleEndian::write_u16(&mut hdr[WAL_REC_OFF_RESERVED..WAL_REC_OFF_RESERVED + 2], 0);
    LittleEndian::write_u64(&mut hdr[WAL_REC_OFF_LSN..WAL_REC_OFF_LSN + 8], lsn);
    LittleEndian::write_u32(
        &mut hdr[WAL_REC_OFF_LEN..WAL_REC_OFF_LEN + 4],
        payload.len() as u32,
    );

    let crc = crc32c_of_parts(&hdr[..WAL_REC_OFF_CRC32], payload);
    LittleEndian::write_u32(&mut hdr[WAL_REC_OFF_CRC32..WAL_REC_OFF_CRC32 + 4], crc);
    hdr
}

/// Записать один кадр в текущую позицию writer'а (без seek).
/// Header and payload go out in a single write so a torn append leaves
/// at most one partial frame at the tail.
pub fn write_record<W: Write>(
    writer: &mut W,
    rmgr: u8,
    info: u8,
    lsn: Lsn,
    payload: &[u8],
) -> Result<usize> {
    if payload.len() > u32::MAX as usize {
        return Err(anyhow!(
            "payload too large for WAL record: {} bytes (max {})",
            payload.len(),
            u32::MAX
        ));
    }

    let hdr = build_hdr_with_crc(rmgr, info, lsn, payload);
    let mut frame = Vec::with_capacity(WAL_REC_HDR_SIZE + payload.len());
    frame.extend_from_slice(&hdr);
    frame.extend_from_slice(payload);
    writer.write_all(&frame)?;
    Ok(frame.len())
}
