//! Commit-timestamp WAL records and their payload encoding (LE).
//!
//! ZeroPage  [page u32]                                        4 bytes
//! Truncate  [page u32][oldest_xid u32]                        8 bytes
//! SetTs     [main_xid u32][ts i64][origin u16][nsub u32][subxid u32]*   18 + 4n

use anyhow::{anyhow, bail, Result};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::Cursor;

use super::{COMMIT_TS_SETTS, COMMIT_TS_TRUNCATE, COMMIT_TS_ZEROPAGE};
use crate::page::{PageNo, RepOriginId, TimestampTz};
use crate::xid::TransactionId;

const SETTS_FIXED_LEN: usize = 4 + 8 + 2 + 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CtsRecord {
    ZeroPage {
        page_no: PageNo,
    },
    Truncate {
        page_no: PageNo,
        oldest_xid: TransactionId,
    },
    SetTs {
        main_xid: TransactionId,
        timestamp: TimestampTz,
        origin: RepOriginId,
        subxids: Vec<TransactionId>,
    },
}

impl CtsRecord {
    pub fn info(&self) -> u8 {
        match self {
            CtsRecord::ZeroPage { .. } => COMMIT_TS_ZEROPAGE,
            CtsRecord::Truncate { .. } => COMMIT_TS_TRUNCATE,
            CtsRecord::SetTs { .. } => COMMIT_TS_SETTS,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            CtsRecord::ZeroPage { .. } => "ZEROPAGE",
            CtsRecord::Truncate { .. } => "TRUNCATE",
            CtsRecord::SetTs { .. } => "SETTS",
        }
    }

    pub fn payload_len(&self) -> usize {
        match self {
            CtsRecord::ZeroPage { .. } => 4,
            CtsRecord::Truncate { .. } => 8,
            CtsRecord::SetTs { subxids, .. } => SETTS_FIXED_LEN + 4 * subxids.len(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.payload_len()];
        match self {
            CtsRecord::ZeroPage { page_no } => {
                LittleEndian::write_u32(&mut out[0..4], *page_no);
            }
            CtsRecord::Truncate {
                page_no,
                oldest_xid,
            } => {
                LittleEndian::write_u32(&mut out[0..4], *page_no);
                LittleEndian::write_u32(&mut out[4..8], *oldest_xid);
            }
            CtsRecord::SetTs {
                main_xid,
                timestamp,
                origin,
                subxids,
            } => {
                LittleEndian::write_u32(&mut out[0..4], *main_xid);
                LittleEndian::write_i64(&mut out[4..12], *timestamp);
                LittleEndian::write_u16(&mut out[12..14], *origin);
                LittleEndian::write_u32(&mut out[14..18], subxids.len() as u32);
                for (i, s) in subxids.iter().enumerate() {
                    let off = SETTS_FIXED_LEN + 4 * i;
                    LittleEndian::write_u32(&mut out[off..off + 4], *s);
                }
            }
        }
        out
    }

    /// Decode a payload for `info`. Unknown kinds and length mismatches are errors.
    pub fn decode(info: u8, payload: &[u8]) -> Result<Self> {
        match info {
            COMMIT_TS_ZEROPAGE => {
                if payload.len() != 4 {
                    bail!("ZEROPAGE payload len {} != 4", payload.len());
                }
                Ok(CtsRecord::ZeroPage {
                    page_no: LittleEndian::read_u32(&payload[0..4]),
                })
            }
            COMMIT_TS_TRUNCATE => {
                if payload.len() != 8 {
                    bail!("TRUNCATE payload len {} != 8", payload.len());
                }
                Ok(CtsRecord::Truncate {
                    page_no: LittleEndian::read_u32(&payload[0..4]),
                    oldest_xid: LittleEndian::read_u32(&payload[4..8]),
                })
            }
            COMMIT_TS_SETTS => {
                if payload.len() < SETTS_FIXED_LEN {
                    bail!("SETTS payload too short: {}", payload.len());
                }
                let mut r = Cursor::new(payload);
                let main_xid = r.read_u32::<LittleEndian>()?;
                let timestamp = r.read_i64::<LittleEndian>()?;
                let origin = r.read_u16::<LittleEndian>()?;
                let nsub = r.read_u32::<LittleEndian>()? as usize;
                if payload.len() != SETTS_FIXED_LEN + 4 * nsub {
                    bail!(
                        "SETTS payload len {} does not match nsubxids={}",
                        payload.len(),
                        nsub
                    );
                }
                let mut subxids = Vec::with_capacity(nsub);
                for _ in 0..nsub {
                    subxids.push(r.read_u32::<LittleEndian>()?);
                }
                Ok(CtsRecord::SetTs {
                    main_xid,
                    timestamp,
                    origin,
                    subxids,
                })
            }
            other => Err(anyhow!("commit_ts redo: unknown op code {:#04x}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setts_layout() {
        let rec = CtsRecord::SetTs {
            main_xid: 0x0102_0304,
            timestamp: 5,
            origin: 9,
            subxids: vec![7, 8],
        };
        let p = rec.encode();
        assert_eq!(p.len(), 18 + 8);
        assert_eq!(&p[0..4], &[4, 3, 2, 1]);
        assert_eq!(LittleEndian::read_i64(&p[4..12]), 5);
        assert_eq!(LittleEndian::read_u16(&p[12..14]), 9);
        assert_eq!(LittleEndian::read_u32(&p[14..18]), 2);
        assert_eq!(CtsRecord::decode(COMMIT_TS_SETTS, &p).unwrap(), rec);
    }

    #[test]
    fn decode_rejects_bad_lengths_and_kinds() {
        assert!(CtsRecord::decode(COMMIT_TS_ZEROPAGE, &[0, 0, 0]).is_err());
        assert!(CtsRecord::decode(COMMIT_TS_TRUNCATE, &[0; 4]).is_err());
        let mut p = CtsRecord::SetTs {
            main_xid: 3,
            timestamp: 1,
            origin: 0,
            subxids: vec![4],
        }
        .encode();
        p.pop();
        assert!(CtsRecord::decode(COMMIT_TS_SETTS, &p).is_err());
        let e = CtsRecord::decode(0x70, &[]).unwrap_err();
        assert!(e.to_string().contains("unknown op code"));
    }
}
