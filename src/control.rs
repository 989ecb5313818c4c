// src/control.rs — control file <root>/cts_control
//
// Формат (LE):
// MAGIC8 = "CTSCTRL1"
// u32 version          = 1
// u32 page_size
// u64 next_fxid        (epoch:xid)
// u32 oldest_xid
// u32 oldest_cts_xid   (0 = no range)
// u32 newest_cts_xid
// u64 redo_lsn         (replay starts after this LSN)
// u8  tracking_active  (1 = commit timestamps were on at this checkpoint)
// u32 crc32c           (над всеми предыдущими байтами)
//
// Атомарная запись: tmp + fsync + rename, затем fsync каталога.

use anyhow::{anyhow, Context, Result};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use crate::consts::{CONTROL_FILE, CONTROL_MAGIC, CONTROL_VERSION};
use crate::slru::segment::fsync_dir;
use crate::wal::Lsn;
use crate::xid::{FullTransactionId, TransactionId};

const CONTROL_BODY_LEN: usize = 8 + 4 + 4 + 8 + 4 + 4 + 4 + 8 + 1;
pub const CONTROL_FILE_LEN: usize = CONTROL_BODY_LEN + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlData {
    pub version: u32,
    pub page_size: u32,
    pub next_fxid: FullTransactionId,
    pub oldest_xid: TransactionId,
    pub oldest_cts_xid: TransactionId,
    pub newest_cts_xid: TransactionId,
    pub redo_lsn: Lsn,
    pub tracking_active: bool,
}

#[inline]
pub fn control_path(root: &Path) -> PathBuf {
    root.join(CONTROL_FILE)
}

fn encode(c: &ControlData) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(CONTROL_FILE_LEN);
    out.write_all(CONTROL_MAGIC)?;
    out.write_u32::<LittleEndian>(c.version)?;
    out.write_u32::<LittleEndian>(c.page_size)?;
    out.write_u64::<LittleEndian>(c.next_fxid.0)?;
    out.write_u32::<LittleEndian>(c.oldest_xid)?;
    out.write_u32::<LittleEndian>(c.oldest_cts_xid)?;
    out.write_u32::<LittleEndian>(c.newest_cts_xid)?;
    out.write_u64::<LittleEndian>(c.redo_lsn)?;
    out.write_u8(c.tracking_active as u8)?;
    let crc = crc32c::crc32c(&out);
    out.write_u32::<LittleEndian>(crc)?;
    Ok(out)
}

fn decode(path: &Path, buf: &[u8]) -> Result<ControlData> {
    if buf.len() != CONTROL_FILE_LEN {
        return Err(anyhow!(
            "control file {} has length {} (expected {})",
            path.display(),
            buf.len(),
            CONTROL_FILE_LEN
        ));
    }
    if &buf[..8] != CONTROL_MAGIC {
        return Err(anyhow!("bad control magic at {}", path.display()));
    }
    let stored = LittleEndian::read_u32(&buf[CONTROL_BODY_LEN..]);
    let actual = crc32c::crc32c(&buf[..CONTROL_BODY_LEN]);
    if stored != actual {
        return Err(anyhow!(
            "control file {} checksum mismatch: stored={:#010x} actual={:#010x}",
            path.display(),
            stored,
            actual
        ));
    }

    let mut r = Cursor::new(&buf[8..CONTROL_BODY_LEN]);
    let version = r.read_u32::<LittleEndian>()?;
    if version != CONTROL_VERSION {
        return Err(anyhow!(
            "unsupported control version {} at {} (expected {})",
            version,
            path.display(),
            CONTROL_VERSION
        ));
    }
    Ok(ControlData {
        version,
        page_size: r.read_u32::<LittleEndian>()?,
        next_fxid: FullTransactionId(r.read_u64::<LittleEndian>()?),
        oldest_xid: r.read_u32::<LittleEndian>()?,
        oldest_cts_xid: r.read_u32::<LittleEndian>()?,
        newest_cts_xid: r.read_u32::<LittleEndian>()?,
        redo_lsn: r.read_u64::<LittleEndian>()?,
        tracking_active: r.read_u8()? != 0,
    })
}

/// Read the control file; Ok(None) if it does not exist yet.
pub fn read_control(root: &Path) -> Result<Option<ControlData>> {
    let path = control_path(root);
    let buf = match fs::read(&path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
    };
    decode(&path, &buf).map(Some)
}

pub fn write_control(root: &Path, c: &ControlData) -> Result<()> {
    let path = control_path(root);
    let tmp = root.join(format!("{}.tmp", CONTROL_FILE));
    let bytes = encode(c)?;
    {
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)
            .with_context(|| format!("open {}", tmp.display()))?;
        f.write_all(&bytes)?;
        f.sync_all()?;
    }
    fs::rename(&tmp, &path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    fsync_dir(root)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ControlData {
        ControlData {
            version: CONTROL_VERSION,
            page_size: 8192,
            next_fxid: FullTransactionId::from_epoch_and_xid(1, 77),
            oldest_xid: 3,
            oldest_cts_xid: 10,
            newest_cts_xid: 70,
            redo_lsn: 4096,
            tracking_active: true,
        }
    }

    #[test]
    fn control_write_read_and_corruption() {
        let root = std::env::temp_dir().join(format!(
            "qcts-control-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        fs::create_dir_all(&root).unwrap();
        assert!(read_control(&root).unwrap().is_none());

        write_control(&root, &sample()).unwrap();
        assert_eq!(read_control(&root).unwrap(), Some(sample()));
        assert_eq!(
            fs::metadata(control_path(&root)).unwrap().len(),
            CONTROL_FILE_LEN as u64
        );

        let mut raw = fs::read(control_path(&root)).unwrap();
        raw[20] ^= 0xFF;
        fs::write(control_path(&root), &raw).unwrap();
        let e = read_control(&root).unwrap_err();
        assert!(e.to_string().contains("checksum mismatch"), "{e}");
    }
}
