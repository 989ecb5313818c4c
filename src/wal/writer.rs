//! WalFile — standalone file-backed WalSink.
//!
//! - append: один кадр за вызов, позиция хвоста под мьютексом.
//! - flush: group commit. Один поток делает fsync, остальные ждут на cv и
//!   выходят, когда flushed_lsn покрывает их цель.
//! - checkpoint_done: если после redo-точки ничего не дописано, файл
//!   усекается до заголовка, а base_lsn сдвигается так, что LSN продолжают расти.

use anyhow::{Context, Result};
use log::{debug, warn};
use parking_lot::{Condvar, Mutex};
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::encode::write_record;
use super::reader::scan_valid_end;
use super::{
    read_wal_file_header, wal_path, write_wal_file_header, CtsRecord, Lsn, WalSink,
    RM_COMMIT_TS_ID, WAL_HDR_SIZE, WAL_REC_HDR_SIZE,
};
use crate::metrics::{record_wal_append, record_wal_flush, record_wal_truncation};

struct WalTail {
    file: File,
    base_lsn: Lsn,
    end: u64,
}

impl WalTail {
    #[inline]
    fn end_lsn(&self) -> Lsn {
        self.base_lsn + self.end
    }
}

/// flushed_lsn — последний LSN, гарантированно на диске.
/// flushing    — один поток делает fsync, остальные ждут по cv.
struct FlushState {
    flushed_lsn: Lsn,
    flushing: bool,
}

pub struct WalFile {
    path: PathBuf,
    fsync: bool,
    tail: Mutex<WalTail>,
    // dup'ed handle so fsync does not hold the append lock
    sync_handle: File,
    flush: Mutex<FlushState>,
    cv: Condvar,
}

impl WalFile {
    /// Open (or create) <root>/wal-000001.log and cut off any torn tail.
    pub fn open(root: &Path, fsync: bool) -> Result<Self> {
        let path = wal_path(root);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("open wal {}", path.display()))?;

        let len = file.metadata()?.len();
        let (base_lsn, end) = if len < WAL_HDR_SIZE as u64 {
            file.set_len(0)?;
            write_wal_file_header(&mut file, 0)?;
            file.sync_all()?;
            (0, WAL_HDR_SIZE as u64)
        } else {
            let base = read_wal_file_header(&mut file)
                .with_context(|| format!("read wal header {}", path.display()))?;
            let (end, n) = scan_valid_end(&mut file, WAL_HDR_SIZE as u64)?;
            if end < len {
                warn!(
                    "wal {}: dropping torn tail of {} bytes after {} records",
                    path.display(),
                    len - end,
                    n
                );
                file.set_len(end)?;
                file.sync_all()?;
            }
            (base, end)
        };
        file.seek(SeekFrom::Start(end))?;

        let sync_handle = file.try_clone().context("dup wal handle")?;
        let tail = WalTail {
            file,
            base_lsn,
            end,
        };
        let flushed = tail.end_lsn();
        debug!(
            "wal open {}: base_lsn={} end_lsn={}",
            path.display(),
            base_lsn,
            flushed
        );

        Ok(Self {
            path,
            fsync,
            tail: Mutex::new(tail),
            sync_handle,
            flush: Mutex::new(FlushState {
                flushed_lsn: flushed,
                flushing: false,
            }),
            cv: Condvar::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn flushed_lsn(&self) -> Lsn {
        self.flush.lock().flushed_lsn
    }

    /// Truncate to the bare header. The new base keeps LSNs monotonic.
    fn truncate_to_header(&self, tail: &mut WalTail) -> Result<()> {
        let new_base = tail.end_lsn() - WAL_HDR_SIZE as u64;
        // Header first: if we crash before set_len the old records still
        // carry their own LSNs and the next end only moves forward.
        write_wal_file_header(&mut tail.file, new_base)?;
        tail.file.sync_all()?;
        tail.file.set_len(WAL_HDR_SIZE as u64)?;
        tail.file.sync_all()?;
        tail.file.seek(SeekFrom::Start(WAL_HDR_SIZE as u64))?;
        tail.base_lsn = new_base;
        tail.end = WAL_HDR_SIZE as u64;
        record_wal_truncation();
        Ok(())
    }
}

impl WalSink for WalFile {
    fn append(&self, rec: &CtsRecord) -> Result<Lsn> {
        let payload = rec.encode();
        let mut t = self.tail.lock();
        let lsn = t.end_lsn() + (WAL_REC_HDR_SIZE + payload.len()) as u64;
        let pos = t.end;
        t.file.seek(SeekFrom::Start(pos))?;
        let n = write_record(&mut t.file, RM_COMMIT_TS_ID, rec.info(), lsn, &payload)
            .with_context(|| format!("append {} to {}", rec.kind_name(), self.path.display()))?;
        t.end += n as u64;
        record_wal_append(n);
        Ok(lsn)
    }

    fn flush(&self, upto: Lsn) -> Result<()> {
        let mut st = self.flush.lock();
        loop {
            if st.flushed_lsn >= upto {
                return Ok(());
            }
            if !st.flushing {
                break;
            }
            self.cv.wait(&mut st);
        }
        st.flushing = true;
        drop(st);

        let target = self.tail.lock().end_lsn();
        let res = if self.fsync {
            self.sync_handle
                .sync_data()
                .with_context(|| format!("fsync wal {}", self.path.display()))
        } else {
            Ok(())
        };

        let mut st = self.flush.lock();
        st.flushing = false;
        if res.is_ok() {
            st.flushed_lsn = st.flushed_lsn.max(target);
            record_wal_flush();
        }
        self.cv.notify_all();
        res
    }

    fn insert_lsn(&self) -> Lsn {
        self.tail.lock().end_lsn()
    }

    fn checkpoint_done(&self, redo_lsn: Lsn) -> Result<()> {
        let mut t = self.tail.lock();
        if t.end_lsn() == redo_lsn && t.end > WAL_HDR_SIZE as u64 {
            self.truncate_to_header(&mut t)?;
            debug!("wal truncated after checkpoint, base_lsn={}", t.base_lsn);
        }
        Ok(())
    }
}
