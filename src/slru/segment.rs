//! slru/segment — файлы сегментов <dir>/<HEX>: чтение/запись страниц,
//! очередь fsync, сканирование и удаление.
//!
//! - Отсутствующий файл или короткое чтение дают нули.
//! - Запись за концом файла дописывает дыру нулями (sparse ok).
//! - Immediate: fsync сегмента после каждой записи.
//!   Deferred: номер сегмента ставится в очередь, sync_pending() вызывает checkpoint.

use anyhow::{Context, Result};
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::FsyncMode;
use crate::metrics::{record_segment_fsync, record_segment_unlinked};
use crate::page::{PageLayout, PageNo, SegmentNo};

pub struct SegmentStore {
    dir: PathBuf,
    layout: PageLayout,
    fsync_mode: FsyncMode,
    pending: Mutex<BTreeSet<SegmentNo>>,
}

impl SegmentStore {
    pub fn open(dir: &Path, layout: PageLayout, fsync_mode: FsyncMode) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("create dir {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            layout,
            fsync_mode,
            pending: Mutex::new(BTreeSet::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn segment_name(&self, seg: SegmentNo) -> String {
        format!("{:0width$X}", seg, width = self.layout.segment_name_width())
    }

    pub fn seg_path(&self, seg: SegmentNo) -> PathBuf {
        self.dir.join(self.segment_name(seg))
    }

    /// Accept only names this layout would produce: exact width, upper-case hex.
    pub fn parse_segment_name(&self, name: &str) -> Option<SegmentNo> {
        if name.len() != self.layout.segment_name_width() {
            return None;
        }
        if !name
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b))
        {
            return None;
        }
        SegmentNo::from_str_radix(name, 16).ok()
    }

    pub fn physical_page_exists(&self, page: PageNo) -> Result<bool> {
        let path = self.seg_path(self.layout.segment_of(page));
        let off = self.layout.offset_in_segment(page);
        match fs::metadata(&path) {
            Ok(m) => Ok(m.len() >= off + self.layout.page_size() as u64),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("stat segment {}", path.display())),
        }
    }

    /// Read `page` into `buf`; returns the number of bytes that came from disk.
    pub fn read_page(&self, page: PageNo, buf: &mut [u8]) -> Result<usize> {
        debug_assert_eq!(buf.len(), self.layout.page_size());
        let path = self.seg_path(self.layout.segment_of(page));
        let mut f = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("segment {} missing, page {} reads as zeroes", path.display(), page);
                buf.fill(0);
                return Ok(0);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("open segment {}", path.display()));
            }
        };
        f.seek(SeekFrom::Start(self.layout.offset_in_segment(page)))
            .with_context(|| format!("seek page {} in {}", page, path.display()))?;

        let mut got = 0usize;
        while got < buf.len() {
            match f.read(&mut buf[got..]) {
                Ok(0) => break,
                Ok(n) => got += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("read page {} from {}", page, path.display()));
                }
            }
        }
        buf[got..].fill(0);
        Ok(got)
    }

    pub fn write_page(&self, page: PageNo, buf: &[u8]) -> Result<()> {
        debug_assert_eq!(buf.len(), self.layout.page_size());
        let seg = self.layout.segment_of(page);
        let path = self.seg_path(seg);
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("open segment {}", path.display()))?;
        f.seek(SeekFrom::Start(self.layout.offset_in_segment(page)))?;
        f.write_all(buf)
            .with_context(|| format!("write page {} to {}", page, path.display()))?;

        match self.fsync_mode {
            FsyncMode::Immediate => {
                f.sync_all()
                    .with_context(|| format!("fsync segment {}", path.display()))?;
                record_segment_fsync();
            }
            FsyncMode::Deferred => {
                self.pending.lock().insert(seg);
            }
        }
        Ok(())
    }

    /// fsync one segment right now (activation pre-creates its page this way).
    pub fn fsync_segment(&self, seg: SegmentNo) -> Result<()> {
        let path = self.seg_path(seg);
        let f = File::open(&path).with_context(|| format!("open segment {}", path.display()))?;
        f.sync_all()
            .with_context(|| format!("fsync segment {}", path.display()))?;
        self.pending.lock().remove(&seg);
        record_segment_fsync();
        Ok(())
    }

    /// Drain the deferred queue. Segments unlinked meanwhile are skipped.
    pub fn sync_pending(&self) -> Result<usize> {
        let segs: Vec<SegmentNo> = std::mem::take(&mut *self.pending.lock())
            .into_iter()
            .collect();
        let mut n = 0usize;
        for (i, &seg) in segs.iter().enumerate() {
            let path = self.seg_path(seg);
            let f = match File::open(&path) {
                Ok(f) => f,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    // вернуть неотработанные обратно в очередь
                    self.pending.lock().extend(segs[i..].iter().copied());
                    return Err(e).with_context(|| format!("open segment {}", path.display()));
                }
            };
            if let Err(e) = f.sync_all() {
                self.pending.lock().extend(segs[i..].iter().copied());
                return Err(e).with_context(|| format!("fsync segment {}", path.display()));
            }
            record_segment_fsync();
            n += 1;
        }
        if n > 0 {
            fsync_dir(&self.dir)?;
        }
        Ok(n)
    }

    pub fn pending_syncs(&self) -> usize {
        self.pending.lock().len()
    }

    /// Segment files currently on disk; foreign names are ignored.
    pub fn segment_files(&self) -> Result<impl Iterator<Item = (SegmentNo, PathBuf)> + '_> {
        let rd = fs::read_dir(&self.dir)
            .with_context(|| format!("read dir {}", self.dir.display()))?;
        Ok(rd.filter_map(Result::ok).filter_map(move |e| {
            let name = e.file_name();
            let seg = self.parse_segment_name(name.to_str()?)?;
            Some((seg, e.path()))
        }))
    }

    /// Sorted list of segment numbers present on disk.
    pub fn segments(&self) -> Result<Vec<SegmentNo>> {
        let mut v: Vec<SegmentNo> = self.segment_files()?.map(|(s, _)| s).collect();
        v.sort_unstable();
        Ok(v)
    }

    pub fn any_removable(&self, cutoff: PageNo) -> Result<bool> {
        Ok(self
            .segment_files()?
            .any(|(seg, _)| self.layout.segment_precedes(seg, cutoff)))
    }

    /// Unlink every segment lying entirely before `cutoff`.
    pub fn unlink_segments(&self, cutoff: PageNo) -> Result<usize> {
        let layout = self.layout;
        self.unlink_where(|seg| layout.segment_precedes(seg, cutoff))
    }

    pub fn unlink_all(&self) -> Result<usize> {
        self.unlink_where(|_| true)
    }

    fn unlink_where<F: Fn(SegmentNo) -> bool>(&self, pred: F) -> Result<usize> {
        let victims: Vec<(SegmentNo, PathBuf)> =
            self.segment_files()?.filter(|(seg, _)| pred(*seg)).collect();
        let mut n = 0usize;
        for (seg, path) in victims {
            info!("removing file \"{}\"", path.display());
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(e).with_context(|| format!("unlink {}", path.display()));
                }
            }
            self.pending.lock().remove(&seg);
            record_segment_unlinked();
            n += 1;
        }
        if n > 0 {
            fsync_dir(&self.dir)?;
        }
        Ok(n)
    }
}

/// Best-effort fsync of a directory (no-op where directories cannot be opened).
pub(crate) fn fsync_dir(dir: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        let f = File::open(dir).with_context(|| format!("open dir {}", dir.display()))?;
        f.sync_all()
            .with_context(|| format!("fsync dir {}", dir.display()))?;
    }
    #[cfg(not(unix))]
    {
        let _ = dir;
    }
    Ok(())
}
