//! Recording and looking up commit timestamps.

use anyhow::Result;
use std::sync::atomic::Ordering;

use super::CommitTs;
use crate::error::{CtsError, OrFatal};
use crate::metrics::{record_cts_get, record_cts_set, record_last_commit_hit};
use crate::page::{entry_read, entry_write, CommitTsEntry, PageNo, RepOriginId, TimestampTz};
use crate::wal::{CtsRecord, Lsn};
use crate::xid::{xid_is_normal, xid_is_valid, xid_precedes, TransactionId};

impl CommitTs {
    /// Record `ts`/`origin` for a transaction and all of its subtransactions.
    ///
    /// `subxids` are expected in ascending order, so ids sharing a page are
    /// contiguous; each page is locked and written once per run. With
    /// `write_wal` the whole tree goes into a single SetTs record first.
    /// No-op while tracking is off.
    pub fn tree_set_commit_ts(
        &self,
        xid: TransactionId,
        subxids: &[TransactionId],
        ts: TimestampTz,
        origin: RepOriginId,
        write_wal: bool,
    ) {
        if !self.enabled.load(Ordering::Acquire) {
            return;
        }
        self.try_tree_set(xid, subxids, ts, origin, write_wal)
            .or_fatal("commit_ts set")
    }

    fn try_tree_set(
        &self,
        xid: TransactionId,
        subxids: &[TransactionId],
        ts: TimestampTz,
        origin: RepOriginId,
        write_wal: bool,
    ) -> Result<()> {
        let entry = CommitTsEntry::new(ts, origin);
        {
            let _gate = self.ckpt_gate.read();
            let lsn = if write_wal {
                Some(self.wal.append(&CtsRecord::SetTs {
                    main_xid: xid,
                    timestamp: ts,
                    origin,
                    subxids: subxids.to_vec(),
                })?)
            } else {
                None
            };

            // Head xid plus the run of subxids on its page; the first subxid
            // off that page becomes the next head.
            let mut head = xid;
            let mut rest = subxids;
            loop {
                let pageno = self.layout.page_of(head);
                let run = rest
                    .iter()
                    .take_while(|&&s| self.layout.page_of(s) == pageno)
                    .count();
                self.set_xid_commit_ts_in_page(head, &rest[..run], &entry, pageno, lsn)?;
                if run == rest.len() {
                    break;
                }
                head = rest[run];
                rest = &rest[run + 1..];
            }
        }

        let newest = subxids
            .iter()
            .copied()
            .fold(xid, |m, s| if xid_precedes(m, s) { s } else { m });

        let mut st = self.shared.write();
        st.last_xid = xid;
        st.last_entry = entry;
        if xid_precedes(st.newest_cts_xid, newest) {
            st.newest_cts_xid = newest;
        }
        drop(st);

        record_cts_set(1 + subxids.len());
        Ok(())
    }

    /// Write one page's worth of entries under the SLRU lock.
    fn set_xid_commit_ts_in_page(
        &self,
        xid: TransactionId,
        subxids: &[TransactionId],
        entry: &CommitTsEntry,
        pageno: PageNo,
        lsn: Option<Lsn>,
    ) -> Result<()> {
        let mut g = self.slru.lock();
        let slot = g.read_page(pageno, xid)?;
        let page = g.page_mut(slot);
        for &x in std::iter::once(&xid).chain(subxids) {
            debug_assert!(xid_is_normal(x), "commit_ts set for reserved xid {}", x);
            entry_write(page, self.layout.entry_of(x), entry);
        }
        g.mark_dirty(slot, lsn);
        Ok(())
    }

    /// Look up `xid`. Returns the entry and whether a timestamp was found.
    ///
    /// Invalid is an error; Bootstrap/Frozen report "not found"; so does any
    /// xid outside [oldest, newest].
    pub fn get_commit_ts_data(
        &self,
        xid: TransactionId,
    ) -> Result<(CommitTsEntry, bool), CtsError> {
        record_cts_get();
        if !xid_is_valid(xid) {
            return Err(CtsError::InvalidXid(xid));
        }
        if !xid_is_normal(xid) {
            return Ok((CommitTsEntry::EMPTY, false));
        }

        let (oldest, newest) = {
            let st = self.shared.read();
            if !self.is_enabled() {
                return Err(CtsError::Disabled {
                    in_recovery: self.in_recovery(),
                });
            }
            if st.last_xid == xid {
                record_last_commit_hit();
                return Ok((st.last_entry, st.last_entry.is_recorded()));
            }
            (st.oldest_cts_xid, st.newest_cts_xid)
        };

        if !xid_is_valid(oldest) || xid_precedes(xid, oldest) || xid_precedes(newest, xid) {
            return Ok((CommitTsEntry::EMPTY, false));
        }

        let entryno = self.layout.entry_of(xid);
        let entry = self
            .slru
            .with_page_shared(self.layout.page_of(xid), xid, |p| entry_read(p, entryno))?;
        Ok((entry, entry.is_recorded()))
    }

    /// `Some(entry)` when a timestamp is recorded for `xid`.
    pub fn get_commit_ts(&self, xid: TransactionId) -> Result<Option<CommitTsEntry>, CtsError> {
        let (entry, found) = self.get_commit_ts_data(xid)?;
        Ok(found.then_some(entry))
    }

    /// The most recent commit recorded through tree_set_commit_ts.
    pub fn get_latest_commit_ts(&self) -> Result<(TransactionId, CommitTsEntry), CtsError> {
        let st = self.shared.read();
        if !self.is_enabled() {
            return Err(CtsError::Disabled {
                in_recovery: self.in_recovery(),
            });
        }
        Ok((st.last_xid, st.last_entry))
    }
}
