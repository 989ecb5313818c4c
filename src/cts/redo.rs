use anyhow::Result;
use log::debug;

use super::CommitTs;
use crate::metrics::record_redo_applied;
use crate::wal::CtsRecord;
use crate::xid::xid_precedes;

impl CommitTs {
    /// Apply one commit_ts WAL record. Safe to repeat: every record kind is idempotent.
    pub fn redo(&self, rec: &CtsRecord) -> Result<()> {
        match rec {
            CtsRecord::ZeroPage { page_no } => {
                let mut g = self.slru.lock();
                let slot = g.zero_page(*page_no)?;
                g.mark_dirty(slot, None);
                g.write_page(slot)?;
            }
            CtsRecord::Truncate {
                page_no,
                oldest_xid,
            } => {
                self.advance_oldest(*oldest_xid);
                let mut g = self.slru.lock();
                // the head is unknown during replay; use the record's page so the
                // wraparound check passes
                g.set_latest_page(*page_no);
                g.truncate(*page_no)?;
            }
            CtsRecord::SetTs {
                main_xid,
                timestamp,
                origin,
                subxids,
            } => {
                let max = subxids
                    .iter()
                    .copied()
                    .fold(*main_xid, |m, s| if xid_precedes(m, s) { s } else { m });
                self.xids.advance_past(max);
                self.tree_set_commit_ts(*main_xid, subxids, *timestamp, *origin, false);
            }
        }
        debug!("commit_ts redo {}", rec.kind_name());
        record_redo_applied();
        Ok(())
    }
}
