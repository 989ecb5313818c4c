//! SQL-facing functions. NULL is `None`.
//!
//! - commit_timestamp(xid): NULL when tracking is off or nothing is recorded.
//! - commit_timestamp_origin(xid): (timestamp, origin), both NULL when not found;
//!   errors when tracking is off.
//! - latest_committed(): (xid, timestamp, origin) of the last recorded commit,
//!   all NULL before the first one; errors when tracking is off.

use serde::Serialize;

use crate::cts::CommitTs;
use crate::error::CtsError;
use crate::page::{RepOriginId, TimestampTz};
use crate::xid::{xid_is_normal, TransactionId};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CommitTsRow {
    pub timestamp: Option<TimestampTz>,
    pub origin: Option<RepOriginId>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LatestCommitRow {
    pub xid: Option<TransactionId>,
    pub timestamp: Option<TimestampTz>,
    pub origin: Option<RepOriginId>,
}

pub fn commit_timestamp(
    cts: &CommitTs,
    xid: TransactionId,
) -> Result<Option<TimestampTz>, CtsError> {
    match cts.get_commit_ts(xid) {
        Ok(e) => Ok(e.map(|e| e.timestamp)),
        Err(CtsError::Disabled { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn commit_timestamp_origin(
    cts: &CommitTs,
    xid: TransactionId,
) -> Result<CommitTsRow, CtsError> {
    let (entry, found) = cts.get_commit_ts_data(xid)?;
    if !found {
        return Ok(CommitTsRow::default());
    }
    Ok(CommitTsRow {
        timestamp: Some(entry.timestamp),
        origin: Some(entry.origin),
    })
}

pub fn latest_committed(cts: &CommitTs) -> Result<LatestCommitRow, CtsError> {
    let (xid, entry) = cts.get_latest_commit_ts()?;
    if !xid_is_normal(xid) {
        return Ok(LatestCommitRow::default());
    }
    Ok(LatestCommitRow {
        xid: Some(xid),
        timestamp: Some(entry.timestamp),
        origin: Some(entry.origin),
    })
}
