//! XID generator (XidGenLock + next_fxid / oldest_xid).
//!
//! Allocation runs a caller hook while the generator lock is still held, so
//! the commit-timestamp page for a new xid exists before any other backend
//! can observe that xid.

use parking_lot::RwLock;
use serde::Serialize;

use super::{
    xid_follows_or_equals, xid_is_normal, FullTransactionId, TransactionId, XidReference,
    FIRST_NORMAL_XID,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct XidGenState {
    pub next_fxid: FullTransactionId,
    pub oldest_xid: TransactionId,
}

impl Default for XidGenState {
    fn default() -> Self {
        Self {
            next_fxid: FullTransactionId::FIRST_NORMAL,
            oldest_xid: FIRST_NORMAL_XID,
        }
    }
}

pub struct XidAllocator {
    state: RwLock<XidGenState>,
}

impl XidAllocator {
    pub fn new(next_fxid: FullTransactionId, oldest_xid: TransactionId) -> Self {
        let next_fxid = if xid_is_normal(next_fxid.xid()) {
            next_fxid
        } else {
            // 0:0 / 1:1 ... не бывают "следующими" — поднимаем до первого нормального
            FullTransactionId::from_epoch_and_xid(next_fxid.epoch(), FIRST_NORMAL_XID)
        };
        Self {
            state: RwLock::new(XidGenState {
                next_fxid,
                oldest_xid,
            }),
        }
    }

    pub fn snapshot(&self) -> XidGenState {
        *self.state.read()
    }

    pub fn read_next_full_xid(&self) -> FullTransactionId {
        self.state.read().next_fxid
    }

    pub fn reference(&self) -> XidReference {
        XidReference::new(self.read_next_full_xid())
    }

    pub fn oldest_xid(&self) -> TransactionId {
        self.state.read().oldest_xid
    }

    pub fn set_oldest_xid(&self, xid: TransactionId) {
        self.state.write().oldest_xid = xid;
    }

    /// Assign the next xid. `on_assign` runs under the exclusive generator
    /// lock before the counter moves.
    pub fn allocate_with<F>(&self, on_assign: F) -> TransactionId
    where
        F: FnOnce(TransactionId),
    {
        let mut st = self.state.write();
        let xid = st.next_fxid.xid();
        on_assign(xid);
        st.next_fxid = st.next_fxid.next_normal();
        xid
    }

    /// Redo helper: make sure the generator is past `xid`.
    pub fn advance_past(&self, xid: TransactionId) {
        if !xid_is_normal(xid) {
            return;
        }
        let mut st = self.state.write();
        if xid_follows_or_equals(xid, st.next_fxid.xid()) {
            let full = XidReference::new(st.next_fxid).full_xid_from_xid(xid);
            st.next_fxid = full.next_normal();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xid::{FROZEN_XID, MAX_XID};

    #[test]
    fn allocate_runs_hook_in_order() {
        let a = XidAllocator::new(FullTransactionId::FIRST_NORMAL, FIRST_NORMAL_XID);
        let mut seen = Vec::new();
        for _ in 0..3 {
            a.allocate_with(|x| seen.push(x));
        }
        assert_eq!(seen, vec![3, 4, 5]);
        assert_eq!(a.read_next_full_xid().0, 6);
    }

    #[test]
    fn allocate_wraps_into_next_epoch() {
        let a = XidAllocator::new(FullTransactionId::from_epoch_and_xid(0, MAX_XID - 1), 3);
        let x1 = a.allocate_with(|_| {});
        let x2 = a.allocate_with(|_| {});
        let x3 = a.allocate_with(|_| {});
        assert_eq!((x1, x2, x3), (MAX_XID - 1, MAX_XID, FIRST_NORMAL_XID));
        assert_eq!(a.read_next_full_xid(), FullTransactionId::from_epoch_and_xid(1, 4));
    }

    #[test]
    fn advance_past_only_moves_forward() {
        let a = XidAllocator::new(FullTransactionId::from_epoch_and_xid(0, 100), 3);
        a.advance_past(50);
        assert_eq!(a.read_next_full_xid().0, 100);
        a.advance_past(100);
        assert_eq!(a.read_next_full_xid().0, 101);
        a.advance_past(500);
        assert_eq!(a.read_next_full_xid().0, 501);
        a.advance_past(FROZEN_XID);
        assert_eq!(a.read_next_full_xid().0, 501);
    }
}
