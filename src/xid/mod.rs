//! Transaction ids: 32-bit wrap-around xids and 64-bit epoch-qualified full xids.
//!
//! Normal xids compare modulo 2^32 ("a precedes b" iff (a - b) as i32 < 0).
//! The three reserved ids (Invalid, Bootstrap, Frozen) compare as plain
//! unsigned values and always sort before every normal id.

pub mod alloc;

use serde::Serialize;
use std::fmt;

pub use alloc::{XidAllocator, XidGenState};

pub type TransactionId = u32;

pub const INVALID_XID: TransactionId = 0;
pub const BOOTSTRAP_XID: TransactionId = 1;
pub const FROZEN_XID: TransactionId = 2;
pub const FIRST_NORMAL_XID: TransactionId = 3;
pub const MAX_XID: TransactionId = u32::MAX;

#[inline]
pub fn xid_is_valid(xid: TransactionId) -> bool {
    xid != INVALID_XID
}

#[inline]
pub fn xid_is_normal(xid: TransactionId) -> bool {
    xid >= FIRST_NORMAL_XID
}

/// a < b in wrap-around order.
#[inline]
pub fn xid_precedes(a: TransactionId, b: TransactionId) -> bool {
    if !xid_is_normal(a) || !xid_is_normal(b) {
        return a < b;
    }
    (a.wrapping_sub(b) as i32) < 0
}

#[inline]
pub fn xid_precedes_or_equals(a: TransactionId, b: TransactionId) -> bool {
    if !xid_is_normal(a) || !xid_is_normal(b) {
        return a <= b;
    }
    (a.wrapping_sub(b) as i32) <= 0
}

#[inline]
pub fn xid_follows(a: TransactionId, b: TransactionId) -> bool {
    xid_precedes(b, a)
}

#[inline]
pub fn xid_follows_or_equals(a: TransactionId, b: TransactionId) -> bool {
    xid_precedes_or_equals(b, a)
}

/// Next xid in allocation order; wrapping past MAX_XID skips the reserved ids.
#[inline]
pub fn xid_advance(xid: TransactionId) -> TransactionId {
    let next = xid.wrapping_add(1);
    if next < FIRST_NORMAL_XID {
        FIRST_NORMAL_XID
    } else {
        next
    }
}

/// Epoch-qualified transaction id: high 32 bits epoch, low 32 bits xid.
/// Never wraps in practice, so plain integer order is total.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FullTransactionId(pub u64);

impl FullTransactionId {
    pub const INVALID: FullTransactionId = FullTransactionId(0);
    pub const FIRST_NORMAL: FullTransactionId = FullTransactionId(FIRST_NORMAL_XID as u64);

    pub fn from_epoch_and_xid(epoch: u32, xid: TransactionId) -> Self {
        FullTransactionId(((epoch as u64) << 32) | xid as u64)
    }

    #[inline]
    pub fn epoch(self) -> u32 {
        (self.0 >> 32) as u32
    }

    #[inline]
    pub fn xid(self) -> TransactionId {
        self.0 as u32
    }

    /// Successor in allocation order. Reserved low xids are skipped after
    /// an epoch boundary.
    pub fn next_normal(self) -> Self {
        let mut n = self.0 + 1;
        if (n as u32) < FIRST_NORMAL_XID {
            n = (n & !0xFFFF_FFFF) | FIRST_NORMAL_XID as u64;
        }
        FullTransactionId(n)
    }
}

impl fmt::Display for FullTransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.epoch(), self.xid())
    }
}

/// A (next_xid, next_fxid) pair captured from the allocator. Any xid within
/// 2^31 of next_xid can be widened to its full form relative to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct XidReference {
    next_fxid: FullTransactionId,
}

impl XidReference {
    pub fn new(next_fxid: FullTransactionId) -> Self {
        Self { next_fxid }
    }

    pub fn next_xid(&self) -> TransactionId {
        self.next_fxid.xid()
    }

    pub fn next_fxid(&self) -> FullTransactionId {
        self.next_fxid
    }

    /// Widen `xid`. Results that would land before the first normal full
    /// xid (an "old" xid seen in epoch 0) clamp to FIRST_NORMAL.
    pub fn full_xid_from_xid(&self, xid: TransactionId) -> FullTransactionId {
        let diff = self.next_xid().wrapping_sub(xid) as i32;
        let full = self.next_fxid.0 as i128 - diff as i128;
        if full < FIRST_NORMAL_XID as i128 {
            return FullTransactionId::FIRST_NORMAL;
        }
        FullTransactionId(full as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedes_normal_and_wrapped() {
        assert!(xid_precedes(3, 4));
        assert!(!xid_precedes(4, 3));
        assert!(!xid_precedes(5, 5));
        // через 2^32
        assert!(xid_precedes(0xFFFF_FFFE, 3));
        assert!(xid_precedes(0xFFFF_FFF0, 0x10));
        assert!(!xid_precedes(3, 0xFFFF_FFFE));
        // exactly half the space away flips direction
        assert!(xid_precedes(3, 3 + 0x7FFF_FFFF));
        assert!(!xid_precedes(3 + 0x7FFF_FFFF, 3));
    }

    #[test]
    fn reserved_ids_sort_first() {
        for special in [INVALID_XID, BOOTSTRAP_XID, FROZEN_XID] {
            assert!(xid_precedes(special, FIRST_NORMAL_XID));
            assert!(xid_precedes(special, 0xFFFF_FFFF));
            assert!(!xid_precedes(0xFFFF_FFFF, special));
        }
        assert!(xid_precedes(BOOTSTRAP_XID, FROZEN_XID));
        assert!(xid_precedes_or_equals(FROZEN_XID, FROZEN_XID));
    }

    #[test]
    fn advance_skips_reserved() {
        assert_eq!(xid_advance(3), 4);
        assert_eq!(xid_advance(MAX_XID), FIRST_NORMAL_XID);
        let f = FullTransactionId::from_epoch_and_xid(0, MAX_XID).next_normal();
        assert_eq!(f.epoch(), 1);
        assert_eq!(f.xid(), FIRST_NORMAL_XID);
        assert_eq!(f.to_string(), "1:3");
    }

    #[test]
    fn full_xid_relative_to_reference() {
        let r = XidReference::new(FullTransactionId::from_epoch_and_xid(2, 100));
        assert_eq!(r.full_xid_from_xid(50), FullTransactionId::from_epoch_and_xid(2, 50));
        assert_eq!(r.full_xid_from_xid(150), FullTransactionId::from_epoch_and_xid(2, 150));
        // previous epoch
        assert_eq!(
            r.full_xid_from_xid(0xFFFF_FF00),
            FullTransactionId::from_epoch_and_xid(1, 0xFFFF_FF00)
        );

        // epoch 0: an xid "behind" the start of time clamps
        let r0 = XidReference::new(FullTransactionId::from_epoch_and_xid(0, 10));
        assert_eq!(r0.full_xid_from_xid(0xFFFF_FFFE), FullTransactionId::FIRST_NORMAL);
        assert_eq!(r0.full_xid_from_xid(5).0, 5);
    }
}
