//! Error kinds surfaced to callers, plus the fatal path.
//!
//! Internally everything is `anyhow::Result`. Only conditions a caller can
//! act on get a typed variant; I/O and WAL failures on the durability path
//! are not recoverable and go through [`fatal`].

use log::error;
use thiserror::Error;

use crate::xid::TransactionId;

#[derive(Debug, Error)]
pub enum CtsError {
    /// Lookup of the Invalid transaction id.
    #[error("cannot retrieve commit timestamp for transaction {0}")]
    InvalidXid(TransactionId),

    /// Tracking is off. The message mirrors whether we are a standby
    /// replaying the primary's log.
    #[error("{}", disabled_message(.in_recovery))]
    Disabled { in_recovery: bool },

    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

fn disabled_message(in_recovery: &bool) -> &'static str {
    if *in_recovery {
        "could not get commit timestamp data: make sure tracking_enabled (CTS_TRACKING_ENABLED) is set on the primary server"
    } else {
        "could not get commit timestamp data: make sure tracking_enabled (CTS_TRACKING_ENABLED) is set"
    }
}

/// Log and abort. Used where continuing could break durability
/// (segment I/O, WAL append/flush, undecodable or failed redo).
#[cold]
pub fn fatal(what: &str, err: &anyhow::Error) -> ! {
    error!("FATAL: {}: {:#}", what, err);
    log::logger().flush();
    std::process::abort()
}

/// `result.or_fatal("context")` — unwrap or go through [`fatal`].
pub trait OrFatal<T> {
    fn or_fatal(self, what: &str) -> T;
}

impl<T> OrFatal<T> for anyhow::Result<T> {
    #[inline]
    fn or_fatal(self, what: &str) -> T {
        match self {
            Ok(v) => v,
            Err(e) => fatal(what, &e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_message_mentions_primary_in_recovery() {
        let e = CtsError::Disabled { in_recovery: true };
        assert!(e.to_string().contains("tracking_enabled"));
        assert!(e.to_string().contains("primary server"));
        let e = CtsError::Disabled { in_recovery: false };
        assert!(e.to_string().ends_with("tracking_enabled (CTS_TRACKING_ENABLED) is set"));
        assert!(!e.to_string().contains("track_commit_timestamp"));
        assert_eq!(
            CtsError::InvalidXid(0).to_string(),
            "cannot retrieve commit timestamp for transaction 0"
        );
    }
}
