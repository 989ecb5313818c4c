#![allow(non_snake_case)]

// Базовые модули
pub mod consts;
pub mod config;
pub mod error;
pub mod lock;
pub mod metrics;
pub mod control;

// Модульная раскладка (папки с mod.rs)
pub mod xid;   // src/xid/{mod,alloc}.rs
pub mod page;  // src/page/{mod,entry}.rs
pub mod slru;  // src/slru/{mod,segment,buffer,core}.rs
pub mod wal;   // src/wal/{mod,record,encode,reader,writer,replay}.rs
pub mod cts;   // src/cts/{mod,lifecycle,set_get,redo,boot}.rs

// SQL-level wrappers
pub mod sql;

// Удобные реэкспорты
pub use config::{CtsConfig, FsyncMode};
pub use cts::{boot, CommitTs, CtsShared, CtsStatus};
pub use error::CtsError;
pub use page::{CommitTsEntry, PageLayout, RepOriginId, TimestampTz};
pub use wal::{CtsRecord, MemWal, WalFile, WalSink};
pub use xid::{FullTransactionId, TransactionId, XidAllocator};
