//! Simple LRU page cache over segment files (SLRU).
//!
//! - segment.rs — файлы сегментов: чтение/запись страниц, fsync-очередь, unlink.
//! - buffer.rs  — пул слотов и выбор жертвы.
//! - core.rs    — Slru: единый RwLock над пулом (SlruLock), guard-API для
//!   зануления/чтения/записи страниц и усечения.

pub mod buffer;
pub mod core;
pub mod segment;

pub use self::buffer::SlotStatus;
pub use self::core::{Slru, SlruGuard};
pub use self::segment::SegmentStore;
