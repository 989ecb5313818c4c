//! Centralized configuration for the commit-timestamp store.
//!
//! - CtsConfig::from_env() reads CTS_* variables; anything unset keeps its default.
//! - with_* setters override single fields (tests and the CLI use these).
//! - The buffer pool size follows the shared_buffers policy unless `buffers`
//!   pins it explicitly.

use std::fmt;

use anyhow::Result;
use serde::Serialize;

use crate::consts::{
    CTS_BUFFERS_DIVISOR, DEFAULT_PAGE_SIZE, DEFAULT_SHARED_BUFFERS, MAX_CTS_BUFFERS,
    MIN_CTS_BUFFERS,
};
use crate::page::validate_page_size;

/// When dirty segment writes reach stable storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FsyncMode {
    /// Segments are queued and fsync'ed together at checkpoint.
    Deferred,
    /// Every page write-back is followed by an fsync of its segment.
    Immediate,
}

impl FsyncMode {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deferred" | "checkpoint" => Some(FsyncMode::Deferred),
            "immediate" | "always" => Some(FsyncMode::Immediate),
            _ => None,
        }
    }
}

impl fmt::Display for FsyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsyncMode::Deferred => write!(f, "deferred"),
            FsyncMode::Immediate => write!(f, "immediate"),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CtsConfig {
    /// Whether commit timestamps are tracked.
    /// Env: CTS_TRACKING_ENABLED (default false; "1|true|on|yes" => true)
    pub tracking_enabled: bool,

    /// Page size in bytes; power of two in [1 KiB .. 64 KiB].
    /// Env: CTS_PAGE_SIZE (default 8192)
    pub page_size: usize,

    /// Engine-wide buffer count the CTS pool is derived from.
    /// Env: CTS_SHARED_BUFFERS (default 16384)
    pub shared_buffers: usize,

    /// Explicit pool size override (None => min(16, max(4, shared_buffers/1024))).
    /// Env: CTS_BUFFERS
    pub buffers: Option<usize>,

    /// Segment fsync policy.
    /// Env: CTS_FSYNC_MODE = deferred|immediate (default deferred)
    pub fsync_mode: FsyncMode,

    /// fsync the WAL file on flush (off only for throwaway data).
    /// Env: CTS_WAL_FSYNC (default true)
    pub wal_fsync: bool,
}

impl Default for CtsConfig {
    fn default() -> Self {
        Self {
            tracking_enabled: false,
            page_size: DEFAULT_PAGE_SIZE,
            shared_buffers: DEFAULT_SHARED_BUFFERS,
            buffers: None,
            fsync_mode: FsyncMode::Deferred,
            wal_fsync: true,
        }
    }
}

fn env_flag(v: &str) -> bool {
    let s = v.trim().to_ascii_lowercase();
    s == "1" || s == "true" || s == "yes" || s == "on"
}

impl CtsConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("CTS_TRACKING_ENABLED") {
            cfg.tracking_enabled = env_flag(&v);
        }

        if let Ok(v) = std::env::var("CTS_PAGE_SIZE") {
            if let Ok(n) = v.trim().parse::<usize>() {
                cfg.page_size = n;
            }
        }

        if let Ok(v) = std::env::var("CTS_SHARED_BUFFERS") {
            if let Ok(n) = v.trim().parse::<usize>() {
                cfg.shared_buffers = n;
            }
        }

        if let Ok(v) = std::env::var("CTS_BUFFERS") {
            if let Ok(n) = v.trim().parse::<usize>() {
                cfg.buffers = Some(n);
            }
        }

        if let Ok(v) = std::env::var("CTS_FSYNC_MODE") {
            if let Some(m) = FsyncMode::parse(&v) {
                cfg.fsync_mode = m;
            }
        }

        if let Ok(v) = std::env::var("CTS_WAL_FSYNC") {
            cfg.wal_fsync = env_flag(&v);
        }

        cfg
    }

    pub fn with_tracking(mut self, on: bool) -> Self {
        self.tracking_enabled = on;
        self
    }

    pub fn with_page_size(mut self, ps: usize) -> Self {
        self.page_size = ps;
        self
    }

    pub fn with_shared_buffers(mut self, n: usize) -> Self {
        self.shared_buffers = n;
        self
    }

    pub fn with_buffers(mut self, n: Option<usize>) -> Self {
        self.buffers = n;
        self
    }

    pub fn with_fsync_mode(mut self, m: FsyncMode) -> Self {
        self.fsync_mode = m;
        self
    }

    pub fn with_wal_fsync(mut self, on: bool) -> Self {
        self.wal_fsync = on;
        self
    }

    /// Number of SLRU slots.
    pub fn pool_size(&self) -> usize {
        match self.buffers {
            Some(n) => n.max(MIN_CTS_BUFFERS),
            None => (self.shared_buffers / CTS_BUFFERS_DIVISOR)
                .clamp(MIN_CTS_BUFFERS, MAX_CTS_BUFFERS),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_page_size(self.page_size)
    }
}

impl fmt::Display for CtsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CtsConfig {{ \
             tracking_enabled: {}, \
             page_size: {}, \
             shared_buffers: {}, \
             buffers: {}, \
             fsync_mode: {}, \
             wal_fsync: {} \
             }}",
            self.tracking_enabled,
            self.page_size,
            self.shared_buffers,
            self.buffers
                .map(|v| v.to_string())
                .unwrap_or_else(|| format!("default({})", self.pool_size())),
            self.fsync_mode,
            self.wal_fsync,
        )
    }
}
