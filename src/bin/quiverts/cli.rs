use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI для хранилища commit timestamps (QuiverCTS)
#[derive(Parser, Debug)]
#[command(name = "quiverts", version, about = "QuiverCTS commit-timestamp store CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// List segment files with their page ranges (offline)
    Segments {
        #[arg(long)]
        path: PathBuf,
        /// Page size if there is no control file yet
        #[arg(long)]
        page_size: Option<usize>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Read the on-disk entry for one xid (offline, bypasses the valid range)
    Inspect {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        xid: u32,
        #[arg(long)]
        page_size: Option<usize>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Control file, WAL and segment summary (offline)
    Status {
        #[arg(long)]
        path: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Replay the WAL and write an end-of-recovery checkpoint
    Recover {
        #[arg(long)]
        path: PathBuf,
        /// Tracking state after recovery; default: CTS_TRACKING_ENABLED
        #[arg(long)]
        tracking: Option<bool>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Allocate a transaction (+ subtransactions) and record its commit timestamp
    Commit {
        #[arg(long)]
        path: PathBuf,
        /// Timestamp (microseconds); default: now
        #[arg(long)]
        ts: Option<i64>,
        #[arg(long, default_value_t = 0)]
        origin: u16,
        #[arg(long, default_value_t = 0)]
        subxacts: u32,
    },
    /// Drop segments before the one holding --oldest-xid and raise the valid range
    Truncate {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        oldest_xid: u32,
    },
}
