use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

use QuiverCTS::control::ControlData;
use QuiverCTS::lock::try_acquire_shared_lock;
use QuiverCTS::wal::{wal_path, WAL_HDR_SIZE};

use crate::util::{layout_for, open_store};

#[derive(Serialize)]
struct StatusOut {
    path: String,
    control: Option<ControlData>,
    wal_bytes: u64,
    wal_pending_bytes: u64,
    segments: Vec<String>,
}

pub fn exec(path: PathBuf, json: bool) -> Result<()> {
    let _lock = try_acquire_shared_lock(&path)?;
    exec_locked(&path, json)
}

/// Без захвата LOCK: вызывается и из recover, где lock уже отпущен.
pub fn exec_locked(path: &Path, json: bool) -> Result<()> {
    let (layout, control) = layout_for(path, None)?;
    let store = open_store(path, layout)?;

    let segments = store
        .segments()?
        .into_iter()
        .map(|s| store.segment_name(s))
        .collect::<Vec<_>>();
    let wal_bytes = std::fs::metadata(wal_path(path)).map(|m| m.len()).unwrap_or(0);

    let out = StatusOut {
        path: path.display().to_string(),
        control,
        wal_bytes,
        wal_pending_bytes: wal_bytes.saturating_sub(WAL_HDR_SIZE as u64),
        segments,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("QuiverCTS status at {}", out.path);
    match &out.control {
        None => println!("  control: (missing, store never booted)"),
        Some(c) => {
            println!("  version:          {}", c.version);
            println!("  page_size:        {}", c.page_size);
            println!("  next_fxid:        {}", c.next_fxid);
            println!("  oldest_xid:       {}", c.oldest_xid);
            println!("  valid range:      [{}, {}]", c.oldest_cts_xid, c.newest_cts_xid);
            println!("  redo_lsn:         {}", c.redo_lsn);
            println!("  tracking_active:  {}", c.tracking_active);
        }
    }
    println!("  wal: {} bytes ({} after header)", out.wal_bytes, out.wal_pending_bytes);
    println!("  segments: {}", out.segments.len());
    for s in &out.segments {
        println!("    {}", s);
    }
    Ok(())
}
