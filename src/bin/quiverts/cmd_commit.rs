use anyhow::{anyhow, Result};
use std::path::PathBuf;

use QuiverCTS::config::CtsConfig;
use QuiverCTS::control::read_control;

use crate::util::now_micros;

/// Выдаёт xid (и subxids), пишет commit timestamp через WAL, затем checkpoint.
pub fn exec(path: PathBuf, ts: Option<i64>, origin: u16, subxacts: u32) -> Result<()> {
    let mut cfg = CtsConfig::from_env().with_tracking(true);
    if let Some(c) = read_control(&path)? {
        cfg = cfg.with_page_size(c.page_size as usize);
    }
    let cts = QuiverCTS::boot(&path, cfg)?;
    if !cts.is_enabled() {
        return Err(anyhow!("commit timestamp tracking did not come up"));
    }

    let xid = cts.assign_xid();
    let subxids: Vec<u32> = (0..subxacts).map(|_| cts.assign_xid()).collect();
    let ts = ts.unwrap_or_else(now_micros);
    cts.tree_set_commit_ts(xid, &subxids, ts, origin, true);
    cts.shutdown();

    println!("committed xid={} ts={} origin={}", xid, ts, origin);
    if !subxids.is_empty() {
        println!("  subxids: {:?}", subxids);
    }
    Ok(())
}
