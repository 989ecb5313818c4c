use anyhow::Result;
use std::path::PathBuf;

use QuiverCTS::config::CtsConfig;
use QuiverCTS::control::read_control;
use QuiverCTS::metrics;

use crate::cmd_status;

pub fn exec(path: PathBuf, tracking: Option<bool>, json: bool) -> Result<()> {
    let mut cfg = CtsConfig::from_env();
    if let Some(c) = read_control(&path)? {
        cfg = cfg.with_page_size(c.page_size as usize);
    }
    if let Some(on) = tracking {
        cfg = cfg.with_tracking(on);
    }

    {
        let cts = QuiverCTS::boot(&path, cfg)?;
        let m = metrics::snapshot();
        if !json {
            println!(
                "recovered: tracking={} next_xid={} redo records applied={}",
                cts.is_enabled(),
                cts.xids().read_next_full_xid(),
                m.redo_records_applied
            );
        }
        cts.shutdown();
    }

    cmd_status::exec_locked(&path, json)
}
