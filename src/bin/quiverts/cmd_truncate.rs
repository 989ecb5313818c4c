use anyhow::Result;
use std::path::PathBuf;

use QuiverCTS::config::CtsConfig;
use QuiverCTS::control::read_control;

pub fn exec(path: PathBuf, oldest_xid: u32) -> Result<()> {
    let mut cfg = CtsConfig::from_env();
    if let Some(c) = read_control(&path)? {
        cfg = cfg
            .with_page_size(c.page_size as usize)
            .with_tracking(c.tracking_active);
    }
    let cts = QuiverCTS::boot(&path, cfg)?;
    let before = cts.slru().store().segments()?.len();

    // сначала поднимаем нижнюю границу: читатели не должны видеть удалённые сегменты
    cts.advance_oldest(oldest_xid);
    cts.truncate(oldest_xid);
    cts.xids().set_oldest_xid(oldest_xid);
    cts.shutdown();

    let after = cts.slru().store().segments()?.len();
    let st = cts.shared_state();
    println!(
        "truncated: segments {} -> {}, valid range [{}, {}]",
        before, after, st.oldest_cts_xid, st.newest_cts_xid
    );
    Ok(())
}
