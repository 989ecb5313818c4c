use anyhow::Result;
use std::path::Path;

use QuiverCTS::config::CtsConfig;
use QuiverCTS::consts::CTS_DIR;
use QuiverCTS::control::{read_control, ControlData};
use QuiverCTS::page::PageLayout;
use QuiverCTS::slru::SegmentStore;

/// Layout from (in order) the control file, --page-size, the environment.
pub fn layout_for(root: &Path, page_size: Option<usize>) -> Result<(PageLayout, Option<ControlData>)> {
    let control = read_control(root)?;
    let ps = match (&control, page_size) {
        (Some(c), _) => c.page_size as usize,
        (None, Some(ps)) => ps,
        (None, None) => CtsConfig::from_env().page_size,
    };
    Ok((PageLayout::new(ps)?, control))
}

pub fn open_store(root: &Path, layout: PageLayout) -> Result<SegmentStore> {
    let cfg = CtsConfig::from_env();
    SegmentStore::open(&root.join(CTS_DIR), layout, cfg.fsync_mode)
}

pub fn now_micros() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}
