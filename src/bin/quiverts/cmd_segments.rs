use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

use QuiverCTS::lock::try_acquire_shared_lock;

use crate::util::{layout_for, open_store};

#[derive(Serialize)]
struct SegmentRow {
    segment: u32,
    name: String,
    first_page: u32,
    last_page: u32,
    first_xid: u32,
    bytes: u64,
}

pub fn exec(path: PathBuf, page_size: Option<usize>, json: bool) -> Result<()> {
    let _lock = try_acquire_shared_lock(&path)?;
    let (layout, _) = layout_for(&path, page_size)?;
    let store = open_store(&path, layout)?;

    let mut rows = Vec::new();
    for (seg, p) in store.segment_files()? {
        let first_page = layout.segment_first_page(seg);
        let bytes = std::fs::metadata(&p).map(|m| m.len()).unwrap_or(0);
        rows.push(SegmentRow {
            segment: seg,
            name: store.segment_name(seg),
            first_page,
            last_page: layout.segment_last_page(seg),
            first_xid: first_page.wrapping_mul(layout.entries_per_page()),
            bytes,
        });
    }
    rows.sort_by_key(|r| r.segment);

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("Segments at {} (page_size={}):", store.dir().display(), layout.page_size());
    if rows.is_empty() {
        println!("  (none)");
    }
    for r in &rows {
        println!(
            "  {}  pages {}..={}  first_xid={}  bytes={}",
            r.name, r.first_page, r.last_page, r.first_xid, r.bytes
        );
    }
    Ok(())
}
