use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

use QuiverCTS::lock::try_acquire_shared_lock;
use QuiverCTS::page::entry_read;
use QuiverCTS::xid::{xid_is_normal, xid_precedes};

use crate::util::{layout_for, open_store};

#[derive(Serialize)]
struct InspectOut {
    xid: u32,
    page: u32,
    entry: u32,
    segment: String,
    page_on_disk: bool,
    timestamp: i64,
    origin: u16,
    recorded: bool,
    /// Inside [oldest_cts_xid, newest_cts_xid] of the last checkpoint.
    in_checkpointed_range: Option<bool>,
}

/// Читает слот прямо с диска, минуя буферы и проверку диапазона.
/// Записи после последнего checkpoint здесь не видны, пока не сделан recover.
pub fn exec(path: PathBuf, xid: u32, page_size: Option<usize>, json: bool) -> Result<()> {
    let _lock = try_acquire_shared_lock(&path)?;
    let (layout, control) = layout_for(&path, page_size)?;
    let store = open_store(&path, layout)?;

    let page = layout.page_of(xid);
    let entry = layout.entry_of(xid);
    let on_disk = store.physical_page_exists(page)?;
    let mut buf = vec![0u8; layout.page_size()];
    if on_disk {
        store.read_page(page, &mut buf)?;
    }
    let e = entry_read(&buf, entry);

    let in_range = control.map(|c| {
        xid_is_normal(c.oldest_cts_xid)
            && !xid_precedes(xid, c.oldest_cts_xid)
            && !xid_precedes(c.newest_cts_xid, xid)
    });

    let out = InspectOut {
        xid,
        page,
        entry,
        segment: store.segment_name(layout.segment_of(page)),
        page_on_disk: on_disk,
        timestamp: e.timestamp,
        origin: e.origin,
        recorded: e.is_recorded(),
        in_checkpointed_range: in_range,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("xid {}: page={} entry={} segment={}", xid, page, entry, out.segment);
    if !on_disk {
        println!("  page not on disk");
    }
    if out.recorded {
        println!("  timestamp={} origin={}", out.timestamp, out.origin);
    } else {
        println!("  no commit timestamp recorded");
    }
    if let Some(r) = in_range {
        println!("  in checkpointed range: {}", r);
    }
    Ok(())
}
