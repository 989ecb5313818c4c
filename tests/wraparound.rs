use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use QuiverCTS::xid::{FIRST_NORMAL_XID, MAX_XID};
use QuiverCTS::{CommitTs, CommitTsEntry, CtsConfig, FullTransactionId, MemWal, XidAllocator};

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("qcts-{}-{}-{}", prefix, pid, t))
}

/// Свежий store, следующий xid = `next` (эпоха 0).
fn open_at(prefix: &str, next: u32, cfg: CtsConfig) -> Result<CommitTs> {
    let root = unique_root(prefix);
    let xids = Arc::new(XidAllocator::new(
        FullTransactionId::from_epoch_and_xid(0, next),
        FIRST_NORMAL_XID,
    ));
    let cts = CommitTs::shmem_init(&root, cfg, Arc::new(MemWal::new()), xids)?;
    cts.bootstrap()?;
    cts.complete_init();
    Ok(cts)
}

#[test]
fn set_get_across_wrap() -> Result<()> {
    let cts = open_at("wrap", MAX_XID - 1, CtsConfig::default().with_tracking(true))?;
    let layout = *cts.layout();

    let a = cts.assign_xid();
    let b = cts.assign_xid();
    let c = cts.assign_xid();
    assert_eq!((a, b, c), (MAX_XID - 1, MAX_XID, FIRST_NORMAL_XID));
    assert_eq!(cts.xids().read_next_full_xid(), FullTransactionId::from_epoch_and_xid(1, 4));

    for (i, x) in [a, b, c].into_iter().enumerate() {
        cts.tree_set_commit_ts(x, &[], 100 + i as i64, i as u16, true);
    }
    for (i, x) in [a, b, c].into_iter().enumerate() {
        assert_eq!(cts.get_commit_ts(x)?, Some(CommitTsEntry::new(100 + i as i64, i as u16)));
    }

    assert!(layout.page_precedes(layout.page_of(a), layout.page_of(c)));
    assert!(!layout.page_precedes(layout.page_of(c), layout.page_of(a)));
    // последний сегмент короче остальных
    assert_eq!(layout.page_of(MAX_XID), layout.max_page());

    // full xid по обе стороны границы
    cts.update_cached_xid_range();
    assert_eq!(cts.full_xid_from_xid(a), FullTransactionId::from_epoch_and_xid(0, a));
    assert_eq!(cts.full_xid_from_xid(c), FullTransactionId::from_epoch_and_xid(1, c));
    Ok(())
}

#[test]
fn subxids_straddling_wrap() -> Result<()> {
    let cts = open_at("wrap-subxid", MAX_XID - 2, CtsConfig::default().with_tracking(true))?;
    let top = cts.assign_xid();
    let subs: Vec<u32> = (0..4).map(|_| cts.assign_xid()).collect();
    assert_eq!(subs, vec![MAX_XID - 1, MAX_XID, 3, 4]);

    cts.tree_set_commit_ts(top, &subs, 555, 1, true);
    for &x in std::iter::once(&top).chain(subs.iter()) {
        assert_eq!(cts.get_commit_ts(x)?, Some(CommitTsEntry::new(555, 1)), "xid {}", x);
    }
    assert_eq!(cts.shared_state().newest_cts_xid, 4);
    Ok(())
}

#[test]
fn truncate_across_wrap_removes_old_segment() -> Result<()> {
    let cts = open_at("wrap-truncate", MAX_XID - 1, CtsConfig::default().with_tracking(true))?;
    let layout = *cts.layout();
    let store = cts.slru().store();

    let a = cts.assign_xid();
    let _b = cts.assign_xid();
    let c = cts.assign_xid();
    cts.tree_set_commit_ts(a, &[], 1, 0, true);
    cts.tree_set_commit_ts(c, &[], 2, 0, true);
    cts.checkpoint();

    let old_seg = layout.segment_of(layout.page_of(a));
    assert_eq!(store.segments()?, vec![0, old_seg]);
    assert_eq!(store.segment_name(old_seg), "28028");

    cts.advance_oldest(c);
    cts.truncate(c);

    assert_eq!(store.segments()?, vec![0]);
    assert_eq!(cts.get_commit_ts(a)?, None);
    assert_eq!(cts.get_commit_ts(c)?, Some(CommitTsEntry::new(2, 0)));
    Ok(())
}
