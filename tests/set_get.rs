use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use QuiverCTS::sql::{commit_timestamp, commit_timestamp_origin, latest_committed};
use QuiverCTS::xid::{FIRST_NORMAL_XID, FROZEN_XID, INVALID_XID};
use QuiverCTS::{CommitTs, CommitTsEntry, CtsConfig, CtsError, FullTransactionId, MemWal, XidAllocator};

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("qcts-{}-{}-{}", prefix, pid, t))
}

fn open_mem(prefix: &str, cfg: CtsConfig) -> Result<(CommitTs, Arc<MemWal>)> {
    let root = unique_root(prefix);
    let wal = Arc::new(MemWal::new());
    let xids = Arc::new(XidAllocator::new(FullTransactionId::FIRST_NORMAL, FIRST_NORMAL_XID));
    let cts = CommitTs::shmem_init(&root, cfg, wal.clone(), xids)?;
    cts.bootstrap()?;
    cts.complete_init();
    Ok((cts, wal))
}

fn tracking() -> CtsConfig {
    CtsConfig::default().with_tracking(true)
}

#[test]
fn single_set_get() -> Result<()> {
    let (cts, _wal) = open_mem("single", tracking())?;
    let ts = 1_700_000_000_000_000i64;

    cts.tree_set_commit_ts(100, &[], ts, 7, true);

    assert_eq!(cts.get_commit_ts(100)?, Some(CommitTsEntry::new(ts, 7)));
    // в диапазоне, но не записан
    assert_eq!(cts.get_commit_ts(99)?, None);
    // за newest
    assert_eq!(cts.get_commit_ts(101)?, None);
    Ok(())
}

#[test]
fn subxids_across_page_boundary() -> Result<()> {
    let (cts, wal) = open_mem("subxid-page", tracking())?;
    let epp = cts.layout().entries_per_page();
    assert_eq!(epp, 819);
    let t = 42_000i64;

    cts.tree_set_commit_ts(818, &[819, 820], t, 0, true);

    assert_eq!(cts.layout().page_of(818), 0);
    assert_eq!(cts.layout().page_of(819), 1);
    for x in [818u32, 819, 820] {
        assert_eq!(cts.get_commit_ts(x)?, Some(CommitTsEntry::new(t, 0)), "xid {}", x);
    }
    // одно дерево = одна WAL запись
    let sets = wal
        .records()
        .into_iter()
        .filter(|(_, r)| r.kind_name() == "SETTS")
        .count();
    assert_eq!(sets, 1);
    Ok(())
}

#[test]
fn subxids_span_segments_and_last_on_new_page() -> Result<()> {
    // 1 KiB страницы: 102 записи на страницу, 3264 на сегмент
    let (cts, _wal) = open_mem("subxid-seg", tracking().with_page_size(1024))?;
    let layout = *cts.layout();
    let per_seg = layout.entries_per_page() * layout.pages_per_segment();

    let top = per_seg - 5;
    let mut subs: Vec<u32> = (top + 1..top + 10).collect();
    // последний subxid один на своей странице
    subs.push(per_seg + 3 * layout.entries_per_page());
    let t = 9_999i64;

    cts.tree_set_commit_ts(top, &subs, t, 3, true);

    assert_ne!(layout.segment_of(layout.page_of(top)), layout.segment_of(layout.page_of(subs[8])));
    for &x in std::iter::once(&top).chain(subs.iter()) {
        assert_eq!(cts.get_commit_ts(x)?, Some(CommitTsEntry::new(t, 3)), "xid {}", x);
    }
    // между subxid'ами ничего не записано
    assert_eq!(cts.get_commit_ts(top + 11)?, None);

    // после checkpoint — с диска, через вытеснение буферов
    cts.checkpoint();
    cts.slru().lock().invalidate_all();
    for &x in std::iter::once(&top).chain(subs.iter()) {
        assert_eq!(cts.get_commit_ts(x)?, Some(CommitTsEntry::new(t, 3)));
    }
    Ok(())
}

#[test]
fn random_sets_round_trip() -> Result<()> {
    // маленький пул, чтобы были вытеснения грязных страниц
    let (cts, wal) = open_mem("random", tracking().with_page_size(1024).with_buffers(Some(4)))?;
    let mut rng = oorandom::Rand64::new(0xC0FFEE);

    let mut expect = Vec::new();
    for _ in 0..2_000 {
        let xid = cts.assign_xid();
        // примерно каждая третья транзакция без commit timestamp (abort)
        if rng.rand_range(0..3) == 0 {
            continue;
        }
        let ts = rng.rand_range(1..i64::MAX as u64) as i64;
        let origin = rng.rand_range(0..u16::MAX as u64) as u16;
        cts.tree_set_commit_ts(xid, &[], ts, origin, true);
        expect.push((xid, CommitTsEntry::new(ts, origin)));
    }

    for (xid, e) in &expect {
        assert_eq!(cts.get_commit_ts(*xid)?, Some(*e), "xid {}", xid);
    }
    // вытеснение грязной страницы требует сброса WAL до её LSN
    assert!(wal.flushed_lsn() > 0);
    Ok(())
}

#[test]
fn latest_commit_cache_tracks_last_set() -> Result<()> {
    let (cts, _wal) = open_mem("latest", tracking())?;

    let (x0, e0) = cts.get_latest_commit_ts()?;
    assert_eq!(x0, INVALID_XID);
    assert!(!e0.is_recorded());

    cts.tree_set_commit_ts(10, &[11, 12], 500, 2, true);
    assert_eq!(cts.get_latest_commit_ts()?, (10, CommitTsEntry::new(500, 2)));

    cts.tree_set_commit_ts(20, &[], 700, 1, true);
    assert_eq!(cts.get_latest_commit_ts()?, (20, CommitTsEntry::new(700, 1)));
    // кэш отвечает и на обычный get
    assert_eq!(cts.get_commit_ts(20)?, Some(CommitTsEntry::new(700, 1)));
    assert_eq!(cts.get_commit_ts(11)?, Some(CommitTsEntry::new(500, 2)));
    Ok(())
}

#[test]
fn special_xids() -> Result<()> {
    let (cts, _wal) = open_mem("special", tracking())?;
    cts.tree_set_commit_ts(5, &[], 1, 1, true);

    match cts.get_commit_ts_data(INVALID_XID) {
        Err(CtsError::InvalidXid(0)) => {}
        other => panic!("expected InvalidXid, got {:?}", other),
    }
    let (e, found) = cts.get_commit_ts_data(FROZEN_XID)?;
    assert!(!found);
    assert_eq!(e, CommitTsEntry::EMPTY);
    Ok(())
}

#[test]
fn sql_surface() -> Result<()> {
    let (cts, _wal) = open_mem("sql", tracking())?;
    cts.tree_set_commit_ts(30, &[], 1234, 9, true);

    assert_eq!(commit_timestamp(&cts, 30)?, Some(1234));
    assert_eq!(commit_timestamp(&cts, 29)?, None);

    let row = commit_timestamp_origin(&cts, 30)?;
    assert_eq!((row.timestamp, row.origin), (Some(1234), Some(9)));
    let row = commit_timestamp_origin(&cts, 29)?;
    assert_eq!((row.timestamp, row.origin), (None, None));

    let last = latest_committed(&cts)?;
    assert_eq!((last.xid, last.timestamp, last.origin), (Some(30), Some(1234), Some(9)));

    let js = serde_json::to_value(last)?;
    assert_eq!(js["xid"], 30);

    // выключено: commit_timestamp -> NULL, остальные -> ошибка
    cts.deactivate();
    assert_eq!(commit_timestamp(&cts, 30)?, None);
    assert!(matches!(
        commit_timestamp_origin(&cts, 30),
        Err(CtsError::Disabled { in_recovery: false })
    ));
    let err = latest_committed(&cts).unwrap_err();
    assert!(err.to_string().contains("tracking_enabled"), "{}", err);
    Ok(())
}
