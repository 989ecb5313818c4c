use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use QuiverCTS::xid::FIRST_NORMAL_XID;
use QuiverCTS::{CommitTs, CommitTsEntry, CtsConfig, FullTransactionId, MemWal, XidAllocator};

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("qcts-{}-{}-{}", prefix, pid, t))
}

#[test]
fn concurrent_commits_and_lookups() -> Result<()> {
    let root = unique_root("concurrent");
    // 1 KiB страницы и 4 буфера: постоянные вытеснения
    let cfg = CtsConfig::default()
        .with_tracking(true)
        .with_page_size(1024)
        .with_buffers(Some(4));
    let xids = Arc::new(XidAllocator::new(FullTransactionId::FIRST_NORMAL, FIRST_NORMAL_XID));
    let cts = Arc::new(CommitTs::shmem_init(&root, cfg, Arc::new(MemWal::new()), xids)?);
    cts.bootstrap()?;
    cts.complete_init();

    let threads = 8u16;
    let per_thread = 500usize;
    let mut handles = Vec::new();
    for t in 0..threads {
        let cts = cts.clone();
        handles.push(thread::spawn(move || -> Result<Vec<u32>> {
            let mut rng = oorandom::Rand32::new(t as u64);
            let mut mine = Vec::with_capacity(per_thread);
            for _ in 0..per_thread {
                let xid = cts.assign_xid();
                cts.tree_set_commit_ts(xid, &[], xid as i64, t, true);
                mine.push(xid);
                // читаем свои же случайные прошлые коммиты
                let i = rng.rand_range(0..mine.len() as u32) as usize;
                let x = mine[i];
                assert_eq!(cts.get_commit_ts(x)?, Some(CommitTsEntry::new(x as i64, t)));
            }
            Ok(mine)
        }));
    }

    let mut all = Vec::new();
    for h in handles {
        let mine = h.join().expect("worker panicked")?;
        all.extend(mine);
    }
    all.sort_unstable();
    all.dedup();
    assert_eq!(all.len(), threads as usize * per_thread);

    cts.checkpoint();
    for &x in &all {
        let e = cts.get_commit_ts(x)?.expect("recorded");
        assert_eq!(e.timestamp, x as i64);
    }
    Ok(())
}

#[test]
fn readers_run_while_checkpointing() -> Result<()> {
    let root = unique_root("ckpt-readers");
    let cfg = CtsConfig::default().with_tracking(true).with_page_size(1024);
    let xids = Arc::new(XidAllocator::new(FullTransactionId::FIRST_NORMAL, FIRST_NORMAL_XID));
    let cts = Arc::new(CommitTs::shmem_init(&root, cfg, Arc::new(MemWal::new()), xids)?);
    cts.bootstrap()?;
    cts.complete_init();

    let mut fixed = Vec::new();
    for _ in 0..1_000 {
        let xid = cts.assign_xid();
        cts.tree_set_commit_ts(xid, &[], 7, 7, true);
        fixed.push(xid);
    }
    let fixed = Arc::new(fixed);

    let writer = {
        let cts = cts.clone();
        thread::spawn(move || {
            for i in 0..20 {
                for _ in 0..100 {
                    let xid = cts.assign_xid();
                    cts.tree_set_commit_ts(xid, &[], 1 + i, 0, true);
                }
                cts.checkpoint();
            }
        })
    };
    let reader = {
        let cts = cts.clone();
        let fixed = fixed.clone();
        thread::spawn(move || -> Result<()> {
            for round in 0..20 {
                for &x in fixed.iter().skip(round % 3).step_by(3) {
                    assert_eq!(cts.get_commit_ts(x)?, Some(CommitTsEntry::new(7, 7)));
                }
            }
            Ok(())
        })
    };

    writer.join().expect("writer panicked");
    reader.join().expect("reader panicked")?;
    Ok(())
}
