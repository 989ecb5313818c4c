//! Failed redo during crash recovery must stop the process, not report a
//! plain error and carry on.

#![cfg(unix)]

use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

use QuiverCTS::consts::CTS_DIR;
use QuiverCTS::{boot, CtsConfig, PageLayout};

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("qcts-{}-{}-{}", prefix, pid, t))
}

#[test]
fn unwritable_segment_during_replay_aborts_recover() -> Result<()> {
    let root = unique_root("redo-fatal");
    let cfg = CtsConfig::default()
        .with_tracking(true)
        .with_wal_fsync(false)
        .with_page_size(1024);
    let layout = PageLayout::new(1024)?;
    // захватываем второй сегмент, чтобы активация (страница 0) его не трогала
    let n = layout.entries_per_page() * layout.pages_per_segment() + 100;

    {
        let cts = boot(&root, cfg)?;
        for i in 0..n {
            let xid = cts.assign_xid();
            cts.tree_set_commit_ts(xid, &[], 1_000 + i as i64, 0, true);
        }
        // краш без checkpoint: ZeroPage второго сегмента остаётся в WAL
    }

    let seg1 = root
        .join(CTS_DIR)
        .join(format!("{:0w$X}", 1, w = layout.segment_name_width()));
    if seg1.exists() {
        fs::remove_file(&seg1)?;
    }
    // сегмент-каталог: открыть на запись нельзя, redo ZeroPage упадёт
    fs::create_dir(&seg1)?;

    let out = Command::new(env!("CARGO_BIN_EXE_quiverts"))
        .args(["recover", "--path"])
        .arg(&root)
        .args(["--tracking", "true"])
        .env("RUST_LOG", "error")
        .output()?;

    assert!(!out.status.success());
    // abort, а не обычный выход с кодом 1
    assert_eq!(out.status.code(), None, "status {:?}", out.status);
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("FATAL: commit_ts redo ZEROPAGE"), "{}", stderr);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}
