use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use chrono::Duration;
use uuid::Uuid;

use tablesnap::config::{SnapshotConfig, SnapshotConfigBuilder};
use tablesnap::consts::EPHEMERAL_MARKER_FILE;
use tablesnap::manifest::manifest_path;
use tablesnap::snapshot::{clear_expired, clear_snapshot, SnapshotLoader};
use tablesnap::util::now_millis;
use tablesnap::Table;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("tsnaptest-loader-{prefix}-{pid}-{t}-{id}"))
}

fn write_sstable(dir: &Path, gen: u64) -> Result<()> {
    fs::create_dir_all(dir)?;
    fs::write(dir.join(format!("me-{gen}-big-Data.db")), b"data")?;
    fs::write(dir.join(format!("me-{gen}-big-Index.db")), b"i")?;
    Ok(())
}

#[test]
fn discovers_one_snapshot_across_data_roots() -> Result<()> {
    let base = unique_root("multi");
    let roots = vec![base.join("d0"), base.join("d1")];
    let id = Uuid::new_v4();
    let dir_name = format!("tbl-{}", id.simple());
    write_sstable(&roots[0].join("ks").join(&dir_name), 1)?;
    write_sstable(&roots[1].join("ks").join(&dir_name), 2)?;

    let table = Table::open(&roots, "ks", "tbl", id)?;
    assert_eq!(table.tracker().len(), 2);
    let cfg = SnapshotConfigBuilder::from_default()
        .data_dir(&roots[0])
        .data_dir(&roots[1])
        .build();
    let taken = table.take_snapshot("nightly", Some(Duration::hours(1)), false, &cfg)?;
    assert_eq!(taken.directories().len(), 2);

    let loader = SnapshotLoader::new(cfg);
    let all = loader.load_all();
    assert_eq!(all.len(), 1);
    let snap = &all[0];
    assert_eq!(snap, &taken);
    assert_eq!(snap.directories(), taken.directories());
    assert_eq!(snap.created_at(), taken.created_at());
    assert_eq!(snap.expires_at(), taken.expires_at());
    assert!(snap.is_expiring());
    assert_eq!(snap.keyspace_table(), "ks.tbl");

    assert_eq!(loader.load_for("ks", "tbl").len(), 1);
    assert!(loader.load_for("ks", "other").is_empty());

    fs::remove_dir_all(&base)?;
    Ok(())
}

#[test]
fn clear_expired_removes_only_expired_snapshots() -> Result<()> {
    let root = unique_root("expire");
    let id = Uuid::new_v4();
    write_sstable(&root.join("ks").join(format!("tbl-{}", id.simple())), 1)?;
    let table = Table::open(&[root.clone()], "ks", "tbl", id)?;
    let cfg = SnapshotConfig::default().with_data_dirs([root.clone()]);

    let short = table.take_snapshot("short", Some(Duration::minutes(5)), false, &cfg)?;
    let keep = table.take_snapshot("keep", None, false, &cfg)?;

    let snapshots = SnapshotLoader::new(cfg.clone()).load_all();
    assert_eq!(snapshots.len(), 2);

    // nothing has expired yet
    assert!(clear_expired(&snapshots, now_millis())?.is_empty());

    let later = now_millis() + Duration::minutes(10);
    let cleared = clear_expired(&snapshots, later)?;
    assert_eq!(cleared, vec![short.id()]);
    assert!(!short.exists());
    assert!(keep.exists());

    let left = SnapshotLoader::new(cfg).load_all();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].tag(), "keep");

    clear_snapshot(&left[0])?;
    assert!(!keep.exists());
    // live data is untouched
    assert_eq!(table.live_files().len(), 2);

    fs::remove_dir_all(&root)?;
    Ok(())
}

#[test]
fn loader_honors_legacy_layout() -> Result<()> {
    let root = unique_root("legacy");
    let id = Uuid::new_v4();
    let snap_dir = root
        .join("ks")
        .join(format!("tbl-{}", id.simple()))
        .join("snapshots")
        .join("old");
    write_sstable(&snap_dir, 9)?;
    fs::write(snap_dir.join(EPHEMERAL_MARKER_FILE), b"")?;
    // not a table directory: ignored
    fs::create_dir_all(root.join("ks").join("junk").join("snapshots").join("x"))?;

    let off = SnapshotConfig::default()
        .with_data_dirs([root.clone()])
        .with_manifest_enrich(false);
    let snaps = SnapshotLoader::new(off).load_all();
    assert_eq!(snaps.len(), 1);
    assert!(snaps[0].is_ephemeral());
    assert!(!snaps[0].is_expiring());
    assert!(!snaps[0].is_expired(now_millis()));
    assert!(!snaps[0].has_manifest());
    assert!(snaps[0].created_at().is_some(), "falls back to directory mtime");

    let on = SnapshotConfig::default()
        .with_data_dirs([root.clone()])
        .with_manifest_enrich(true);
    let snaps = SnapshotLoader::new(on).load_all();
    assert_eq!(snaps.len(), 1);
    assert!(snaps[0].has_manifest());
    assert!(manifest_path(&snap_dir).exists());
    assert!(snaps[0].manifests_size() > 0);

    fs::remove_dir_all(&root)?;
    Ok(())
}

#[test]
fn case_insensitive_tags_group_across_roots() -> Result<()> {
    let base = unique_root("fold");
    let id = Uuid::new_v4();
    let dir_name = format!("tbl-{}", id.simple());
    let upper = base.join("d0").join("ks").join(&dir_name).join("snapshots").join("Nightly");
    let lower = base.join("d1").join("ks").join(&dir_name).join("snapshots").join("nightly");
    write_sstable(&upper, 1)?;
    write_sstable(&lower, 2)?;

    let folded = SnapshotConfigBuilder::from_default()
        .data_dir(base.join("d0"))
        .data_dir(base.join("d1"))
        .case_insensitive_tags(true)
        .build();
    let snaps = SnapshotLoader::new(folded.clone()).load_all();
    assert_eq!(snaps.len(), 1);
    assert_eq!(snaps[0].directories().len(), 2);

    let exact = folded.with_case_insensitive_tags(false);
    let snaps = SnapshotLoader::new(exact).load_all();
    assert_eq!(snaps.len(), 2);
    assert_ne!(snaps[0], snaps[1]);

    fs::remove_dir_all(&base)?;
    Ok(())
}
