use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use tablesnap::config::SnapshotConfig;
use tablesnap::consts::{EPHEMERAL_MARKER_FILE, MANIFEST_FILE};
use tablesnap::manifest::{manifest_path, SnapshotManifest};
use tablesnap::snapshot::TableSnapshotBuilder;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("tsnaptest-manifest-{prefix}-{pid}-{t}-{id}"))
}

fn touch(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(p) = path.parent() {
        fs::create_dir_all(p)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}

fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

#[test]
fn manifest_round_trip_preserves_order() -> Result<()> {
    let root = unique_root("roundtrip");
    fs::create_dir_all(&root)?;
    let path = manifest_path(&root);

    let files = vec![
        "me-2-big-Data.db".to_string(),
        "me-1-big-Data.db".to_string(),
        ".tbl_idx/me-1-big-Data.db".to_string(),
    ];
    let t0 = ts("2024-05-01T10:00:00.123Z");
    let m = SnapshotManifest::new(files.clone(), Some(t0), None, false);
    m.write_to(&path)?;

    let back = SnapshotManifest::read_from(&path)?;
    assert_eq!(back.files, files, "file order must be preserved");
    assert_eq!(back.created_at, Some(t0));
    assert_eq!(back.expires_at, None);
    assert!(!back.ephemeral);
    assert!(!root.join(format!("{MANIFEST_FILE}.tmp")).exists(), "tmp must be renamed away");

    fs::remove_dir_all(&root)?;
    Ok(())
}

#[test]
fn builder_adopts_first_manifest_and_legacy_marker() -> Result<()> {
    let root = unique_root("adopt");
    let d0 = root.join("d0/snapshots/tag");
    let d1 = root.join("d1/snapshots/tag");
    fs::create_dir_all(&d0)?;
    fs::create_dir_all(&d1)?;

    let t0 = ts("2024-01-01T00:00:00Z");
    let exp = t0 + Duration::days(1);
    SnapshotManifest {
        files: vec![],
        created_at: Some(t0),
        expires_at: Some(exp),
        ephemeral: false,
    }
    .write_to(&manifest_path(&d0))?;
    // marker only, no manifest
    touch(&d1.join(EPHEMERAL_MARKER_FILE), b"")?;

    let mut b = TableSnapshotBuilder::new("ks", "tbl", Uuid::new_v4(), "tag");
    b.add_snapshot_dir(&d0);
    b.add_snapshot_dir(&d1);
    b.add_snapshot_dir(&d1);
    assert_eq!(b.snapshot_dirs().len(), 2, "dirs are a set");

    let cfg = SnapshotConfig::default().with_manifest_enrich(false);
    let snap = b.build(&cfg);
    assert_eq!(snap.created_at(), Some(t0));
    assert_eq!(snap.expires_at(), Some(exp));
    assert!(snap.is_ephemeral());
    assert!(!manifest_path(&d1).exists(), "enrichment disabled: nothing written");

    fs::remove_dir_all(&root)?;
    Ok(())
}

#[test]
fn repair_creates_missing_and_enriches_legacy() -> Result<()> {
    let root = unique_root("repair");
    let d0 = root.join("d0/ks/tbl/snapshots/tag");
    let d1 = root.join("d1/ks/tbl/snapshots/tag");
    touch(&d0.join("me-1-big-Data.db"), b"0123")?;
    touch(&d0.join("me-1-big-Index.db"), b"01")?;
    touch(&d0.join(".tbl_idx/me-3-big-Data.db"), b"01")?;
    touch(&d1.join("me-2-big-Data.db"), b"0123456")?;

    // legacy manifest: file list only
    fs::write(manifest_path(&d0), br#"{"files":["me-1-big-Data.db"]}"#)?;

    let mut b = TableSnapshotBuilder::new("ks", "tbl", Uuid::new_v4(), "tag");
    b.add_snapshot_dir(&d0);
    b.add_snapshot_dir(&d1);
    assert!(b.known_metadata().created_at.is_none());

    let (snap, report) = b.build_with_report(&SnapshotConfig::default().with_manifest_enrich(true));
    let report = report.expect("enrichment enabled");
    assert_eq!(report.created, vec![d1.clone()]);
    assert_eq!(report.enriched, vec![d0.clone()]);
    assert!(report.failures.is_empty());

    let created_at = snap.created_at().expect("created_at resolved");
    assert_eq!(report.created_at, Some(created_at));

    let m0 = SnapshotManifest::read_from(&manifest_path(&d0))?;
    let m1 = SnapshotManifest::read_from(&manifest_path(&d1))?;
    assert_eq!(m0.created_at, Some(created_at));
    assert_eq!(m1.created_at, Some(created_at));
    assert_eq!(
        m0.files,
        vec![".tbl_idx/me-3-big-Data.db".to_string(), "me-1-big-Data.db".to_string()]
    );
    assert_eq!(m1.files, vec!["me-2-big-Data.db".to_string()]);

    // a second load finds complete manifests and does nothing
    let mut again = TableSnapshotBuilder::new("ks", "tbl", Uuid::new_v4(), "tag");
    again.add_snapshot_dir(&d0);
    again.add_snapshot_dir(&d1);
    let (snap2, report2) = again.build_with_report(&SnapshotConfig::default());
    assert!(report2.map(|r| r.is_noop()).unwrap_or(true));
    assert_eq!(snap2.created_at(), Some(created_at));

    fs::remove_dir_all(&root)?;
    Ok(())
}

#[test]
fn unreadable_manifest_does_not_abort_build() -> Result<()> {
    let root = unique_root("corrupt");
    let d0 = root.join("snapshots/tag");
    touch(&d0.join("me-1-big-Data.db"), b"x")?;
    fs::write(manifest_path(&d0), b"{ not json")?;

    let mut b = TableSnapshotBuilder::new("ks", "tbl", Uuid::new_v4(), "tag");
    b.add_snapshot_dir(&d0);
    let (snap, report) = b.build_with_report(&SnapshotConfig::default());
    let report = report.expect("enrichment enabled");

    assert_eq!(report.failures.len(), 1);
    assert!(report.created.is_empty());
    assert!(report.enriched.is_empty());
    // falls back to the directory mtime
    assert!(snap.created_at().is_some());
    assert_eq!(fs::read(manifest_path(&d0))?, b"{ not json", "broken manifest left untouched");

    fs::remove_dir_all(&root)?;
    Ok(())
}

#[test]
fn known_created_at_is_reused_for_missing_manifests() -> Result<()> {
    let root = unique_root("known");
    let d0 = root.join("d0/snapshots/tag");
    let d1 = root.join("d1/snapshots/tag");
    fs::create_dir_all(&d0)?;
    touch(&d1.join("me-5-big-Data.db"), b"x")?;

    let t0 = ts("2023-03-03T03:03:03Z");
    SnapshotManifest::new(vec![], Some(t0), Some(Duration::hours(2)), true)
        .write_to(&manifest_path(&d0))?;

    let mut b = TableSnapshotBuilder::new("ks", "tbl", Uuid::new_v4(), "tag");
    b.add_snapshot_dir(&d0);
    b.add_snapshot_dir(&d1);
    let snap = b.build(&SnapshotConfig::default());
    assert_eq!(snap.created_at(), Some(t0));
    assert!(snap.is_ephemeral());

    let m1 = SnapshotManifest::read_from(&manifest_path(&d1))?;
    assert_eq!(m1.created_at, Some(t0));
    assert_eq!(m1.expires_at, Some(t0 + Duration::hours(2)));
    assert!(m1.ephemeral);
    assert_eq!(m1.files, vec!["me-5-big-Data.db".to_string()]);

    fs::remove_dir_all(&root)?;
    Ok(())
}
