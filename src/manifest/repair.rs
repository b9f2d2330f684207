//! Manifest repair: create missing manifests and enrich legacy ones.
//!
//! Runs once when a snapshot is loaded. It never fails: per-directory read/write
//! problems are logged and reported in RepairReport::failures.
//!
//! - created_at: known value, else the oldest directory mtime, else `now`.
//! - Directories without manifest.json get a fresh one.
//! - Directories whose manifest has no created_at are rewritten.
//! - Each manifest lists the data files found in its own directory.

use chrono::{DateTime, Utc};
use log::{error, info};
use std::path::{Path, PathBuf};

use super::codec::{manifest_path, SnapshotManifest};
use super::scan::data_files;
use crate::metrics::{
    record_manifest_created, record_manifest_enriched, record_manifest_read_error,
    record_manifest_write_error,
};
use crate::sstable::{Component, Descriptor};
use crate::util::last_modified;

/// What a snapshot already knows before repair.
#[derive(Debug, Clone, Default)]
pub struct KnownMetadata {
    pub created_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub ephemeral: bool,
}

/// Outcome of a repair pass.
#[derive(Debug, Clone, Default)]
pub struct RepairReport {
    /// Best known creation time after repair.
    pub created_at: Option<DateTime<Utc>>,
    /// Directories that received a new manifest.
    pub created: Vec<PathBuf>,
    /// Directories whose legacy manifest was rewritten.
    pub enriched: Vec<PathBuf>,
    /// Per-directory failures (directory, message).
    pub failures: Vec<(PathBuf, String)>,
}

impl RepairReport {
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.enriched.is_empty() && self.failures.is_empty()
    }
}

/// Repair the manifests of all directories of one snapshot (see module docs).
pub fn repair_manifests<'a, I>(
    label: &str,
    dirs: I,
    known: &KnownMetadata,
    now: DateTime<Utc>,
) -> RepairReport
where
    I: IntoIterator<Item = &'a PathBuf>,
{
    let dirs: Vec<&PathBuf> = dirs.into_iter().collect();
    let mut report = RepairReport {
        created_at: known.created_at,
        ..RepairReport::default()
    };

    let without: Vec<&PathBuf> = dirs
        .iter()
        .copied()
        .filter(|d| !manifest_path(d).exists())
        .collect();

    if known.created_at.is_some() && without.is_empty() {
        return report;
    }
    if known.created_at.is_none() && without.is_empty() {
        info!("manifest in the old format for snapshot {} was detected, going to enrich it", label);
    }
    if !without.is_empty() {
        info!(
            "there is no manifest for snapshot {} at {:?}, going to create it",
            label, without
        );
    }

    let created_at = known
        .created_at
        .or_else(|| dirs.iter().filter_map(|d| last_modified(d)).min())
        .unwrap_or(now);
    report.created_at = Some(created_at);

    for dir in dirs {
        let files = match relative_data_files(dir) {
            Ok(f) => f,
            Err(e) => {
                error!("unable to list a directory for data components {}: {:#}", dir.display(), e);
                report.failures.push((dir.clone(), format!("{:#}", e)));
                Vec::new()
            }
        };
        let fresh = SnapshotManifest {
            files,
            created_at: Some(created_at),
            expires_at: known.expires_at,
            ephemeral: known.ephemeral,
        };
        let path = manifest_path(dir);

        if without.contains(&dir) {
            if write_manifest(&fresh, &path, &mut report) {
                record_manifest_created();
                report.created.push(dir.clone());
            }
            continue;
        }

        match SnapshotManifest::read_from(&path) {
            Ok(existing) if existing.is_legacy() => {
                if write_manifest(&fresh, &path, &mut report) {
                    record_manifest_enriched();
                    report.enriched.push(dir.clone());
                }
            }
            Ok(_) => {}
            Err(e) => {
                record_manifest_read_error();
                error!("unable to read a manifest file {}: {:#}", path.display(), e);
                report.failures.push((dir.clone(), format!("{:#}", e)));
            }
        }
    }

    report
}

fn write_manifest(m: &SnapshotManifest, path: &Path, report: &mut RepairReport) -> bool {
    match m.write_to(path) {
        Ok(()) => true,
        Err(e) => {
            record_manifest_write_error();
            error!("unable to create a manifest file {}: {:#}", path.display(), e);
            let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            report.failures.push((dir, format!("{:#}", e)));
            false
        }
    }
}

/// Relative names of the data components found in a snapshot directory.
fn relative_data_files(dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut out = Vec::new();
    for path in data_files(dir)? {
        if let Some((desc, _)) = Descriptor::from_file(&path) {
            out.push(desc.relative_filename_for(&Component::Data));
        }
    }
    Ok(out)
}
