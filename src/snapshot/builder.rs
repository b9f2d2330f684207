use chrono::{DateTime, Utc};
use log::{trace, warn};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::table_snapshot::TableSnapshot;
use crate::config::SnapshotConfig;
use crate::consts::EPHEMERAL_MARKER_FILE;
use crate::manifest::{manifest_path, repair_manifests, KnownMetadata, RepairReport, SnapshotManifest};
use crate::metrics::{record_manifest_read_error, record_snapshot_built};
use crate::util::now_millis;

/// Accumulates the directories of one logical snapshot and builds a TableSnapshot.
#[derive(Debug)]
pub struct TableSnapshotBuilder {
    keyspace_name: String,
    table_name: String,
    table_id: Uuid,
    tag: String,

    created_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    ephemeral: bool,

    snapshot_dirs: BTreeSet<PathBuf>,
}

impl TableSnapshotBuilder {
    pub fn new(keyspace_name: &str, table_name: &str, table_id: Uuid, tag: &str) -> Self {
        Self {
            keyspace_name: keyspace_name.to_string(),
            table_name: table_name.to_string(),
            table_id,
            tag: tag.to_string(),
            created_at: None,
            expires_at: None,
            ephemeral: false,
            snapshot_dirs: BTreeSet::new(),
        }
    }

    /// Add one physical directory; metadata is taken from the first readable manifest.
    pub fn add_snapshot_dir(&mut self, snapshot_dir: impl Into<PathBuf>) {
        let dir = snapshot_dir.into();
        let manifest = manifest_path(&dir);
        if manifest.exists() && self.created_at.is_none() && self.expires_at.is_none() {
            self.load_metadata_from_manifest(&manifest);
        }

        // legacy marker, superseded by the manifest flag
        if !self.ephemeral && dir.join(EPHEMERAL_MARKER_FILE).exists() {
            self.ephemeral = true;
        }
        self.snapshot_dirs.insert(dir);
    }

    fn load_metadata_from_manifest(&mut self, manifest: &Path) {
        trace!("loading snapshot manifest from {}", manifest.display());
        match SnapshotManifest::read_from(manifest) {
            Ok(m) => {
                self.created_at = m.created_at;
                self.expires_at = m.expires_at;
                if !self.ephemeral {
                    self.ephemeral = m.ephemeral;
                }
            }
            Err(e) => {
                record_manifest_read_error();
                warn!(
                    "cannot read manifest file {} of snapshot {}: {:#}",
                    manifest.display(),
                    self.tag,
                    e
                );
            }
        }
    }

    pub fn snapshot_dirs(&self) -> &BTreeSet<PathBuf> {
        &self.snapshot_dirs
    }

    /// Metadata gathered from the added directories so far.
    pub fn known_metadata(&self) -> KnownMetadata {
        KnownMetadata {
            created_at: self.created_at,
            expires_at: self.expires_at,
            ephemeral: self.ephemeral,
        }
    }

    /// Build, running the manifest repair step first when enabled by config.
    pub fn build(self, config: &SnapshotConfig) -> TableSnapshot {
        self.build_with_report(config).0
    }

    /// Like build(), also returning what the repair step did (None when disabled).
    pub fn build_with_report(self, config: &SnapshotConfig) -> (TableSnapshot, Option<RepairReport>) {
        let mut created_at = self.created_at;
        let report = if config.manifest_enrich_enabled {
            let label = format!("{} for {}.{}", self.tag, self.keyspace_name, self.table_name);
            let report = repair_manifests(&label, &self.snapshot_dirs, &self.known_metadata(), now_millis());
            created_at = report.created_at;
            Some(report)
        } else {
            None
        };

        record_snapshot_built();
        let snap = TableSnapshot::new(
            &self.keyspace_name,
            &self.table_name,
            self.table_id,
            &self.tag,
            created_at,
            self.expires_at,
            self.snapshot_dirs,
            self.ephemeral,
        )
        .with_case_insensitive_tags(config.case_insensitive_tags);
        (snap, report)
    }
}
