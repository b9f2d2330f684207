use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::OnceLock;
use uuid::Uuid;

use super::live_path::live_file_for_snapshot_file;
use crate::consts::{MANIFEST_FILE, SCHEMA_FILE};
use crate::directories::Directories;
use crate::manifest::{file_size, folder_size, list_snapshot_files};
use crate::util::last_modified;

/// One logical snapshot of a table, possibly spread over several data directories.
///
/// Identity is (keyspace, table, table id, tag). Size figures are computed at most once
/// per object; build a new TableSnapshot to observe changes on disk.
pub struct TableSnapshot {
    keyspace_name: String,
    table_name: String,
    keyspace_table: String,
    table_id: Uuid,
    tag: String,
    created_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    snapshot_dirs: BTreeSet<PathBuf>,
    ephemeral: bool,
    case_insensitive_tags: bool,

    size_on_disk: OnceLock<u64>,
    manifests_size: AtomicU64,
    schemas_size: AtomicU64,
    in_progress: AtomicBool,
}

/// "ks:table:table_id:tag"
pub fn build_snapshot_id(keyspace: &str, table: &str, table_id: &Uuid, tag: &str) -> String {
    format!("{}:{}:{}:{}", keyspace, table, table_id, tag)
}

impl TableSnapshot {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        keyspace_name: &str,
        table_name: &str,
        table_id: Uuid,
        tag: &str,
        created_at: Option<DateTime<Utc>>,
        expires_at: Option<DateTime<Utc>>,
        snapshot_dirs: BTreeSet<PathBuf>,
        ephemeral: bool,
    ) -> Self {
        let snap = Self {
            keyspace_name: keyspace_name.to_string(),
            table_name: table_name.to_string(),
            keyspace_table: format!("{}.{}", keyspace_name, table_name),
            table_id,
            tag: tag.to_string(),
            created_at,
            expires_at,
            snapshot_dirs,
            ephemeral,
            case_insensitive_tags: false,
            size_on_disk: OnceLock::new(),
            manifests_size: AtomicU64::new(0),
            schemas_size: AtomicU64::new(0),
            in_progress: AtomicBool::new(false),
        };
        snap.manifests_size
            .store(snap.compute_manifests_size(), Ordering::Relaxed);
        snap.schemas_size
            .store(snap.compute_schemas_size(), Ordering::Relaxed);
        snap
    }

    /// Compare tags ignoring case (hosts whose filesystem folds case).
    pub fn with_case_insensitive_tags(mut self, on: bool) -> Self {
        self.case_insensitive_tags = on;
        self
    }

    /// Internal deduplication key, never parsed back.
    pub fn id(&self) -> String {
        build_snapshot_id(&self.keyspace_name, &self.table_name, &self.table_id, &self.tag)
    }

    pub fn keyspace_name(&self) -> &str {
        &self.keyspace_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// "ks.table"
    pub fn keyspace_table(&self) -> &str {
        &self.keyspace_table
    }

    pub fn table_id(&self) -> &Uuid {
        &self.table_id
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn directories(&self) -> &BTreeSet<PathBuf> {
        &self.snapshot_dirs
    }

    pub fn is_completed(&self) -> bool {
        !self.in_progress.load(Ordering::Acquire)
    }

    pub fn incomplete(&self) {
        self.in_progress.store(true, Ordering::Release);
    }

    pub fn complete(&self) {
        self.in_progress.store(false, Ordering::Release);
    }

    /// Creation time; without a recorded value, the oldest directory mtime (best effort).
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        if self.created_at.is_some() {
            return self.created_at;
        }
        self.snapshot_dirs
            .iter()
            .filter_map(|d| last_modified(d))
            .min()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Expired iff both timestamps were recorded and `now` reached expires_at.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match (self.created_at, self.expires_at) {
            (Some(_), Some(exp)) => now >= exp,
            _ => false,
        }
    }

    pub fn is_expiring(&self) -> bool {
        self.expires_at.is_some()
    }

    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    /// Live check: does any snapshot directory still exist.
    pub fn exists(&self) -> bool {
        self.snapshot_dirs.iter().any(|d| d.exists())
    }

    /// Total bytes under all snapshot directories. Computed once.
    pub fn compute_size_on_disk_bytes(&self) -> u64 {
        *self
            .size_on_disk
            .get_or_init(|| self.snapshot_dirs.iter().map(|d| folder_size(d)).sum())
    }

    /// Bytes held only by this snapshot.
    ///
    /// Files whose live counterpart is in `live_files` are hard links shared with the table
    /// and are not counted. `None` means the table is gone: every file counts.
    pub fn compute_true_size_bytes(&self, live_files: Option<&HashSet<PathBuf>>) -> u64 {
        let mut size = self.manifests_size() + self.schemas_size();

        for dir in &self.snapshot_dirs {
            for file in list_snapshot_files(dir) {
                if is_metadata_sidecar(&file) {
                    continue;
                }
                let shared = match live_files {
                    Some(live) => live_file_for_snapshot_file(&file)
                        .map(|p| live.contains(&p))
                        .unwrap_or(false),
                    None => false,
                };
                if !shared {
                    size += file_size(&file);
                }
            }
        }

        size
    }

    /// Existing manifest files, one per directory at most.
    pub fn manifest_files(&self) -> BTreeSet<PathBuf> {
        self.snapshot_dirs
            .iter()
            .map(|d| Directories::snapshot_manifest_file(d))
            .filter(|p| p.exists())
            .collect()
    }

    pub fn has_manifest(&self) -> bool {
        self.snapshot_dirs
            .iter()
            .any(|d| Directories::snapshot_manifest_file(d).exists())
    }

    /// Existing schema files, one per directory at most.
    pub fn schema_files(&self) -> BTreeSet<PathBuf> {
        self.snapshot_dirs
            .iter()
            .map(|d| Directories::snapshot_schema_file(d))
            .filter(|p| p.exists())
            .collect()
    }

    pub fn manifests_size(&self) -> u64 {
        self.manifests_size.load(Ordering::Relaxed)
    }

    pub fn schemas_size(&self) -> u64 {
        self.schemas_size.load(Ordering::Relaxed)
    }

    /// Fill metadata sizes that were zero at construction (files written afterwards).
    pub fn update_metadata_size(&self) {
        if self.manifests_size() == 0 {
            self.manifests_size
                .store(self.compute_manifests_size(), Ordering::Relaxed);
        }
        if self.schemas_size() == 0 {
            self.schemas_size
                .store(self.compute_schemas_size(), Ordering::Relaxed);
        }
    }

    fn compute_manifests_size(&self) -> u64 {
        self.manifest_files().iter().map(|p| file_size(p)).sum()
    }

    fn compute_schemas_size(&self) -> u64 {
        self.schema_files().iter().map(|p| file_size(p)).sum()
    }

    /// Tag as compared by Eq: lowercased when case-insensitive tags are on.
    pub fn tag_key(&self) -> Cow<'_, str> {
        if self.case_insensitive_tags {
            Cow::Owned(self.tag.to_lowercase())
        } else {
            Cow::Borrowed(&self.tag)
        }
    }
}

fn is_metadata_sidecar(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n == MANIFEST_FILE || n == SCHEMA_FILE)
        .unwrap_or(false)
}

impl PartialEq for TableSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.keyspace_name == other.keyspace_name
            && self.table_name == other.table_name
            && self.table_id == other.table_id
            && self.tag_key() == other.tag_key()
    }
}

impl Eq for TableSnapshot {}

impl Hash for TableSnapshot {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.keyspace_name.hash(state);
        self.table_name.hash(state);
        self.table_id.hash(state);
        // equal tag keys always share the lowercased tag
        self.tag.to_lowercase().hash(state);
    }
}

impl fmt::Display for TableSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dirs: Vec<String> = self
            .snapshot_dirs
            .iter()
            .map(|d| d.display().to_string())
            .collect();
        write!(
            f,
            "TableSnapshot{{keyspaceName='{}', tableName='{}', tableId={}, tag='{}', \
             createdAt={}, expiresAt={}, snapshotDirs=[{}], ephemeral={}}}",
            self.keyspace_name,
            self.table_name,
            self.table_id,
            self.tag,
            self.created_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "null".to_string()),
            self.expires_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "null".to_string()),
            dirs.join(", "),
            self.ephemeral,
        )
    }
}

impl fmt::Debug for TableSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
