use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;

use super::table_snapshot::TableSnapshot;
use crate::util::stringify_file_size;

/// Column titles of a snapshot summary row.
pub const ITEM_NAMES: [&str; 9] = [
    "Snapshot name",
    "Keyspace name",
    "Column family name",
    "True size",
    "Size on disk",
    "Creation time",
    "Expiration time",
    "Ephemeral",
    "Raw true size",
];

/// Summary row of one snapshot, as shown by listing tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotDetails {
    pub snapshot_name: String,
    pub keyspace_name: String,
    pub columnfamily_name: String,
    pub true_size: String,
    pub size_on_disk: String,
    pub created_at: Option<String>,
    pub expires_at: Option<String>,
    pub ephemeral: bool,
    pub raw_true_size: u64,
}

impl SnapshotDetails {
    /// `live_files`: live files of the table, None if the table was dropped.
    pub fn from_snapshot(snap: &TableSnapshot, live_files: Option<&HashSet<PathBuf>>) -> Self {
        let size_on_disk = snap.compute_size_on_disk_bytes();
        let true_size = snap.compute_true_size_bytes(live_files);
        Self {
            snapshot_name: snap.tag().to_string(),
            keyspace_name: snap.keyspace_name().to_string(),
            columnfamily_name: snap.table_name().to_string(),
            true_size: stringify_file_size(true_size),
            size_on_disk: stringify_file_size(size_on_disk),
            created_at: snap.created_at().map(|t| t.to_rfc3339()),
            expires_at: snap.expires_at().map(|t| t.to_rfc3339()),
            ephemeral: snap.is_ephemeral(),
            raw_true_size: true_size,
        }
    }

    /// Values in ITEM_NAMES order.
    pub fn columns(&self) -> [String; 9] {
        [
            self.snapshot_name.clone(),
            self.keyspace_name.clone(),
            self.columnfamily_name.clone(),
            self.true_size.clone(),
            self.size_on_disk.clone(),
            self.created_at.clone().unwrap_or_default(),
            self.expires_at.clone().unwrap_or_default(),
            self.ephemeral.to_string(),
            self.raw_true_size.to_string(),
        ]
    }
}
