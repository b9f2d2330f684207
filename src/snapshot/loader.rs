//! Discovery and clearing of snapshots on disk.
//!
//! Walks {root}/{keyspace}/{table}-{id}/snapshots/{tag} for every data root and groups the
//! directories of the same (keyspace, table, id, tag) into one TableSnapshot.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::builder::TableSnapshotBuilder;
use super::table_snapshot::TableSnapshot;
use crate::config::SnapshotConfig;
use crate::consts::SNAPSHOTS_DIR;
use crate::directories::parse_table_dir_name;
use crate::metrics::record_snapshot_cleared;

type SnapshotKey = (String, String, Uuid, String);

pub struct SnapshotLoader {
    config: SnapshotConfig,
}

impl SnapshotLoader {
    pub fn new(config: SnapshotConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// All snapshots under the configured data roots.
    pub fn load_all(&self) -> Vec<TableSnapshot> {
        self.load_filtered(|_, _| true)
    }

    /// Snapshots of one table (every generation of that name).
    pub fn load_for(&self, keyspace: &str, table: &str) -> Vec<TableSnapshot> {
        self.load_filtered(|ks, t| ks == keyspace && t == table)
    }

    fn load_filtered<F>(&self, keep: F) -> Vec<TableSnapshot>
    where
        F: Fn(&str, &str) -> bool,
    {
        let mut builders: BTreeMap<SnapshotKey, TableSnapshotBuilder> = BTreeMap::new();

        for root in &self.config.data_dirs {
            for ks_dir in subdirs(root) {
                let keyspace = match file_name_str(&ks_dir) {
                    Some(k) => k,
                    None => continue,
                };
                for table_dir in subdirs(&ks_dir) {
                    let (table, id) = match file_name_str(&table_dir).and_then(|n| parse_table_dir_name(&n)) {
                        Some(v) => v,
                        None => continue,
                    };
                    if !keep(&keyspace, &table) {
                        continue;
                    }
                    for tag_dir in subdirs(&table_dir.join(SNAPSHOTS_DIR)) {
                        let tag = match file_name_str(&tag_dir) {
                            Some(t) => t,
                            None => continue,
                        };
                        // same grouping as TableSnapshot equality
                        let tag_key = if self.config.case_insensitive_tags {
                            tag.to_lowercase()
                        } else {
                            tag.clone()
                        };
                        let key = (keyspace.clone(), table.clone(), id, tag_key);
                        builders
                            .entry(key)
                            .or_insert_with(|| TableSnapshotBuilder::new(&keyspace, &table, id, &tag))
                            .add_snapshot_dir(tag_dir);
                    }
                }
            }
        }

        debug!("discovered {} snapshot(s)", builders.len());
        builders
            .into_values()
            .map(|b| b.build(&self.config))
            .collect()
    }
}

/// Remove every directory of a snapshot.
pub fn clear_snapshot(snap: &TableSnapshot) -> Result<()> {
    let mut failed = Vec::new();
    for dir in snap.directories() {
        match fs::remove_dir_all(dir) {
            Ok(()) => debug!("removed snapshot dir {}", dir.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                error!("failed to remove snapshot dir {}: {}", dir.display(), e);
                failed.push(dir.display().to_string());
            }
        }
    }
    if !failed.is_empty() {
        return Err(anyhow!(
            "failed to clear snapshot {} in {}",
            snap.id(),
            failed.join(", ")
        ));
    }
    record_snapshot_cleared();
    info!("cleared snapshot {} of {}", snap.tag(), snap.keyspace_table());
    Ok(())
}

/// Clear every expired snapshot; returns the ids of the cleared ones.
pub fn clear_expired(snapshots: &[TableSnapshot], now: DateTime<Utc>) -> Result<Vec<String>> {
    let mut cleared = Vec::new();
    for snap in snapshots.iter().filter(|s| s.is_expired(now)) {
        clear_snapshot(snap).with_context(|| format!("clear expired snapshot {}", snap.id()))?;
        cleared.push(snap.id());
    }
    Ok(cleared)
}

fn subdirs(dir: &Path) -> Vec<PathBuf> {
    let rd = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                error!("could not list directory content {}: {}", dir.display(), e);
            }
            return Vec::new();
        }
    };
    let mut out: Vec<PathBuf> = rd
        .flatten()
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.path())
        .collect();
    out.sort();
    out
}

fn file_name_str(p: &Path) -> Option<String> {
    p.file_name().and_then(|n| n.to_str()).map(str::to_string)
}
