//! Data directories of one table across all data roots.
//!
//! {root}/{keyspace}/{table}-{id}/                 live sstables
//! {root}/{keyspace}/{table}-{id}/.{index}/        live index sstables
//! {root}/{keyspace}/{table}-{id}/snapshots/{tag}/ snapshots

use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::consts::{SCHEMA_FILE, SNAPSHOTS_DIR};
use crate::manifest::{is_secondary_index_folder, list_snapshot_files, manifest_path};
use crate::sstable::{Component, Descriptor};

/// sstables of a directory grouped by descriptor.
pub type SSTableListing = BTreeMap<Descriptor, BTreeSet<Component>>;

#[derive(Debug, Clone)]
pub struct Directories {
    data_dirs: Vec<PathBuf>,
}

/// "{table}-{id as 32 hex digits}"
pub fn table_dir_name(table: &str, id: &Uuid) -> String {
    format!("{}-{}", table, id.simple())
}

/// Inverse of table_dir_name.
pub fn parse_table_dir_name(name: &str) -> Option<(String, Uuid)> {
    let (table, id) = name.rsplit_once('-')?;
    if table.is_empty() || id.len() != 32 {
        return None;
    }
    let id = Uuid::parse_str(id).ok()?;
    Some((table.to_string(), id))
}

impl Directories {
    pub fn new(data_roots: &[PathBuf], keyspace: &str, table: &str, id: &Uuid) -> Self {
        let dir_name = table_dir_name(table, id);
        Self {
            data_dirs: data_roots
                .iter()
                .map(|r| r.join(keyspace).join(&dir_name))
                .collect(),
        }
    }

    /// Create the table directories that do not exist yet.
    pub fn create(&self) -> Result<()> {
        for d in &self.data_dirs {
            fs::create_dir_all(d).with_context(|| format!("create {}", d.display()))?;
        }
        Ok(())
    }

    pub fn data_dirs(&self) -> &[PathBuf] {
        &self.data_dirs
    }

    /// {data_dir}/snapshots/{tag}
    pub fn snapshot_dir(data_dir: &Path, tag: &str) -> PathBuf {
        data_dir.join(SNAPSHOTS_DIR).join(tag)
    }

    /// Existing snapshot directories of `tag`, one per data dir at most.
    pub fn snapshot_dirs(&self, tag: &str) -> Vec<PathBuf> {
        self.data_dirs
            .iter()
            .map(|d| Self::snapshot_dir(d, tag))
            .filter(|d| d.is_dir())
            .collect()
    }

    pub fn snapshot_manifest_file(snapshot_dir: &Path) -> PathBuf {
        manifest_path(snapshot_dir)
    }

    pub fn snapshot_schema_file(snapshot_dir: &Path) -> PathBuf {
        snapshot_dir.join(SCHEMA_FILE)
    }

    /// Live sstables (top level of every data dir).
    pub fn list_live(&self) -> Result<SSTableListing> {
        let mut out = SSTableListing::new();
        for d in &self.data_dirs {
            list_sstables_into(d, &mut out)?;
        }
        Ok(out)
    }

    /// sstables of snapshot `tag` (top level of every snapshot dir).
    pub fn list_snapshot(&self, tag: &str) -> Result<SSTableListing> {
        let mut out = SSTableListing::new();
        for d in &self.data_dirs {
            list_sstables_into(&Self::snapshot_dir(d, tag), &mut out)?;
        }
        Ok(out)
    }

    /// Live index subdirectories (".{index}") of every data dir.
    pub fn index_dirs(&self) -> Vec<PathBuf> {
        let mut out = Vec::new();
        for d in &self.data_dirs {
            if let Ok(rd) = fs::read_dir(d) {
                for e in rd.flatten() {
                    let p = e.path();
                    if p.is_dir() && is_secondary_index_folder(&p) {
                        out.push(p);
                    }
                }
            }
        }
        out.sort();
        out
    }

    /// Every live file of the table, index files included, snapshots excluded.
    pub fn live_files(&self) -> HashSet<PathBuf> {
        self.data_dirs
            .iter()
            .flat_map(|d| list_snapshot_files(d))
            .collect()
    }
}

/// Group the component files directly inside `dir` by descriptor. A missing dir adds nothing.
pub fn list_sstables_into(dir: &Path, out: &mut SSTableListing) -> Result<()> {
    let rd = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e).with_context(|| format!("list {}", dir.display())),
    };
    for entry in rd {
        let entry = entry.with_context(|| format!("list {}", dir.display()))?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some((desc, comp)) = Descriptor::from_file(&entry.path()) {
            out.entry(desc).or_default().insert(comp);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_dir_name_round_trips() {
        let id = Uuid::parse_str("e03faca0-8132-11ec-a100-c705ea09b5ef").unwrap();
        let name = table_dir_name("tbl", &id);
        assert_eq!(name, "tbl-e03faca0813211eca100c705ea09b5ef");
        assert_eq!(parse_table_dir_name(&name), Some(("tbl".to_string(), id)));
        assert_eq!(
            parse_table_dir_name("my-table-e03faca0813211eca100c705ea09b5ef").map(|(t, _)| t),
            Some("my-table".to_string())
        );
        assert!(parse_table_dir_name("tbl").is_none());
        assert!(parse_table_dir_name("tbl-123").is_none());
    }

    #[test]
    fn dirs_per_root() {
        let id = Uuid::nil();
        let d = Directories::new(&[PathBuf::from("/a"), PathBuf::from("/b")], "ks", "t", &id);
        assert_eq!(d.data_dirs().len(), 2);
        assert_eq!(
            Directories::snapshot_dir(&d.data_dirs()[1], "tag"),
            PathBuf::from("/b/ks/t-00000000000000000000000000000000/snapshots/tag")
        );
    }
}
