//! Table: identity, data directories and the live sstable tracker.
//!
//! take_snapshot() materializes a snapshot by hard-linking live files into
//! `{data_dir}/snapshots/{tag}` and writing one manifest per directory.

use anyhow::{anyhow, Context, Result};
use chrono::Duration;
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::SnapshotConfig;
use crate::consts::INDEX_DIR_PREFIX;
use crate::directories::{list_sstables_into, Directories, SSTableListing};
use crate::manifest::{manifest_path, SnapshotManifest};
use crate::metrics::record_snapshot_taken;
use crate::snapshot::{snapshot_sstable_readers, SnapshotSource, TableSnapshot};
use crate::sstable::{Component, Descriptor, Ref, Refs, SSTableReader, Tracker};
use crate::util::now_millis;

pub struct Table {
    keyspace: String,
    name: String,
    id: Uuid,
    directories: Directories,
    tracker: Tracker,
}

impl Table {
    /// Open (creating directories as needed) and register every live sstable found on disk.
    pub fn open(data_roots: &[PathBuf], keyspace: &str, name: &str, id: Uuid) -> Result<Self> {
        if data_roots.is_empty() {
            return Err(anyhow!("table {}.{} needs at least one data directory", keyspace, name));
        }
        let directories = Directories::new(data_roots, keyspace, name, &id);
        directories.create()?;

        let table = Self {
            keyspace: keyspace.to_string(),
            name: name.to_string(),
            id,
            directories,
            tracker: Tracker::new(),
        };

        let live = table.directories.list_live()?;
        for (desc, comps) in &live {
            let reader = SSTableReader::open(desc, comps, false)
                .with_context(|| format!("open live sstable {}", desc))?;
            table.tracker.add(reader);
        }
        debug!(
            "opened table {}.{} with {} live sstable(s)",
            keyspace,
            name,
            table.tracker.len()
        );
        Ok(table)
    }

    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &Uuid {
        &self.id
    }

    pub fn directories(&self) -> &Directories {
        &self.directories
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Register an sstable whose files already exist in one of the data dirs.
    pub fn add_sstable(
        &self,
        descriptor: &Descriptor,
        components: &BTreeSet<Component>,
    ) -> Result<Arc<SSTableReader>> {
        let reader = SSTableReader::open(descriptor, components, false)?;
        Ok(self.tracker.add(reader))
    }

    /// Live files of the table (index files included).
    pub fn live_files(&self) -> HashSet<PathBuf> {
        self.directories.live_files()
    }

    /// Hard-link the current live data into snapshot `tag` and write its manifests.
    pub fn take_snapshot(
        &self,
        tag: &str,
        ttl: Option<Duration>,
        ephemeral: bool,
        config: &SnapshotConfig,
    ) -> Result<TableSnapshot> {
        validate_tag(tag)?;
        for d in self.directories.data_dirs() {
            let sd = Directories::snapshot_dir(d, tag);
            if sd.exists() {
                return Err(anyhow!("snapshot {} already exists at {}", tag, sd.display()));
            }
        }

        // keep the live readers alive while linking
        let mut pinned: Refs<SSTableReader> = Refs::new();
        for r in self.tracker.canonical() {
            pinned.try_ref(&r);
        }

        let created_at = now_millis();
        let dirs: BTreeSet<PathBuf> = self
            .directories
            .data_dirs()
            .iter()
            .map(|d| Directories::snapshot_dir(d, tag))
            .collect();
        let snapshot = TableSnapshot::new(
            &self.keyspace,
            &self.name,
            self.id,
            tag,
            Some(created_at),
            ttl.and_then(|t| created_at.checked_add_signed(t)),
            dirs,
            ephemeral,
        )
        .with_case_insensitive_tags(config.case_insensitive_tags);
        snapshot.incomplete();

        // removes the partly written snapshot dirs unless finished
        let mut guard = PartialSnapshotGuard::new(tag);
        let mut files_per_dir: BTreeMap<PathBuf, Vec<String>> = BTreeMap::new();
        for data_dir in self.directories.data_dirs() {
            let snapshot_dir = Directories::snapshot_dir(data_dir, tag);
            guard.track(&snapshot_dir);
            fs::create_dir_all(&snapshot_dir)
                .with_context(|| format!("create {}", snapshot_dir.display()))?;
            files_per_dir.insert(snapshot_dir, Vec::new());
        }

        for reader in pinned.iter() {
            let desc = reader.descriptor();
            let data_dir = desc.directory.clone();
            let snapshot_dir = Directories::snapshot_dir(&data_dir, tag);
            link_components(desc, reader.components(), &snapshot_dir)?;
            files_per_dir
                .entry(snapshot_dir)
                .or_default()
                .push(desc.relative_filename_for(&Component::Data));
        }
        pinned.release();

        // index sstables live in .{index} subdirs and are mirrored as-is
        for index_dir in self.directories.index_dirs() {
            let (data_dir, index_name) = match (index_dir.parent(), index_dir.file_name()) {
                (Some(p), Some(n)) => (p.to_path_buf(), n.to_owned()),
                _ => continue,
            };
            let snapshot_dir = Directories::snapshot_dir(&data_dir, tag);
            let target = snapshot_dir.join(&index_name);
            let mut listing = SSTableListing::new();
            list_sstables_into(&index_dir, &mut listing)?;
            for (desc, comps) in &listing {
                link_components(desc, comps, &target)?;
                let mirrored = Descriptor {
                    directory: target.clone(),
                    ..desc.clone()
                };
                files_per_dir
                    .entry(snapshot_dir.clone())
                    .or_default()
                    .push(mirrored.relative_filename_for(&Component::Data));
            }
        }

        for (snapshot_dir, files) in files_per_dir {
            let manifest = SnapshotManifest {
                files,
                created_at: snapshot.created_at(),
                expires_at: snapshot.expires_at(),
                ephemeral,
            };
            manifest.write_to(&manifest_path(&snapshot_dir))?;
        }
        guard.finish();

        snapshot.update_metadata_size();
        snapshot.complete();
        record_snapshot_taken();
        info!(
            "took snapshot {} of {} ({} dir(s))",
            tag,
            snapshot.keyspace_table(),
            snapshot.directories().len()
        );
        Ok(snapshot)
    }

    /// Reference-counted readers covering snapshot `tag`.
    pub fn snapshot_sstable_readers(&self, tag: &str) -> Result<Refs<SSTableReader>> {
        snapshot_sstable_readers(self, tag)
    }
}

impl SnapshotSource for Table {
    fn canonical_sstables(&self) -> Vec<Arc<SSTableReader>> {
        self.tracker.canonical()
    }

    fn list_snapshot(&self, tag: &str) -> Result<SSTableListing> {
        self.directories.list_snapshot(tag)
    }

    fn open_offline(
        &self,
        descriptor: &Descriptor,
        components: &BTreeSet<Component>,
    ) -> Result<Ref<SSTableReader>> {
        SSTableReader::open(descriptor, components, true)
    }
}

fn validate_tag(tag: &str) -> Result<()> {
    if tag.is_empty() {
        return Err(anyhow!("snapshot tag must not be empty"));
    }
    if tag.contains('/') || tag.contains('\\') {
        return Err(anyhow!("invalid snapshot tag '{}'", tag));
    }
    // dot-prefixed dirs under snapshots/ would be taken for index dirs
    if tag.starts_with(INDEX_DIR_PREFIX) {
        return Err(anyhow!("snapshot tag '{}' must not start with '{}'", tag, INDEX_DIR_PREFIX));
    }
    Ok(())
}

/// Removes the snapshot directories of a failed take_snapshot() on drop.
struct PartialSnapshotGuard<'a> {
    tag: &'a str,
    dirs: Vec<PathBuf>,
    remove_on_drop: bool,
}

impl<'a> PartialSnapshotGuard<'a> {
    fn new(tag: &'a str) -> Self {
        Self {
            tag,
            dirs: Vec::new(),
            remove_on_drop: true,
        }
    }

    fn track(&mut self, dir: &Path) {
        self.dirs.push(dir.to_path_buf());
    }

    fn finish(mut self) {
        self.remove_on_drop = false;
    }
}

impl Drop for PartialSnapshotGuard<'_> {
    fn drop(&mut self) {
        if !self.remove_on_drop {
            return;
        }
        for dir in &self.dirs {
            match fs::remove_dir_all(dir) {
                Ok(()) => debug!("removed partial snapshot dir {}", dir.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    "failed to remove partial snapshot {} at {}: {}",
                    self.tag,
                    dir.display(),
                    e
                ),
            }
        }
    }
}

fn link_components(desc: &Descriptor, comps: &BTreeSet<Component>, target_dir: &Path) -> Result<()> {
    fs::create_dir_all(target_dir).with_context(|| format!("create {}", target_dir.display()))?;
    for c in comps {
        let src = desc.filename_for(c);
        let dst = target_dir.join(format!("{}-{}", desc.base_name(), c.repr()));
        fs::hard_link(&src, &dst)
            .with_context(|| format!("link {} -> {}", src.display(), dst.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_validation() {
        assert!(validate_tag("").is_err());
        assert!(validate_tag("a/b").is_err());
        assert!(validate_tag("..").is_err());
        assert!(validate_tag(".").is_err());
        assert!(validate_tag(".bak").is_err());
        assert!(validate_tag(".tbl_idx").is_err());
        assert!(validate_tag("bak.1").is_ok());
        assert!(validate_tag("173000-backup").is_ok());
    }
}
