use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::descriptor::{Component, Descriptor};
use super::refs::{Ref, RefCounted, RefState};

/// Open handle to one sstable (its component files).
///
/// Offline readers are opened for inspection only: they are not registered with a
/// table's live tracker and do not record reads.
pub struct SSTableReader {
    descriptor: Descriptor,
    components: BTreeSet<Component>,
    data_size: u64,
    offline: bool,
    obsolete: AtomicBool,
    reads: AtomicU64,
    refs: RefState,
}

impl SSTableReader {
    /// Open an sstable; the returned guard is the reader's self-reference.
    ///
    /// Fails if the Data component is not listed or any listed component is missing on disk.
    pub fn open(
        descriptor: &Descriptor,
        components: &BTreeSet<Component>,
        offline: bool,
    ) -> Result<Ref<SSTableReader>> {
        if !components.contains(&Component::Data) {
            return Err(anyhow!("sstable {} has no Data component", descriptor));
        }
        for c in components {
            let path = descriptor.filename_for(c);
            if !path.is_file() {
                return Err(anyhow!("missing component {} of sstable {}", c, descriptor));
            }
        }
        let data_path = descriptor.filename_for(&Component::Data);
        let data_size = fs::metadata(&data_path)
            .with_context(|| format!("stat {}", data_path.display()))?
            .len();

        debug!(
            "open sstable {} ({} components, offline={})",
            descriptor,
            components.len(),
            offline
        );

        Ok(Ref::self_ref(SSTableReader {
            descriptor: descriptor.clone(),
            components: components.clone(),
            data_size,
            offline,
            obsolete: AtomicBool::new(false),
            reads: AtomicU64::new(0),
            refs: RefState::new(),
        }))
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn components(&self) -> &BTreeSet<Component> {
        &self.components
    }

    pub fn data_size(&self) -> u64 {
        self.data_size
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// Number of outstanding references (self-reference included while held).
    pub fn ref_count(&self) -> usize {
        self.refs.count()
    }

    /// All component file paths.
    pub fn all_files(&self) -> Vec<PathBuf> {
        self.components
            .iter()
            .map(|c| self.descriptor.filename_for(c))
            .collect()
    }

    /// Schedule the files for deletion once the last reference is released.
    pub fn mark_obsolete(&self) {
        self.obsolete.store(true, Ordering::Release);
    }

    pub fn is_obsolete(&self) -> bool {
        self.obsolete.load(Ordering::Acquire)
    }

    /// Access-frequency accounting; offline readers do not count.
    pub fn mark_read(&self) {
        if !self.offline {
            self.reads.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

impl RefCounted for SSTableReader {
    fn ref_state(&self) -> &RefState {
        &self.refs
    }

    fn tidy(&self) {
        if !self.is_obsolete() {
            return;
        }
        debug!("deleting obsolete sstable {}", self.descriptor);
        for path in self.all_files() {
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("failed to delete {}: {}", path.display(), e);
                }
            }
        }
    }
}

impl std::fmt::Debug for SSTableReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SSTableReader")
            .field("descriptor", &self.descriptor.to_string())
            .field("offline", &self.offline)
            .field("refs", &self.refs.count())
            .finish()
    }
}
