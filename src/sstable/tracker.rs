use log::debug;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::descriptor::SSTableId;
use super::reader::SSTableReader;
use super::refs::Ref;

/// Live ("canonical") sstable set of a table. The tracker owns each reader's self-reference.
#[derive(Default)]
pub struct Tracker {
    live: RwLock<BTreeMap<SSTableId, Ref<SSTableReader>>>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reader, taking over its self-reference.
    /// A reader already tracked under the same id is replaced and released.
    pub fn add(&self, reader: Ref<SSTableReader>) -> Arc<SSTableReader> {
        let handle = reader.get().clone();
        let id = handle.descriptor().id.clone();
        let prev = self
            .live
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, reader);
        drop(prev);
        handle
    }

    /// Snapshot of the current canonical readers.
    pub fn canonical(&self) -> Vec<Arc<SSTableReader>> {
        self.live
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|r| r.get().clone())
            .collect()
    }

    pub fn get(&self, id: &SSTableId) -> Option<Arc<SSTableReader>> {
        self.live
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(|r| r.get().clone())
    }

    pub fn len(&self) -> usize {
        self.live.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove a reader from the live set and drop the tracker's self-reference.
    /// With `delete`, the files go away once the last outstanding reference is released.
    pub fn retire(&self, id: &SSTableId, delete: bool) -> bool {
        let removed = self
            .live
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        match removed {
            Some(r) => {
                if delete {
                    r.mark_obsolete();
                }
                debug!("retire sstable {} (delete={})", r.descriptor(), delete);
                r.release();
                true
            }
            None => false,
        }
    }
}
