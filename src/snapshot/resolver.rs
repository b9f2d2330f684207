//! Snapshot -> sstable readers, reusing live readers where possible.
//!
//! For every sstable of the snapshot listing:
//! - the live reader with the same id is referenced when it is still alive;
//! - otherwise an offline reader is opened on the snapshot files, referenced, and its
//!   self-reference released so the returned set is its only owner.
//! On error every reference taken so far is released before the error propagates.

use anyhow::{anyhow, Context, Result};
use log::{trace, warn};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::directories::SSTableListing;
use crate::metrics::{record_ref_live_reused, record_ref_offline_opened, record_refs_rollback};
use crate::sstable::{Component, Descriptor, Ref, Refs, SSTableId, SSTableReader};

/// What the resolver needs from a table.
pub trait SnapshotSource {
    /// Currently live (canonical) readers.
    fn canonical_sstables(&self) -> Vec<Arc<SSTableReader>>;

    /// sstables of snapshot `tag`, grouped by descriptor.
    fn list_snapshot(&self, tag: &str) -> Result<SSTableListing>;

    /// Open an offline reader on snapshot files; the guard is the reader's self-reference.
    fn open_offline(
        &self,
        descriptor: &Descriptor,
        components: &BTreeSet<Component>,
    ) -> Result<Ref<SSTableReader>>;
}

/// One reference per distinct sstable id of snapshot `tag`. The caller owns the set.
pub fn snapshot_sstable_readers<S>(source: &S, tag: &str) -> Result<Refs<SSTableReader>>
where
    S: SnapshotSource + ?Sized,
{
    let active: HashMap<SSTableId, Arc<SSTableReader>> = source
        .canonical_sstables()
        .into_iter()
        .map(|r| (r.descriptor().id.clone(), r))
        .collect();

    let listing = source
        .list_snapshot(tag)
        .with_context(|| format!("list snapshot {}", tag))?;

    // dropping `refs` on any early return releases what was acquired so far
    let mut refs = Refs::new();
    for (descriptor, components) in &listing {
        if let Some(live) = active.get(&descriptor.id) {
            if refs.try_ref(live) {
                trace!("using active sstable {}", descriptor);
                record_ref_live_reused();
                continue;
            }
        }

        trace!("using snapshot sstable {}", descriptor);
        let opened = match source.open_offline(descriptor, components) {
            Ok(r) => r,
            Err(e) => {
                record_refs_rollback();
                warn!(
                    "failed to open snapshot sstable {}, releasing {} reference(s): {:#}",
                    descriptor,
                    refs.len(),
                    e
                );
                return Err(e.context(format!("open snapshot sstable {}", descriptor)));
            }
        };
        if !refs.try_ref(opened.get()) {
            record_refs_rollback();
            return Err(anyhow!("freshly opened sstable {} already released", descriptor));
        }
        record_ref_offline_opened();
        // the snapshot reader is never tracked, so its self-reference goes now
        opened.release();
    }

    Ok(refs)
}

/// Descriptors of the sstables in snapshot `tag`.
pub fn snapshot_descriptors<S>(source: &S, tag: &str) -> Result<BTreeSet<Descriptor>>
where
    S: SnapshotSource + ?Sized,
{
    let refs = snapshot_sstable_readers(source, tag)?;
    let out = refs.iter().map(|r| r.descriptor().clone()).collect();
    refs.release();
    Ok(out)
}
