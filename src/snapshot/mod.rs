//! Table snapshots, split into submodules:
//! - table_snapshot.rs: TableSnapshot (identity, timestamps, size accounting, lifecycle).
//! - builder.rs: TableSnapshotBuilder (multi-directory accumulation + manifest repair).
//! - live_path.rs: snapshot file -> live file path mapping.
//! - resolver.rs: snapshot -> ref-counted sstable readers (SnapshotSource seam).
//! - details.rs: SnapshotDetails summary rows.
//! - loader.rs: discovery of snapshots across data roots, clearing.

mod builder;
mod details;
mod live_path;
mod loader;
mod resolver;
mod table_snapshot;

pub use builder::TableSnapshotBuilder;
pub use details::{SnapshotDetails, ITEM_NAMES};
pub use live_path::live_file_for_snapshot_file;
pub use loader::{clear_expired, clear_snapshot, SnapshotLoader};
pub use resolver::{snapshot_descriptors, snapshot_sstable_readers, SnapshotSource};
pub use table_snapshot::{build_snapshot_id, TableSnapshot};
