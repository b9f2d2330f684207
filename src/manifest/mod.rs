//! Snapshot manifests:
//! - codec.rs: SnapshotManifest JSON (read/write, atomic tmp+rename).
//! - scan.rs: snapshot directory listing (index dirs flattened), data files, folder size.
//! - repair.rs: create/enrich manifests across the directories of one snapshot.

mod codec;
mod repair;
mod scan;

pub use codec::{manifest_path, SnapshotManifest};
pub use repair::{repair_manifests, KnownMetadata, RepairReport};
pub use scan::{data_files, file_size, folder_size, is_secondary_index_folder, list_snapshot_files};
