// Base modules
pub mod consts;
pub mod config;
pub mod metrics;
pub mod util;

pub mod manifest;    // src/manifest/{mod,codec,scan,repair}.rs
pub mod sstable;     // src/sstable/{mod,descriptor,refs,reader,tracker}.rs
pub mod directories;
pub mod table;
pub mod snapshot;    // src/snapshot/{mod,table_snapshot,builder,live_path,resolver,details,loader}.rs

pub mod cli;

// Re-exports
pub use config::{SnapshotConfig, SnapshotConfigBuilder};
pub use manifest::SnapshotManifest;
pub use snapshot::{
    live_file_for_snapshot_file, snapshot_descriptors, snapshot_sstable_readers, SnapshotDetails,
    SnapshotLoader, SnapshotSource, TableSnapshot, TableSnapshotBuilder,
};
pub use sstable::{Ref, Refs, SSTableReader};
pub use table::Table;
