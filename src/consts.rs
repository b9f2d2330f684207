//! Well-known file and directory names of the on-disk snapshot layout.
//!
//! Layout:
//!   {data_root}/{keyspace}/{table}-{table_id}/                 live sstables
//!   {data_root}/{keyspace}/{table}-{table_id}/.{index}/        live index sstables
//!   {data_root}/{keyspace}/{table}-{table_id}/snapshots/{tag}/ snapshot dir

/// Per-directory snapshot manifest.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Schema sidecar written next to the manifest.
pub const SCHEMA_FILE: &str = "schema.cql";

/// Legacy zero-byte marker of an ephemeral snapshot (superseded by the manifest flag).
pub const EPHEMERAL_MARKER_FILE: &str = "ephemeral.snapshot";

/// Name of the snapshots directory inside a table directory.
pub const SNAPSHOTS_DIR: &str = "snapshots";

/// Prefix of secondary index subdirectories.
pub const INDEX_DIR_PREFIX: char = '.';

/// Suffix of the data component ("-Data.db").
pub const DATA_COMPONENT_SUFFIX: &str = "-Data.db";

/// Suffix of temporary files written by atomic tmp+rename.
pub const TMP_SUFFIX: &str = ".tmp";
