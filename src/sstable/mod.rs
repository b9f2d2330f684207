//! SSTable collaborators of the snapshot subsystem:
//! - descriptor.rs: file name parsing (Descriptor, SSTableId, Component).
//! - refs.rs: reference counting (RefState, Ref, Refs).
//! - reader.rs: SSTableReader (open/offline, deferred deletion on last release).
//! - tracker.rs: Tracker, the live/canonical sstable set of a table.

mod descriptor;
mod reader;
mod refs;
mod tracker;

pub use descriptor::{Component, Descriptor, SSTableId};
pub use reader::SSTableReader;
pub use refs::{Ref, RefCounted, RefState, Refs};
pub use tracker::Tracker;
