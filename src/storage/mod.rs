//! Snapshot storage
//!
//! Snapshots live one per file under the suite directory. All access goes
//! through the `Filesystem` trait so tests can swap in `MemoryFilesystem`.

mod fs;
mod memory;
mod snapshot;
mod store;

pub use fs::{Filesystem, OsFilesystem};
pub use memory::MemoryFilesystem;
pub use snapshot::{decode, encode, Snapshot};
pub use store::{EntryState, SnapshotStore};

/// File extension for snapshot files
pub const SNAPSHOT_EXTENSION: &str = "json";
