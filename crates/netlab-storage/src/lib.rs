//! Stable-storage layer for netlab projects.
//!
//! Everything a project keeps on disk goes through this crate:
//!
//! - [`document`]: the versioned topology document and its loader
//! - [`file`]: atomic dump of the document plus the `.backup` protocol used
//!   while a project is being loaded
//! - [`layout`]: the project directory tree (captures, images, snapshots)
//! - [`snapshot`]: snapshot archive naming and discovery
//! - [`archive`]: packing a project directory into a portable tar archive
//!   and unpacking it again
//! - [`error`]: StorageError enum with all failure modes

pub mod archive;
pub mod document;
pub mod error;
pub mod file;
pub mod layout;
pub mod snapshot;

// Re-export key types for ergonomic use.
pub use archive::{pack_project, unpack_project, UnpackedProject, ARCHIVE_TOPOLOGY_ENTRY};
pub use document::{load_topology, Topology, TopologyDocument, TOPOLOGY_REVISION};
pub use error::StorageError;
pub use file::TopologyFile;
pub use layout::ProjectLayout;
pub use snapshot::{discover_snapshots, SnapshotFile, SNAPSHOT_EXTENSION};
