//! Stable ID newtypes for topology entities.
//!
//! Entity ids are distinct newtype wrappers over [`Uuid`], so a `NodeId` cannot
//! be used where a `LinkId` is expected. Backend and appliance ids are opaque
//! strings chosen by whoever registered them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Project identity. Assigned once and never reallocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub Uuid);

/// Node identity within a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub Uuid);

/// Link identity within a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(pub Uuid);

/// Drawing identity within a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrawingId(pub Uuid);

/// Snapshot identity, derived from the archive file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(pub Uuid);

macro_rules! random_id {
    ($($ty:ident),+) => {
        $(
            impl $ty {
                /// Generates a fresh random (v4) identifier.
                pub fn new() -> Self {
                    $ty(Uuid::new_v4())
                }
            }

            impl Default for $ty {
                fn default() -> Self {
                    Self::new()
                }
            }

            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl FromStr for $ty {
                type Err = uuid::Error;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    Uuid::parse_str(s).map($ty)
                }
            }
        )+
    };
}

random_id!(ProjectId, NodeId, LinkId, DrawingId);

/// Namespace for snapshot ids so the same file name always maps to the same id.
const SNAPSHOT_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6e, 0x65, 0x74, 0x6c, 0x61, 0x62, 0x2d, 0x73, 0x6e, 0x61, 0x70, 0x73, 0x68, 0x6f, 0x74, 0x73,
]);

impl SnapshotId {
    /// Derives the id of the snapshot stored in `filename`.
    pub fn from_filename(filename: &str) -> Self {
        SnapshotId(Uuid::new_v5(&SNAPSHOT_NAMESPACE, filename.as_bytes()))
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a compute backend.
///
/// `"local"` is distinguished: it is the only backend sharing a filesystem
/// with the controller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComputeId(pub String);

impl ComputeId {
    pub const LOCAL: &'static str = "local";

    pub fn new(id: impl Into<String>) -> Self {
        ComputeId(id.into())
    }

    pub fn local() -> Self {
        ComputeId(Self::LOCAL.to_string())
    }

    pub fn is_local(&self) -> bool {
        self.0 == Self::LOCAL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComputeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a node template ("appliance").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplianceId(pub String);

impl ApplianceId {
    pub fn new(id: impl Into<String>) -> Self {
        ApplianceId(id.into())
    }
}

impl fmt::Display for ApplianceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
