//! Snapshots: point-in-time archives stored in the project's `snapshots/`
//! directory.

use std::path::Path;

use serde::Serialize;

use netlab_core::{ProjectId, SnapshotId};
use netlab_storage::SnapshotFile;

/// Serialized form of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotRecord {
    pub snapshot_id: SnapshotId,
    pub name: String,
    /// Seconds since the epoch, when the file name carries a timestamp.
    pub created_at: Option<i64>,
    pub project_id: ProjectId,
}

#[derive(Debug)]
pub struct Snapshot {
    project_id: ProjectId,
    file: SnapshotFile,
}

impl Snapshot {
    pub fn new(project_id: ProjectId, file: SnapshotFile) -> Self {
        Snapshot { project_id, file }
    }

    pub fn id(&self) -> SnapshotId {
        self.file.id
    }

    pub fn name(&self) -> &str {
        &self.file.name
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }

    pub fn to_record(&self) -> SnapshotRecord {
        SnapshotRecord {
            snapshot_id: self.file.id,
            name: self.file.name.clone(),
            created_at: self.file.created_at.map(|t| t.timestamp()),
            project_id: self.project_id,
        }
    }
}
