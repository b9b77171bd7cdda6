//! Snapshot creation, deletion and restore.

use std::fs;
use std::io;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use netlab_core::SnapshotId;
use netlab_storage::{unpack_project, SnapshotFile};

use super::Project;
use crate::archive::{export_project, ExportOptions};
use crate::error::ControllerError;
use crate::snapshot::Snapshot;

impl Project {
    pub fn snapshots(&self) -> Vec<Arc<Snapshot>> {
        let mut snapshots: Vec<_> = self.snapshots.iter().map(|e| e.value().clone()).collect();
        snapshots.sort_by(|a, b| a.name().cmp(b.name()));
        snapshots
    }

    pub fn get_snapshot(&self, snapshot_id: SnapshotId) -> Result<Arc<Snapshot>, ControllerError> {
        self.ensure_opened()?;
        self.snapshots
            .get(&snapshot_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| {
                ControllerError::NotFound(format!("Snapshot ID {} doesn't exist", snapshot_id))
            })
    }

    /// Archives the current state of the project under `name`.
    pub fn snapshot(&self, name: &str) -> Result<Arc<Snapshot>, ControllerError> {
        self.ensure_opened()?;
        if self.snapshots.iter().any(|s| s.name() == name) {
            return Err(ControllerError::Conflict(format!(
                "The snapshot name {} already exists",
                name
            )));
        }

        let file = SnapshotFile::create(&self.path, name, Utc::now())?;
        if file.path.exists() {
            return Err(ControllerError::Conflict(format!(
                "The snapshot file '{}' already exists",
                file.filename
            )));
        }

        let archive = export_project(self, ExportOptions::faithful())?;
        let io_error = |err: io::Error| {
            ControllerError::InternalError(format!("Could not create snapshot file: {}", err))
        };
        fs::create_dir_all(self.layout().snapshots_dir()).map_err(io_error)?;
        fs::write(&file.path, archive).map_err(io_error)?;
        info!("Snapshot {} of project {} created", file.filename, self.id);

        let snapshot = Arc::new(Snapshot::new(self.id, file));
        self.snapshots.insert(snapshot.id(), snapshot.clone());
        Ok(snapshot)
    }

    pub fn delete_snapshot(&self, snapshot_id: SnapshotId) -> Result<(), ControllerError> {
        let snapshot = self.get_snapshot(snapshot_id)?;
        self.snapshots.remove(&snapshot_id);
        match fs::remove_file(snapshot.path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ControllerError::Conflict(format!(
                "Can not delete snapshot file {}: {}",
                snapshot.path().display(),
                err
            ))),
        }
    }

    /// Replaces the project content with a snapshot and reopens it.
    ///
    /// A remote compute refusing to drop the project aborts the restore
    /// before anything is touched.
    pub async fn restore_snapshot(self: &Arc<Self>, snapshot_id: SnapshotId) -> Result<(), ControllerError> {
        let snapshot = self.get_snapshot(snapshot_id)?;
        let archive = fs::read(snapshot.path()).map_err(|err| {
            ControllerError::Conflict(format!("Can not read snapshot {}: {}", snapshot.name(), err))
        })?;

        self.delete_on_computes().await?;
        self.close(true).await;

        let project_files = self.layout().project_files_dir();
        if project_files.exists() {
            fs::remove_dir_all(&project_files).map_err(|err| {
                ControllerError::Conflict(format!(
                    "Can not remove {}: {}",
                    project_files.display(),
                    err
                ))
            })?;
        }

        let mut document = unpack_project(archive.as_slice(), &self.path)?.document;
        document.project_id = self.id;
        document.name = self.name();
        self.topology_file().write(&document).map_err(|err| {
            ControllerError::InternalError(format!("Could not write topology: {}", err))
        })?;

        self.notification
            .emit("snapshot.restored", &snapshot.to_record());
        info!("Snapshot {} of project {} restored", snapshot.name(), self.id);
        self.open().await
    }
}
