//! Open, close, delete and duplicate.
//!
//! Opening replays the topology document against the computes. The document
//! is backed up first; any failure while replaying closes the project on
//! every compute it reached and puts the backup back, so a failed open never
//! leaves a half-written document behind.

use std::fs;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use netlab_core::{ProjectId, ProjectStatus};

use super::Project;
use crate::archive::{export_project, import_project, ExportOptions};
use crate::compute::{Compute, Timeout};
use crate::error::ControllerError;

const LOAD_POLL_INTERVAL: Duration = Duration::from_millis(500);

impl Project {
    /// Opens the project and replays its topology.
    ///
    /// Opening an opened project is a no-op. Replay failures roll back and
    /// surface as conflicts.
    pub async fn open(self: &Arc<Self>) -> Result<(), ControllerError> {
        let _load = self.gates.load().await;
        if self.status() == ProjectStatus::Opened {
            return Ok(());
        }

        self.reset()?;
        self.loading.store(true, Ordering::SeqCst);
        self.set_status(ProjectStatus::Opened);

        let file = self.topology_file();
        if !file.exists() {
            self.loading.store(false, Ordering::SeqCst);
            return Ok(());
        }
        if let Err(err) = file.backup() {
            warn!("Could not back up topology of project {}: {}", self.id, err);
        }

        if let Err(err) = self.load_document().await {
            warn!("Could not open project {}: {}", self.id, err);
            self.rollback().await;
            return Err(err.backend_as_conflict());
        }

        if let Err(err) = file.discard_backup() {
            warn!("Could not remove topology backup of {}: {}", self.id, err);
        }
        self.loading.store(false, Ordering::SeqCst);
        info!("Project {} opened ({} nodes)", self.id, self.nodes.len());

        if self.settings().auto_start {
            let project = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(err) = project.start_all().await {
                    warn!("Auto start of project {} failed: {}", project.id, err);
                }
            });
        }
        Ok(())
    }

    async fn load_document(&self) -> Result<(), ControllerError> {
        let document = self.topology_file().load()?;
        *self.settings.write() = document.settings;
        let controller = self.controller()?;

        for spec in document.topology.computes {
            controller.add_compute(spec);
        }

        for record in document.topology.nodes {
            let compute = controller.get_compute(&record.compute_id)?;
            let name = record.name.clone();
            let node_id = record.node_id;
            self.add_node_inner(compute, &name, node_id, record.into_options(), false)
                .await?;
        }

        for record in document.topology.links {
            let Some(link_id) = record.link_id else {
                continue;
            };
            let link = self.add_link_inner(Some(link_id), false)?;
            if let Some(filters) = record.filters {
                link.update_filters(filters);
            }
            for endpoint in record.nodes {
                let node = self.get_node(endpoint.node_id)?;
                if node
                    .port_link(endpoint.adapter_number, endpoint.port_number)
                    .is_some()
                {
                    continue;
                }
                link.add_node(
                    &node,
                    endpoint.adapter_number,
                    endpoint.port_number,
                    endpoint.label,
                )
                .await?;
            }
            if !link.is_complete() {
                self.delete_link(link_id, true).await?;
            }
        }

        for record in document.topology.drawings {
            self.add_drawing_inner(record, false)?;
        }

        self.dump()
    }

    /// Undoes a failed open: backends first, then the in-memory state and
    /// the document.
    async fn rollback(&self) {
        self.close_on_computes().await;
        if let Err(err) = self.reset() {
            warn!("Could not reset project {}: {}", self.id, err);
        }
        if let Err(err) = self.topology_file().restore_backup() {
            warn!("Could not restore topology of project {}: {}", self.id, err);
        }
        self.set_status(ProjectStatus::Closed);
        self.loading.store(false, Ordering::SeqCst);
    }

    async fn close_on_computes(&self) {
        let computes: Vec<Arc<dyn Compute>> = self.provisioned.lock().values().cloned().collect();
        let path = format!("/projects/{}/close", self.id);
        for compute in computes {
            if let Err(err) = compute.post(&path, Value::Null, Timeout::Default).await {
                warn!("Could not close project {} on {}: {}", self.id, compute.id(), err);
            }
        }
    }

    /// Stops every node, releases the computes and drops the in-memory state.
    ///
    /// Failures along the way are logged; closing always completes.
    pub async fn close(&self, ignore_notification: bool) {
        if let Err(err) = self.stop_all().await {
            warn!("Could not stop all nodes of project {}: {}", self.id, err);
        }
        self.close_on_computes().await;
        self.clean_pictures();
        self.set_status(ProjectStatus::Closed);
        if !ignore_notification {
            self.notification.emit("project.closed", &self.to_record());
        }
        if let Err(err) = self.reset() {
            warn!("Could not reset project {}: {}", self.id, err);
        }
    }

    /// Deletes the project from every compute and from disk.
    pub async fn delete(self: &Arc<Self>) -> Result<(), ControllerError> {
        if self.status() != ProjectStatus::Opened {
            match self.open().await {
                Ok(()) => {}
                Err(err @ ControllerError::Conflict(_)) => {
                    warn!("Deleting project {} that could not be opened: {}", self.id, err)
                }
                Err(err) => return Err(err),
            }
        }
        self.delete_on_computes().await?;
        self.close(false).await;

        fs::remove_dir_all(&self.path).map_err(|err| {
            ControllerError::Conflict(format!(
                "Can not delete project directory {}: {}",
                self.path.display(),
                err
            ))
        })?;
        info!("Project {} deleted", self.id);
        Ok(())
    }

    /// Deletes the project from every remote compute it was provisioned on.
    ///
    /// Stops at the first failure; computes not yet reached stay provisioned.
    pub(super) async fn delete_on_computes(&self) -> Result<(), ControllerError> {
        let remote: Vec<Arc<dyn Compute>> = self
            .provisioned
            .lock()
            .values()
            .filter(|c| !c.id().is_local())
            .cloned()
            .collect();
        let path = format!("/projects/{}", self.id);
        for compute in remote {
            compute.delete(&path).await?;
            self.provisioned.lock().remove(compute.id());
        }
        Ok(())
    }

    /// Resolves once no open is in progress.
    pub async fn wait_loaded(&self) {
        while self.is_loading() {
            tokio::time::sleep(LOAD_POLL_INTERVAL).await;
        }
    }

    /// Copies the project into a new one, registered closed.
    ///
    /// A closed project is opened for the copy and closed again afterwards.
    pub async fn duplicate(
        self: &Arc<Self>,
        name: Option<&str>,
        location: Option<&Path>,
    ) -> Result<Arc<Project>, ControllerError> {
        let was_closed = self.status() == ProjectStatus::Closed;
        if was_closed {
            self.open().await?;
        }

        let copy = self.copy_into(name, location).await;

        if was_closed {
            self.close(false).await;
        }
        copy.map_err(|err| match err {
            ControllerError::InternalError(msg) => {
                ControllerError::Conflict(format!("Can not duplicate project: {}", msg))
            }
            other => other,
        })
    }

    async fn copy_into(
        &self,
        name: Option<&str>,
        location: Option<&Path>,
    ) -> Result<Arc<Project>, ControllerError> {
        self.dump()?;
        let archive = export_project(self, ExportOptions::faithful())?;
        let controller = self.controller()?;
        import_project(&controller, ProjectId::new(), &archive, location, name, true).await
    }
}
