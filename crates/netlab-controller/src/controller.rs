//! The controller: registries of computes, appliances and projects, plus the
//! notification bus every project emits on.
//!
//! Projects hold a weak reference back to the controller; the controller owns
//! them through its project registry.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};

use netlab_core::{ApplianceId, ComputeId, ComputeSpec, ProjectId, ProjectStatus};
use netlab_storage::load_topology;

use crate::appliance::Appliance;
use crate::compute::{Compute, HttpCompute};
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::notification::NotificationBus;
use crate::project::{Project, ProjectParams};

pub struct Controller {
    config: Arc<ControllerConfig>,
    computes: DashMap<ComputeId, Arc<dyn Compute>>,
    appliances: DashMap<ApplianceId, Appliance>,
    projects: DashMap<ProjectId, Arc<Project>>,
    notification: NotificationBus,
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Arc<Self> {
        let notification = NotificationBus::new(config.notification_capacity);
        Arc::new(Controller {
            config: Arc::new(config),
            computes: DashMap::new(),
            appliances: DashMap::new(),
            projects: DashMap::new(),
            notification,
        })
    }

    pub fn config(&self) -> &Arc<ControllerConfig> {
        &self.config
    }

    pub fn notification(&self) -> &NotificationBus {
        &self.notification
    }

    // -----------------------------------------------------------------------
    // Computes
    // -----------------------------------------------------------------------

    /// Registers a compute, replacing any previous one with the same id.
    pub fn register_compute(&self, compute: Arc<dyn Compute>) {
        info!("Registered compute {}", compute.id());
        self.computes.insert(compute.id().clone(), compute);
    }

    /// Returns the compute described by `spec`, connecting a new one over
    /// HTTP if it is not registered yet.
    pub fn add_compute(&self, spec: ComputeSpec) -> Arc<dyn Compute> {
        if let Some(existing) = self.computes.get(&spec.compute_id) {
            return existing.clone();
        }
        let compute: Arc<dyn Compute> =
            Arc::new(HttpCompute::new(spec, self.config.compute_timeout));
        self.register_compute(compute.clone());
        compute
    }

    pub fn get_compute(&self, id: &ComputeId) -> Result<Arc<dyn Compute>, ControllerError> {
        self.computes
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ControllerError::NotFound(format!("Compute ID {} doesn't exist", id)))
    }

    pub fn computes(&self) -> Vec<Arc<dyn Compute>> {
        self.computes.iter().map(|e| e.value().clone()).collect()
    }

    // -----------------------------------------------------------------------
    // Appliances
    // -----------------------------------------------------------------------

    pub fn add_appliance(&self, appliance: Appliance) {
        self.appliances
            .insert(appliance.appliance_id.clone(), appliance);
    }

    pub fn get_appliance(&self, id: &ApplianceId) -> Result<Appliance, ControllerError> {
        self.appliances
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ControllerError::NotFound(format!("Appliance {} doesn't exist", id)))
    }

    // -----------------------------------------------------------------------
    // Projects
    // -----------------------------------------------------------------------

    /// Creates and registers a project. An already registered id is returned
    /// as is; a name already used by another project is a conflict.
    pub fn add_project(
        self: &Arc<Self>,
        params: ProjectParams,
    ) -> Result<Arc<Project>, ControllerError> {
        if let Some(id) = params.project_id.as_deref() {
            if let Some(existing) = id.parse::<ProjectId>().ok().and_then(|id| self.projects.get(&id)) {
                return Ok(existing.clone());
            }
        }
        if self.projects.iter().any(|p| p.name() == params.name) {
            return Err(ControllerError::Conflict(format!(
                "Project name \"{}\" already exists",
                params.name
            )));
        }
        let project = Project::create(self, params)?;
        self.projects.insert(project.id(), project.clone());
        Ok(project)
    }

    /// Registers the project whose topology document is at `path`.
    ///
    /// The project starts closed and is opened when `open` is set or its
    /// `auto_open` flag is on.
    pub async fn load_project(
        self: &Arc<Self>,
        path: &Path,
        open: bool,
    ) -> Result<Arc<Project>, ControllerError> {
        let document = load_topology(path)?;
        if let Some(existing) = self.projects.get(&document.project_id) {
            return Ok(existing.clone());
        }
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| ControllerError::BadRequest(format!("{} has no parent", path.display())))?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| ControllerError::BadRequest(format!("{} is not a file", path.display())))?;

        let auto_open = document.settings.auto_open;
        let project = Project::create(
            self,
            ProjectParams {
                name: document.name,
                project_id: Some(document.project_id.to_string()),
                path: Some(dir),
                filename: Some(filename),
                status: Some(ProjectStatus::Closed),
                settings: document.settings,
            },
        )?;
        self.projects.insert(project.id(), project.clone());
        if open || auto_open {
            project.open().await?;
        }
        Ok(project)
    }

    /// Loads every project found in the projects directory.
    pub async fn load_projects(self: &Arc<Self>) -> Result<usize, ControllerError> {
        let root = &self.config.projects_path;
        fs::create_dir_all(root).map_err(|err| {
            ControllerError::InternalError(format!(
                "Could not create projects directory {}: {}",
                root.display(),
                err
            ))
        })?;
        let entries = fs::read_dir(root)
            .map_err(|err| ControllerError::InternalError(err.to_string()))?;

        let mut loaded = 0;
        for entry in entries.flatten() {
            let Some(document) = find_topology(&entry.path()) else {
                continue;
            };
            match self.load_project(&document, false).await {
                Ok(_) => loaded += 1,
                Err(err) => warn!("Could not load project {}: {}", document.display(), err),
            }
        }
        Ok(loaded)
    }

    pub fn get_project(&self, id: ProjectId) -> Result<Arc<Project>, ControllerError> {
        self.projects
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ControllerError::NotFound(format!("Project ID {} doesn't exist", id)))
    }

    pub fn projects(&self) -> Vec<Arc<Project>> {
        self.projects.iter().map(|e| e.value().clone()).collect()
    }

    /// Deletes a project everywhere and forgets it.
    pub async fn delete_project(self: &Arc<Self>, id: ProjectId) -> Result<(), ControllerError> {
        let project = self.get_project(id)?;
        project.delete().await?;
        self.projects.remove(&id);
        Ok(())
    }

    /// `name`, or `name-N` with the smallest N no registered project uses.
    pub fn free_project_name(&self, name: &str) -> Result<String, ControllerError> {
        let taken = |candidate: &str| self.projects.iter().any(|p| p.name() == candidate);
        if !taken(name) {
            return Ok(name.to_string());
        }
        (1..self.config.name_search_limit)
            .map(|i| format!("{}-{}", name, i))
            .find(|candidate| !taken(candidate))
            .ok_or_else(|| {
                ControllerError::Conflict("A project name could not be allocated".to_string())
            })
    }

    /// Closes every opened project without notifying subscribers.
    pub async fn close_projects(&self) {
        for project in self.projects() {
            if project.status() == ProjectStatus::Opened {
                project.close(true).await;
            }
        }
    }
}

fn find_topology(dir: &Path) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }
    let mut candidates: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "gns3"))
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(dir: &Path) -> Arc<Controller> {
        Controller::new(ControllerConfig::with_projects_path(dir))
    }

    #[test]
    fn unknown_compute_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = controller(dir.path())
            .get_compute(&ComputeId::new("ghost"))
            .err()
            .unwrap();
        assert_eq!(err.kind(), "NOT_FOUND");
    }

    #[test]
    fn add_compute_reuses_registered_backends() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(dir.path());
        let spec = ComputeSpec::new(ComputeId::new("vm"), "10.0.0.2", 3080);
        let first = controller.add_compute(spec.clone());
        let second = controller.add_compute(spec);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(controller.computes().len(), 1);
    }

    #[test]
    fn project_names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(dir.path());
        controller.add_project(ProjectParams::new("lab1")).unwrap();
        let err = controller.add_project(ProjectParams::new("lab1")).unwrap_err();
        assert_eq!(err.kind(), "CONFLICT");
        assert_eq!(controller.free_project_name("lab1").unwrap(), "lab1-1");
        assert_eq!(controller.free_project_name("lab2").unwrap(), "lab2");
    }

    #[test]
    fn restricted_controller_refuses_paths_outside_projects() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ControllerConfig::with_projects_path(dir.path().join("projects"));
        config.restrict_project_paths = true;
        let controller = Controller::new(config);

        let err = controller
            .add_project(ProjectParams {
                path: Some(dir.path().join("projects").join("..").join("outside")),
                ..ProjectParams::new("lab1")
            })
            .unwrap_err();
        assert_eq!(err.kind(), "FORBIDDEN");
        assert!(!dir.path().join("outside").exists());
        assert!(controller.projects().is_empty());
    }

    #[tokio::test]
    async fn projects_directory_is_scanned() {
        let dir = tempfile::tempdir().unwrap();
        let first = controller(dir.path());
        let project = first.add_project(ProjectParams::new("lab1")).unwrap();

        let second = controller(dir.path());
        assert_eq!(second.load_projects().await.unwrap(), 1);
        let loaded = second.get_project(project.id()).unwrap();
        assert_eq!(loaded.name(), "lab1");
        assert_eq!(loaded.status(), ProjectStatus::Closed);
    }
}
