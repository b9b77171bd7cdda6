//! The project aggregate.
//!
//! A [`Project`] owns the node, link, drawing and snapshot collections of one
//! lab and is the only thing allowed to mutate them. Mutations go through a
//! small set of rules:
//!
//! - anything touching the collections requires the project to be opened
//!   ([`Project::ensure_opened`])
//! - node creation, link teardown and topology load each run under their own
//!   gate ([`ProjectGates`])
//! - every completed mutation persists the topology document and emits a
//!   notification carrying the serialized entity
//!
//! The implementation is split by concern: `lifecycle` (open/close/delete/
//! duplicate), `topology` (nodes, links, drawings), `snapshots`, `batch`
//! (start/stop/suspend fan-outs).

mod batch;
mod lifecycle;
mod snapshots;
mod topology;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use netlab_core::{
    ComputeId, DrawingId, LinkId, NameAllocator, NodeId, ProjectId, ProjectRecord,
    ProjectSettings, ProjectStatus, ProjectUpdate, SnapshotId,
};
use netlab_storage::{discover_snapshots, ProjectLayout, TopologyDocument, TopologyFile};

use crate::compute::Compute;
use crate::config::ControllerConfig;
use crate::controller::Controller;
use crate::drawing::Drawing;
use crate::error::ControllerError;
use crate::gate::ProjectGates;
use crate::link::Link;
use crate::node::Node;
use crate::notification::NotificationBus;
use crate::snapshot::Snapshot;

/// Parameters of a new project.
#[derive(Debug, Clone, Default)]
pub struct ProjectParams {
    pub name: String,
    /// Textual UUID; a fresh id is generated when absent.
    pub project_id: Option<String>,
    /// Defaults to `<projects_path>/<project_id>`.
    pub path: Option<PathBuf>,
    /// Defaults to `<name>.gns3`.
    pub filename: Option<String>,
    /// Defaults to opened.
    pub status: Option<ProjectStatus>,
    pub settings: ProjectSettings,
}

impl ProjectParams {
    pub fn new(name: impl Into<String>) -> Self {
        ProjectParams {
            name: name.into(),
            ..Self::default()
        }
    }
}

pub struct Project {
    id: ProjectId,
    controller: Weak<Controller>,
    config: Arc<ControllerConfig>,
    notification: NotificationBus,
    path: PathBuf,
    filename: String,
    name: RwLock<String>,
    status: RwLock<ProjectStatus>,
    settings: RwLock<ProjectSettings>,
    loading: AtomicBool,
    nodes: DashMap<NodeId, Arc<Node>>,
    links: DashMap<LinkId, Arc<Link>>,
    drawings: DashMap<DrawingId, Arc<Drawing>>,
    snapshots: DashMap<SnapshotId, Arc<Snapshot>>,
    names: Mutex<NameAllocator>,
    provisioned: Mutex<HashMap<ComputeId, Arc<dyn Compute>>>,
    gates: ProjectGates,
}

impl Project {
    /// Builds a project, creating its directory and an initial topology
    /// document if none exists yet.
    pub fn create(
        controller: &Arc<Controller>,
        params: ProjectParams,
    ) -> Result<Arc<Self>, ControllerError> {
        let config = controller.config().clone();

        let id = match params.project_id.as_deref() {
            None => {
                if let Some(path) = &params.path {
                    if path.exists() {
                        return Err(ControllerError::Forbidden(format!(
                            "The path {} already exist.",
                            path.display()
                        )));
                    }
                }
                ProjectId::new()
            }
            Some(text) => text.parse::<ProjectId>().map_err(|_| {
                ControllerError::BadRequest(format!("{} is not a valid UUID", text))
            })?,
        };

        let path = params
            .path
            .unwrap_or_else(|| config.projects_path.join(id.to_string()));
        prepare_directory(&config, &path)?;
        let filename = params
            .filename
            .unwrap_or_else(|| format!("{}.gns3", params.name));

        let project = Arc::new(Project {
            id,
            controller: Arc::downgrade(controller),
            notification: controller.notification().clone(),
            names: Mutex::new(NameAllocator::with_search_limit(config.name_search_limit)),
            config,
            path,
            filename,
            name: RwLock::new(params.name),
            status: RwLock::new(params.status.unwrap_or(ProjectStatus::Opened)),
            settings: RwLock::new(params.settings),
            loading: AtomicBool::new(false),
            nodes: DashMap::new(),
            links: DashMap::new(),
            drawings: DashMap::new(),
            snapshots: DashMap::new(),
            provisioned: Mutex::new(HashMap::new()),
            gates: ProjectGates::new(),
        });

        project.reset()?;
        if !project.topology_file().exists() {
            project.dump()?;
        }
        Ok(project)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> ProjectId {
        self.id
    }

    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn status(&self) -> ProjectStatus {
        *self.status.read()
    }

    fn set_status(&self, status: ProjectStatus) {
        *self.status.write() = status;
    }

    pub fn settings(&self) -> ProjectSettings {
        self.settings.read().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn layout(&self) -> ProjectLayout {
        ProjectLayout::new(&self.path)
    }

    pub fn topology_file(&self) -> TopologyFile {
        TopologyFile::new(&self.path, &self.filename)
    }

    pub fn captures_dir(&self) -> Result<PathBuf, ControllerError> {
        self.layout().captures_dir().map_err(|err| {
            ControllerError::InternalError(format!("Could not create captures directory: {}", err))
        })
    }

    pub fn pictures_dir(&self) -> Result<PathBuf, ControllerError> {
        self.layout().pictures_dir().map_err(|err| {
            ControllerError::InternalError(format!("Could not create pictures directory: {}", err))
        })
    }

    /// Computes the project is currently provisioned on.
    pub fn computes(&self) -> Vec<ComputeId> {
        let mut ids: Vec<ComputeId> = self.provisioned.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub(crate) fn controller(&self) -> Result<Arc<Controller>, ControllerError> {
        self.controller.upgrade().ok_or_else(|| {
            ControllerError::InternalError("The controller has been shut down".to_string())
        })
    }

    /// Fails with Forbidden unless the project is opened.
    pub fn ensure_opened(&self) -> Result<(), ControllerError> {
        if self.status() != ProjectStatus::Opened {
            return Err(ControllerError::Forbidden(
                "The project is not opened".to_string(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Name allocation
    // -----------------------------------------------------------------------

    /// Allocates a unique node name derived from `base_name`.
    pub fn update_allocated_node_name(&self, base_name: &str) -> Result<String, ControllerError> {
        Ok(self.names.lock().allocate(base_name)?)
    }

    pub fn remove_allocated_node_name(&self, name: &str) {
        self.names.lock().release(name);
    }

    // -----------------------------------------------------------------------
    // State
    // -----------------------------------------------------------------------

    /// Clears every collection and rediscovers snapshots from disk.
    ///
    /// The topology document is left untouched.
    pub fn reset(&self) -> Result<(), ControllerError> {
        self.nodes.clear();
        self.links.clear();
        self.drawings.clear();
        self.snapshots.clear();
        self.names.lock().clear();
        self.provisioned.lock().clear();

        for file in discover_snapshots(&self.path)? {
            self.snapshots
                .insert(file.id, Arc::new(Snapshot::new(self.id, file)));
        }
        Ok(())
    }

    /// Serialized project metadata, as sent in project notifications.
    pub fn to_record(&self) -> ProjectRecord {
        ProjectRecord {
            name: self.name(),
            project_id: self.id,
            path: self.path.clone(),
            filename: self.filename.clone(),
            status: self.status(),
            settings: self.settings(),
        }
    }

    /// Serializes the whole aggregate into a topology document.
    pub fn to_topology(&self) -> TopologyDocument {
        let mut document = TopologyDocument::new(self.name(), self.id, self.settings());

        let mut computes: HashMap<ComputeId, Arc<dyn Compute>> = HashMap::new();
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for entry in self.nodes.iter() {
            let node = entry.value();
            computes
                .entry(node.compute_id().clone())
                .or_insert_with(|| node.compute().clone());
            nodes.push(node.to_record(true));
        }
        nodes.sort_by(|a, b| a.name.cmp(&b.name));

        let mut compute_specs: Vec<_> = computes.values().map(|c| c.spec()).collect();
        compute_specs.sort_by(|a, b| a.compute_id.cmp(&b.compute_id));

        let mut links: Vec<_> = self.links.iter().map(|l| l.to_record(true)).collect();
        links.sort_by_key(|l| l.link_id);
        let mut drawings: Vec<_> = self.drawings.iter().map(|d| d.to_record(true)).collect();
        drawings.sort_by_key(|d| d.drawing_id);

        document.topology.computes = compute_specs;
        document.topology.nodes = nodes;
        document.topology.links = links;
        document.topology.drawings = drawings;
        document
    }

    /// Atomically writes the topology document.
    pub fn dump(&self) -> Result<(), ControllerError> {
        let document = self.to_topology();
        self.topology_file().write(&document).map_err(|err| {
            ControllerError::InternalError(format!("Could not write topology: {}", err))
        })
    }

    /// Applies a partial update. Notifies and persists only on change.
    pub fn update(&self, update: ProjectUpdate) -> Result<(), ControllerError> {
        let before = self.to_record();
        if let Some(name) = &update.name {
            *self.name.write() = name.clone();
        }
        update.apply_to(&mut self.settings.write());

        let after = self.to_record();
        if after != before {
            self.notification.emit("project.updated", &after);
            self.dump()?;
        }
        Ok(())
    }

    /// Deletes pictures no drawing references anymore.
    fn clean_pictures(&self) {
        let referenced: HashSet<String> = self
            .drawings
            .iter()
            .filter_map(|d| d.resource_filename().map(str::to_string))
            .collect();
        match self.layout().clean_pictures(&referenced) {
            Ok(removed) if !removed.is_empty() => {
                tracing::debug!("Removed {} unused picture(s) from {}", removed.len(), self.id)
            }
            Ok(_) => {}
            Err(err) => tracing::warn!("Could not clean pictures of project {}: {}", self.id, err),
        }
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("status", &self.status())
            .finish()
    }
}

fn prepare_directory(config: &ControllerConfig, path: &Path) -> Result<(), ControllerError> {
    config.check_path_allowed(path)?;
    if path.to_string_lossy().contains('"') {
        return Err(ControllerError::Forbidden(
            "You are not allowed to use \" in the project directory path".to_string(),
        ));
    }
    fs::create_dir_all(path).map_err(|err| {
        ControllerError::InternalError(format!(
            "Could not create project directory {}: {}",
            path.display(),
            err
        ))
    })
}
