//! Portable project archives.
//!
//! Export serializes an opened project and its `project-files/` tree into an
//! in-memory tar archive; import unpacks one into a new project directory and
//! registers it with the controller. Snapshots and project duplication are
//! both built on this pair.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use netlab_core::{ComputeId, ProjectId};
use netlab_storage::{pack_project, unpack_project, TopologyDocument, TopologyFile};

use crate::controller::Controller;
use crate::error::ControllerError;
use crate::project::Project;

/// Knobs of [`export_project`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    /// Keep nodes bound to their compute instead of rebinding them to `local`.
    pub keep_compute_id: bool,
    /// Export nodes whose data cannot travel with the archive.
    pub allow_all_nodes: bool,
}

impl ExportOptions {
    /// Options used for snapshots and duplication: a faithful copy.
    pub fn faithful() -> Self {
        ExportOptions {
            keep_compute_id: true,
            allow_all_nodes: true,
        }
    }
}

/// Packs the project into an archive.
pub fn export_project(project: &Project, options: ExportOptions) -> Result<Vec<u8>, ControllerError> {
    project.ensure_opened()?;
    let mut document = project.to_topology();

    if !options.allow_all_nodes {
        if let Some(node) = document
            .topology
            .nodes
            .iter()
            .find(|node| !node.node_type.is_portable())
        {
            return Err(ControllerError::Conflict(format!(
                "Topology with a {} could not be exported",
                node.node_type.as_str()
            )));
        }
    }
    if !options.keep_compute_id {
        rebind_to_local(&mut document);
    }

    Ok(pack_project(project.path(), &document)?)
}

/// Unpacks an archive into a new project and registers it, closed.
///
/// The project lands in `location` when given, else in
/// `<projects_path>/<project_id>`; the destination must be empty. The name
/// defaults to the archived one and is made unique among loaded projects.
pub async fn import_project(
    controller: &Arc<Controller>,
    project_id: ProjectId,
    archive: &[u8],
    location: Option<&Path>,
    name: Option<&str>,
    keep_compute_id: bool,
) -> Result<Arc<Project>, ControllerError> {
    let config = controller.config();
    let dest = location
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.projects_path.join(project_id.to_string()));
    if dest.is_dir() && fs::read_dir(&dest).map(|mut d| d.next().is_some()).unwrap_or(false) {
        return Err(ControllerError::Forbidden(format!(
            "The destination path {} is not empty",
            dest.display()
        )));
    }
    config.check_path_allowed(&dest)?;
    fs::create_dir_all(&dest).map_err(|err| {
        ControllerError::InternalError(format!(
            "Could not create project directory {}: {}",
            dest.display(),
            err
        ))
    })?;

    let unpacked = unpack_project(archive, &dest)?;
    let mut document = unpacked.document;
    let name = controller.free_project_name(name.unwrap_or(&document.name))?;
    document.project_id = project_id;
    document.name = name.clone();
    if !keep_compute_id {
        rebind_to_local(&mut document);
    }

    let file = TopologyFile::new(&dest, &format!("{}.gns3", name));
    file.write(&document).map_err(|err| {
        ControllerError::InternalError(format!("Could not write topology: {}", err))
    })?;
    info!(
        "Imported project {} ({} file(s)) into {}",
        project_id,
        unpacked.files.len(),
        dest.display()
    );

    controller.load_project(file.path(), false).await
}

fn rebind_to_local(document: &mut TopologyDocument) {
    for node in &mut document.topology.nodes {
        node.compute_id = ComputeId::local();
    }
    document.topology.computes.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::project::ProjectParams;

    #[test]
    fn local_rebinding_drops_the_computes_section() {
        let mut document = TopologyDocument::new("lab1", ProjectId::new(), Default::default());
        document.topology.computes.push(netlab_core::ComputeSpec::new(
            ComputeId::new("vm"),
            "10.0.0.2",
            3080,
        ));
        rebind_to_local(&mut document);
        assert!(document.topology.computes.is_empty());
    }

    #[tokio::test]
    async fn import_refuses_a_non_empty_destination() {
        let dir = tempfile::tempdir().unwrap();
        let controller = Controller::new(ControllerConfig::with_projects_path(dir.path()));
        let project = controller.add_project(ProjectParams::new("lab1")).unwrap();
        let archive = export_project(&project, ExportOptions::default()).unwrap();

        let err = import_project(
            &controller,
            ProjectId::new(),
            &archive,
            Some(project.path()),
            None,
            false,
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "FORBIDDEN");
    }

    #[tokio::test]
    async fn import_picks_a_free_name() {
        let dir = tempfile::tempdir().unwrap();
        let controller = Controller::new(ControllerConfig::with_projects_path(dir.path()));
        let project = controller.add_project(ProjectParams::new("lab1")).unwrap();
        let archive = export_project(&project, ExportOptions::default()).unwrap();

        let copy = import_project(&controller, ProjectId::new(), &archive, None, None, false)
            .await
            .unwrap();
        assert_eq!(copy.name(), "lab1-1");
        assert_eq!(copy.filename(), "lab1-1.gns3");
        assert_ne!(copy.id(), project.id());
    }
}
