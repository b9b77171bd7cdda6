//! Node, link and drawing operations of a project.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{info, warn};

use netlab_core::{
    next_application_id, ApplianceId, ComputeId, DrawingId, DrawingRecord, LinkId, NodeId,
    NodeOptions,
};

use super::Project;
use crate::compute::{Compute, Timeout};
use crate::drawing::Drawing;
use crate::error::ControllerError;
use crate::link::Link;
use crate::node::Node;

impl Project {
    // -----------------------------------------------------------------------
    // Nodes
    // -----------------------------------------------------------------------

    pub fn nodes(&self) -> Vec<Arc<Node>> {
        self.nodes.iter().map(|e| e.value().clone()).collect()
    }

    pub fn get_node(&self, node_id: NodeId) -> Result<Arc<Node>, ControllerError> {
        self.ensure_opened()?;
        self.nodes
            .get(&node_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| ControllerError::NotFound(format!("Node ID {} doesn't exist", node_id)))
    }

    /// Creates a node, or returns the existing node with this id.
    pub async fn add_node(
        &self,
        compute: Arc<dyn Compute>,
        name: &str,
        node_id: NodeId,
        options: NodeOptions,
    ) -> Result<Arc<Node>, ControllerError> {
        self.add_node_inner(compute, name, node_id, options, true)
            .await
    }

    pub(super) async fn add_node_inner(
        &self,
        compute: Arc<dyn Compute>,
        name: &str,
        node_id: NodeId,
        mut options: NodeOptions,
        dump: bool,
    ) -> Result<Arc<Node>, ControllerError> {
        self.ensure_opened()?;
        if let Some(existing) = self.nodes.get(&node_id) {
            return Ok(existing.clone());
        }

        let _creation = self.gates.creation().await;
        if let Some(existing) = self.nodes.get(&node_id) {
            return Ok(existing.clone());
        }

        if options.node_type.requires_application_id() && options.application_id().is_none() {
            let used = self.nodes.iter().filter_map(|n| n.application_id());
            let application_id = next_application_id(used)?;
            options
                .properties
                .insert("application_id".to_string(), json!(application_id));
        }

        let name = self.update_allocated_node_name(name)?;
        let node = Arc::new(Node::new(self.id, compute.clone(), node_id, name.clone(), options));

        let created = async {
            self.provision(&compute).await?;
            node.create().await?;
            Ok::<(), ControllerError>(())
        }
        .await;
        if let Err(err) = created {
            self.remove_allocated_node_name(&name);
            return Err(err);
        }

        self.nodes.insert(node_id, node.clone());
        self.notification.emit("node.created", &node.to_record(false));
        if dump {
            self.dump()?;
        }
        Ok(node)
    }

    /// Registers the project on `compute` the first time a node lands there.
    async fn provision(&self, compute: &Arc<dyn Compute>) -> Result<(), ControllerError> {
        if self.provisioned.lock().contains_key(compute.id()) {
            return Ok(());
        }
        let mut body = json!({
            "name": self.name(),
            "project_id": self.id,
        });
        // Only the local compute shares our filesystem.
        if compute.id().is_local() {
            body["path"] = json!(self.path);
        }
        compute.post("/projects", body, Timeout::Default).await?;
        info!("Project {} provisioned on compute {}", self.id, compute.id());
        self.provisioned
            .lock()
            .insert(compute.id().clone(), compute.clone());
        Ok(())
    }

    /// Creates a node from an appliance template.
    ///
    /// The appliance's own compute wins over `compute_id`.
    pub async fn add_node_from_appliance(
        &self,
        appliance_id: &ApplianceId,
        x: i32,
        y: i32,
        compute_id: Option<ComputeId>,
    ) -> Result<Arc<Node>, ControllerError> {
        self.ensure_opened()?;
        let controller = self.controller()?;
        let appliance = controller.get_appliance(appliance_id)?;
        let compute_id = appliance.compute_id.clone().or(compute_id).ok_or_else(|| {
            ControllerError::BadRequest(format!(
                "A compute is required to create a node from appliance {}",
                appliance_id
            ))
        })?;
        let compute = controller.get_compute(&compute_id)?;
        self.add_node(
            compute,
            &appliance.node_name(),
            NodeId::new(),
            appliance.node_options(x, y),
        )
        .await
    }

    /// Renames a node. An empty or unchanged name keeps the current one.
    pub fn update_node_name(&self, node_id: NodeId, new_name: &str) -> Result<String, ControllerError> {
        let node = self.get_node(node_id)?;
        let current = node.name();
        let name = self.names.lock().rename(&current, new_name)?;
        if name != current {
            node.set_name(name.clone());
            self.dump()?;
            self.notification.emit("node.updated", &node.to_record(false));
        }
        Ok(name)
    }

    /// Deletes a node after every link attached to it.
    pub async fn delete_node(&self, node_id: NodeId) -> Result<(), ControllerError> {
        let node = self.get_node(node_id)?;
        self.delete_node_links(&node).await?;

        self.remove_allocated_node_name(&node.name());
        self.nodes.remove(&node_id);
        node.destroy().await?;
        self.dump()?;
        self.notification.emit("node.deleted", &node.to_record(false));
        Ok(())
    }

    async fn delete_node_links(&self, node: &Node) -> Result<(), ControllerError> {
        let _gate = self.gates.link_deletion().await;
        let attached: Vec<LinkId> = self
            .links
            .iter()
            .filter(|l| l.touches(node.id()))
            .map(|l| l.id())
            .collect();
        for link_id in attached {
            match self.delete_link(link_id, true).await {
                Ok(()) | Err(ControllerError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Duplicates a stopped node next to it, data included.
    pub async fn duplicate_node(
        &self,
        node_id: NodeId,
        x: i32,
        y: i32,
        z: i32,
    ) -> Result<Arc<Node>, ControllerError> {
        let node = self.get_node(node_id)?;
        if node.is_running() {
            return Err(ControllerError::Conflict(
                "Cannot duplicate node data while the node is running".to_string(),
            ));
        }

        let data = match serde_json::to_value(node.to_record(true)) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(err) => return Err(ControllerError::InternalError(err.to_string())),
        };
        let options = NodeOptions::from_duplicated(data, x, y, z).ok_or_else(|| {
            ControllerError::InternalError(format!("Node {} has no node type", node_id))
        })?;

        let copy_id = NodeId::new();
        let copy = self
            .add_node(node.compute().clone(), &node.name(), copy_id, options)
            .await?;

        match node.duplicate_into(copy_id).await {
            Ok(()) => Ok(copy),
            Err(err) if err.is_not_found() => {
                self.delete_node(copy_id).await?;
                Err(ControllerError::Conflict(
                    "This node type cannot be duplicated".to_string(),
                ))
            }
            Err(err) if err.is_conflict() => {
                self.delete_node(copy_id).await?;
                Err(ControllerError::Conflict(err.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    // -----------------------------------------------------------------------
    // Links
    // -----------------------------------------------------------------------

    pub fn links(&self) -> Vec<Arc<Link>> {
        self.links.iter().map(|e| e.value().clone()).collect()
    }

    pub fn get_link(&self, link_id: LinkId) -> Result<Arc<Link>, ControllerError> {
        self.ensure_opened()?;
        self.links
            .get(&link_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| ControllerError::NotFound(format!("Link ID {} doesn't exist", link_id)))
    }

    /// Creates an empty link, or returns the existing link with this id.
    pub fn add_link(&self, link_id: Option<LinkId>) -> Result<Arc<Link>, ControllerError> {
        self.add_link_inner(link_id, true)
    }

    pub(super) fn add_link_inner(
        &self,
        link_id: Option<LinkId>,
        dump: bool,
    ) -> Result<Arc<Link>, ControllerError> {
        self.ensure_opened()?;
        if let Some(existing) = link_id.and_then(|id| self.links.get(&id)) {
            return Ok(existing.clone());
        }
        let link = Arc::new(Link::new(self.id, link_id.unwrap_or_default()));
        self.links.insert(link.id(), link.clone());
        if dump {
            self.dump()?;
        }
        Ok(link)
    }

    /// Plugs a node port into a link.
    pub async fn add_link_node(
        &self,
        link_id: LinkId,
        node_id: NodeId,
        adapter_number: u32,
        port_number: u32,
        label: Option<Value>,
    ) -> Result<Arc<Link>, ControllerError> {
        let link = self.get_link(link_id)?;
        let node = self.get_node(node_id)?;
        link.add_node(&node, adapter_number, port_number, label)
            .await?;
        self.dump()?;
        let action = if link.is_complete() {
            "link.created"
        } else {
            "link.updated"
        };
        self.notification.emit(action, &link.to_record(false));
        Ok(link)
    }

    pub fn update_link_filters(
        &self,
        link_id: LinkId,
        filters: Map<String, Value>,
    ) -> Result<(), ControllerError> {
        let link = self.get_link(link_id)?;
        link.update_filters(filters);
        self.dump()?;
        self.notification.emit("link.updated", &link.to_record(false));
        Ok(())
    }

    /// Removes a link, then tears it down on the backends.
    ///
    /// The link is gone from the project even when teardown fails; with
    /// `force_delete` the failure is only logged.
    pub async fn delete_link(&self, link_id: LinkId, force_delete: bool) -> Result<(), ControllerError> {
        let link = self.get_link(link_id)?;
        self.links.remove(&link_id);
        let teardown = link.delete().await;
        self.dump()?;
        self.notification.emit("link.deleted", &link.to_record(false));
        match teardown {
            Err(err) if !force_delete => Err(err.into()),
            Err(err) => {
                warn!("Forced deletion of link {}: {}", link_id, err);
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // Drawings
    // -----------------------------------------------------------------------

    pub fn drawings(&self) -> Vec<Arc<Drawing>> {
        self.drawings.iter().map(|e| e.value().clone()).collect()
    }

    pub fn get_drawing(&self, drawing_id: DrawingId) -> Result<Arc<Drawing>, ControllerError> {
        self.ensure_opened()?;
        self.drawings
            .get(&drawing_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| {
                ControllerError::NotFound(format!("Drawing ID {} doesn't exist", drawing_id))
            })
    }

    /// Adds a drawing, or returns the existing drawing with this id.
    pub fn add_drawing(&self, record: DrawingRecord) -> Result<Arc<Drawing>, ControllerError> {
        self.add_drawing_inner(record, true)
    }

    pub(super) fn add_drawing_inner(
        &self,
        record: DrawingRecord,
        dump: bool,
    ) -> Result<Arc<Drawing>, ControllerError> {
        self.ensure_opened()?;
        if let Some(existing) = self.drawings.get(&record.drawing_id) {
            return Ok(existing.clone());
        }
        let drawing = Arc::new(Drawing::new(self.id, record));
        self.drawings.insert(drawing.id(), drawing.clone());
        self.notification
            .emit("drawing.created", &drawing.to_record(false));
        if dump {
            self.dump()?;
        }
        Ok(drawing)
    }

    pub fn delete_drawing(&self, drawing_id: DrawingId) -> Result<(), ControllerError> {
        let drawing = self.get_drawing(drawing_id)?;
        self.drawings.remove(&drawing_id);
        self.dump()?;
        self.notification
            .emit("drawing.deleted", &drawing.to_record(false));
        Ok(())
    }
}
