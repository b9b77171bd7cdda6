//! Controller-side handle on a node running on a compute.
//!
//! A [`Node`] knows its backend and the API paths that address it there. Its
//! mutable state (name, status, properties, port bindings) sits behind a
//! short-lived lock that is never held across a backend call.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{json, Map, Value};

use netlab_core::{
    ComputeId, LinkId, NodeId, NodeKind, NodeOptions, NodeRecord, NodeStatus, PortLayout,
    PortRecord, ProjectId,
};

use crate::compute::{Compute, ComputeError, Timeout};

/// Keys of a backend answer that are not node properties.
const NON_PROPERTY_KEYS: &[&str] = &[
    "node_id",
    "project_id",
    "name",
    "status",
    "node_directory",
    "command_line",
];

struct NodeState {
    name: String,
    x: i32,
    y: i32,
    z: i32,
    status: NodeStatus,
    properties: Map<String, Value>,
    extra: Map<String, Value>,
    ports: Vec<PortRecord>,
    port_links: HashMap<(u32, u32), LinkId>,
}

pub struct Node {
    id: NodeId,
    project_id: ProjectId,
    kind: NodeKind,
    compute: Arc<dyn Compute>,
    state: RwLock<NodeState>,
}

impl Node {
    pub fn new(
        project_id: ProjectId,
        compute: Arc<dyn Compute>,
        id: NodeId,
        name: String,
        options: NodeOptions,
    ) -> Self {
        let kind = options.node_type;
        let ports = build_ports(kind, options.port_layout());
        let status = if kind.is_always_running() {
            NodeStatus::Started
        } else {
            NodeStatus::Stopped
        };
        Node {
            id,
            project_id,
            kind,
            compute,
            state: RwLock::new(NodeState {
                name,
                x: options.x,
                y: options.y,
                z: options.z,
                status,
                properties: options.properties,
                extra: options.extra,
                ports,
                port_links: HashMap::new(),
            }),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn name(&self) -> String {
        self.state.read().name.clone()
    }

    pub(crate) fn set_name(&self, name: String) {
        self.state.write().name = name;
    }

    pub fn status(&self) -> NodeStatus {
        self.state.read().status
    }

    pub fn is_always_running(&self) -> bool {
        self.kind.is_always_running()
    }

    /// Neither stopped nor a device that is always up.
    pub fn is_running(&self) -> bool {
        self.status() != NodeStatus::Stopped && !self.is_always_running()
    }

    pub fn compute(&self) -> &Arc<dyn Compute> {
        &self.compute
    }

    pub fn compute_id(&self) -> &ComputeId {
        self.compute.id()
    }

    pub fn application_id(&self) -> Option<u32> {
        self.state
            .read()
            .properties
            .get("application_id")
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
    }

    pub fn port(&self, adapter_number: u32, port_number: u32) -> Option<PortRecord> {
        self.state
            .read()
            .ports
            .iter()
            .find(|p| p.adapter_number == adapter_number && p.port_number == port_number)
            .cloned()
    }

    /// The link currently plugged into a port.
    pub fn port_link(&self, adapter_number: u32, port_number: u32) -> Option<LinkId> {
        self.state
            .read()
            .port_links
            .get(&(adapter_number, port_number))
            .copied()
    }

    pub(crate) fn bind_port(&self, adapter_number: u32, port_number: u32, link: LinkId) {
        self.state
            .write()
            .port_links
            .insert((adapter_number, port_number), link);
    }

    pub(crate) fn release_port(&self, adapter_number: u32, port_number: u32, link: LinkId) {
        let mut state = self.state.write();
        if state.port_links.get(&(adapter_number, port_number)) == Some(&link) {
            state.port_links.remove(&(adapter_number, port_number));
        }
    }

    /// API path of this node on its compute.
    pub fn api_path(&self) -> String {
        format!(
            "/projects/{}/{}/nodes/{}",
            self.project_id,
            self.kind.as_str(),
            self.id
        )
    }

    /// Creates the node on its compute.
    pub async fn create(&self) -> Result<(), ComputeError> {
        let body = {
            let state = self.state.read();
            let mut body = state.properties.clone();
            body.insert("node_id".into(), json!(self.id));
            body.insert("name".into(), json!(state.name));
            Value::Object(body)
        };
        let path = format!("/projects/{}/{}/nodes", self.project_id, self.kind.as_str());
        let answer = self.compute.post(&path, body, Timeout::Default).await?;
        self.absorb(answer);
        Ok(())
    }

    pub async fn start(&self) -> Result<(), ComputeError> {
        self.transition("start", NodeStatus::Started).await
    }

    pub async fn stop(&self) -> Result<(), ComputeError> {
        self.transition("stop", NodeStatus::Stopped).await
    }

    pub async fn suspend(&self) -> Result<(), ComputeError> {
        self.transition("suspend", NodeStatus::Suspended).await
    }

    /// Deletes the node from its compute.
    pub async fn destroy(&self) -> Result<(), ComputeError> {
        self.compute.delete(&self.api_path()).await
    }

    /// Asks the compute to copy this node's data into `destination`.
    pub async fn duplicate_into(&self, destination: NodeId) -> Result<(), ComputeError> {
        let path = format!("{}/duplicate", self.api_path());
        self.compute
            .post(&path, json!({ "destination_node_id": destination }), Timeout::Never)
            .await?;
        Ok(())
    }

    async fn transition(&self, verb: &str, target: NodeStatus) -> Result<(), ComputeError> {
        let path = format!("{}/{}", self.api_path(), verb);
        let answer = self
            .compute
            .post(&path, Value::Object(Map::new()), Timeout::Default)
            .await?;
        self.absorb(answer);
        if !self.is_always_running() {
            self.state.write().status = target;
        }
        Ok(())
    }

    fn absorb(&self, answer: Value) {
        let Value::Object(answer) = answer else {
            return;
        };
        let mut state = self.state.write();
        for (key, value) in answer {
            if key == "status" {
                if let Ok(status) = serde_json::from_value(value) {
                    state.status = status;
                }
            } else if !NON_PROPERTY_KEYS.contains(&key.as_str()) {
                state.properties.insert(key, value);
            }
        }
    }

    /// Serialized form. The topology dump omits runtime-only fields.
    pub fn to_record(&self, topology_dump: bool) -> NodeRecord {
        let state = self.state.read();
        NodeRecord {
            node_id: self.id,
            compute_id: self.compute.id().clone(),
            name: state.name.clone(),
            node_type: self.kind,
            project_id: (!topology_dump).then_some(self.project_id),
            x: state.x,
            y: state.y,
            z: state.z,
            status: (!topology_dump).then_some(state.status),
            ports: if topology_dump {
                Vec::new()
            } else {
                state.ports.clone()
            },
            properties: state.properties.clone(),
            extra: state.extra.clone(),
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.name())
            .field("compute", self.compute.id())
            .finish()
    }
}

fn build_ports(kind: NodeKind, layout: PortLayout) -> Vec<PortRecord> {
    let mut ports = Vec::new();
    for adapter_number in 0..layout.adapters {
        for port_number in 0..layout.ports_per_adapter {
            let name = if layout.adapters == 1 && kind.is_always_running() {
                format!("Ethernet{}", port_number)
            } else {
                format!("Ethernet{}/{}", adapter_number, port_number)
            };
            ports.push(PortRecord {
                name,
                adapter_number,
                port_number,
            });
        }
    }
    ports
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use netlab_core::ComputeSpec;
    use parking_lot::Mutex;

    struct Recorder {
        id: ComputeId,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Compute for Recorder {
        fn id(&self) -> &ComputeId {
            &self.id
        }

        fn spec(&self) -> ComputeSpec {
            ComputeSpec::new(self.id.clone(), "127.0.0.1", 3080)
        }

        async fn post(&self, path: &str, _body: Value, _t: Timeout) -> Result<Value, ComputeError> {
            self.calls.lock().push(format!("POST {}", path));
            Ok(json!({"console": 5000, "node_directory": "/x"}))
        }

        async fn delete(&self, path: &str) -> Result<(), ComputeError> {
            self.calls.lock().push(format!("DELETE {}", path));
            Ok(())
        }
    }

    fn vpcs(compute: Arc<Recorder>) -> Node {
        Node::new(
            ProjectId::new(),
            compute,
            NodeId::new(),
            "PC1".into(),
            NodeOptions::new(NodeKind::Vpcs),
        )
    }

    fn recorder() -> Arc<Recorder> {
        Arc::new(Recorder {
            id: ComputeId::local(),
            calls: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn lifecycle_tracks_status() {
        let compute = recorder();
        let node = vpcs(compute.clone());
        node.create().await.unwrap();
        assert_eq!(node.status(), NodeStatus::Stopped);

        node.start().await.unwrap();
        assert!(node.is_running());
        node.suspend().await.unwrap();
        assert_eq!(node.status(), NodeStatus::Suspended);
        node.stop().await.unwrap();
        assert!(!node.is_running());

        let calls = compute.calls.lock().clone();
        assert_eq!(calls.len(), 4);
        assert!(calls[1].ends_with("/start"));
    }

    #[tokio::test]
    async fn create_absorbs_backend_properties() {
        let node = vpcs(recorder());
        node.create().await.unwrap();
        let record = node.to_record(true);
        assert_eq!(record.properties.get("console"), Some(&json!(5000)));
        assert!(!record.properties.contains_key("node_directory"));
        assert!(record.status.is_none());
        assert!(node.to_record(false).status.is_some());
    }

    #[test]
    fn switches_are_always_running() {
        let node = Node::new(
            ProjectId::new(),
            recorder(),
            NodeId::new(),
            "SW1".into(),
            NodeOptions::new(NodeKind::EthernetSwitch),
        );
        assert!(!node.is_running());
        assert_eq!(node.port(0, 7).unwrap().name, "Ethernet7");
        assert!(node.port(0, 8).is_none());
    }

    #[test]
    fn port_binding_is_per_link() {
        let node = vpcs(recorder());
        let link = LinkId::new();
        node.bind_port(0, 0, link);
        assert_eq!(node.port_link(0, 0), Some(link));
        node.release_port(0, 0, LinkId::new());
        assert_eq!(node.port_link(0, 0), Some(link));
        node.release_port(0, 0, link);
        assert_eq!(node.port_link(0, 0), None);
    }
}
