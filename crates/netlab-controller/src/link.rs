//! Links between node ports.
//!
//! A link starts empty and is filled one `(node, adapter, port)` endpoint at a
//! time. Endpoints refer to their node weakly: the project owns nodes, a link
//! only points at them. Once the second endpoint is attached the link is
//! created on the backends of both nodes.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::{json, Map, Value};

use netlab_core::{LinkEndpointRecord, LinkId, LinkRecord, NodeId, ProjectId};

use crate::compute::{ComputeError, Timeout};
use crate::error::ControllerError;
use crate::node::Node;

/// One attached port.
#[derive(Debug, Clone)]
pub struct LinkEndpoint {
    node: Weak<Node>,
    pub node_id: NodeId,
    pub adapter_number: u32,
    pub port_number: u32,
    pub label: Option<Value>,
    /// Set once the nio exists on this endpoint's backend.
    nio_created: bool,
}

impl LinkEndpoint {
    fn nio_path(&self, node: &Node) -> String {
        format!(
            "{}/adapters/{}/ports/{}/nio",
            node.api_path(),
            self.adapter_number,
            self.port_number
        )
    }

    fn record(&self) -> LinkEndpointRecord {
        LinkEndpointRecord {
            node_id: self.node_id,
            adapter_number: self.adapter_number,
            port_number: self.port_number,
            label: self.label.clone(),
        }
    }
}

#[derive(Default)]
struct LinkState {
    endpoints: Vec<LinkEndpoint>,
    filters: Option<Map<String, Value>>,
}

pub struct Link {
    id: LinkId,
    project_id: ProjectId,
    state: Mutex<LinkState>,
}

impl Link {
    pub fn new(project_id: ProjectId, id: LinkId) -> Self {
        Link {
            id,
            project_id,
            state: Mutex::new(LinkState::default()),
        }
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn endpoints(&self) -> Vec<LinkEndpoint> {
        self.state.lock().endpoints.clone()
    }

    pub fn endpoint_count(&self) -> usize {
        self.state.lock().endpoints.len()
    }

    pub fn is_complete(&self) -> bool {
        self.endpoint_count() == 2
    }

    pub fn touches(&self, node_id: NodeId) -> bool {
        self.state
            .lock()
            .endpoints
            .iter()
            .any(|e| e.node_id == node_id)
    }

    pub fn filters(&self) -> Option<Map<String, Value>> {
        self.state.lock().filters.clone()
    }

    /// Replaces the traffic filters. They are sent to the backends when the
    /// link is created.
    pub fn update_filters(&self, filters: Map<String, Value>) {
        self.state.lock().filters = Some(filters);
    }

    /// Attaches a node port. Completing the link creates it on the backends.
    pub async fn add_node(
        &self,
        node: &Arc<Node>,
        adapter_number: u32,
        port_number: u32,
        label: Option<Value>,
    ) -> Result<(), ControllerError> {
        if node.port(adapter_number, port_number).is_none() {
            return Err(ControllerError::NotFound(format!(
                "Port {}/{} for {} not found",
                adapter_number,
                port_number,
                node.name()
            )));
        }
        if node.port_link(adapter_number, port_number).is_some() {
            return Err(ControllerError::Conflict(format!(
                "Port {}/{} of {} is already used",
                adapter_number,
                port_number,
                node.name()
            )));
        }

        let complete = {
            let mut state = self.state.lock();
            if state.endpoints.len() >= 2 {
                return Err(ControllerError::Conflict(format!(
                    "Link {} already connects two ports",
                    self.id
                )));
            }
            state.endpoints.push(LinkEndpoint {
                node: Arc::downgrade(node),
                node_id: node.id(),
                adapter_number,
                port_number,
                label,
                nio_created: false,
            });
            state.endpoints.len() == 2
        };
        node.bind_port(adapter_number, port_number, self.id);

        if complete {
            self.create().await?;
        }
        Ok(())
    }

    async fn create(&self) -> Result<(), ComputeError> {
        let (endpoints, filters) = {
            let state = self.state.lock();
            (state.endpoints.clone(), state.filters.clone())
        };
        for (index, endpoint) in endpoints.iter().enumerate() {
            let Some(node) = endpoint.node.upgrade() else {
                continue;
            };
            let body = json!({
                "type": "nio_udp",
                "link_id": self.id,
                "filters": filters.clone().unwrap_or_default(),
            });
            node.compute()
                .post(&endpoint.nio_path(&node), body, Timeout::Default)
                .await?;
            if let Some(created) = self.state.lock().endpoints.get_mut(index) {
                created.nio_created = true;
            }
        }
        Ok(())
    }

    /// Tears the link down on the backends and frees its ports.
    ///
    /// Only endpoints whose nio was created are torn down. Every endpoint is attempted; the first backend failure is returned.
    pub async fn delete(&self) -> Result<(), ComputeError> {
        let endpoints = {
            let mut state = self.state.lock();
            let endpoints = state.endpoints.clone();
            for endpoint in state.endpoints.iter_mut() {
                endpoint.nio_created = false;
            }
            endpoints
        };

        let mut first_error = None;
        for endpoint in &endpoints {
            let Some(node) = endpoint.node.upgrade() else {
                continue;
            };
            node.release_port(endpoint.adapter_number, endpoint.port_number, self.id);
            if !endpoint.nio_created {
                continue;
            }
            if let Err(err) = node.compute().delete(&endpoint.nio_path(&node)).await {
                tracing::warn!("Could not delete link {} on {}: {}", self.id, node.compute_id(), err);
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn to_record(&self, topology_dump: bool) -> LinkRecord {
        let state = self.state.lock();
        LinkRecord {
            link_id: Some(self.id),
            project_id: (!topology_dump).then_some(self.project_id),
            nodes: state.endpoints.iter().map(LinkEndpoint::record).collect(),
            filters: state.filters.clone(),
        }
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("id", &self.id)
            .field("endpoints", &self.endpoint_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use netlab_core::{ComputeId, ComputeSpec, NodeKind, NodeOptions};

    use crate::compute::Compute;

    #[derive(Default)]
    struct Backend {
        fail_post: bool,
        fail_delete: bool,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Compute for Backend {
        fn id(&self) -> &ComputeId {
            static LOCAL: std::sync::OnceLock<ComputeId> = std::sync::OnceLock::new();
            LOCAL.get_or_init(ComputeId::local)
        }

        fn spec(&self) -> ComputeSpec {
            ComputeSpec::new(ComputeId::local(), "127.0.0.1", 3080)
        }

        async fn post(&self, path: &str, _body: Value, _t: Timeout) -> Result<Value, ComputeError> {
            self.calls.lock().push(format!("POST {}", path));
            if self.fail_post {
                return Err(ComputeError::Http {
                    compute_id: "local".into(),
                    status: 500,
                    message: "no nio".into(),
                });
            }
            Ok(Value::Null)
        }

        async fn delete(&self, path: &str) -> Result<(), ComputeError> {
            self.calls.lock().push(format!("DELETE {}", path));
            if self.fail_delete {
                return Err(ComputeError::Http {
                    compute_id: "local".into(),
                    status: 500,
                    message: "boom".into(),
                });
            }
            Ok(())
        }
    }

    fn node(backend: &Arc<Backend>, name: &str) -> Arc<Node> {
        Arc::new(Node::new(
            ProjectId::new(),
            backend.clone(),
            NodeId::new(),
            name.into(),
            NodeOptions::new(NodeKind::Vpcs),
        ))
    }

    #[tokio::test]
    async fn second_endpoint_creates_the_link() {
        let backend = Arc::new(Backend::default());
        let (r1, r2) = (node(&backend, "R1"), node(&backend, "R2"));
        let link = Link::new(ProjectId::new(), LinkId::new());

        link.add_node(&r1, 0, 0, None).await.unwrap();
        assert!(backend.calls.lock().is_empty());
        link.add_node(&r2, 0, 0, None).await.unwrap();
        assert_eq!(backend.calls.lock().len(), 2);
        assert!(link.is_complete());
        assert_eq!(r1.port_link(0, 0), Some(link.id()));
    }

    #[tokio::test]
    async fn used_or_missing_ports_are_rejected() {
        let backend = Arc::new(Backend::default());
        let r1 = node(&backend, "R1");
        let first = Link::new(ProjectId::new(), LinkId::new());
        first.add_node(&r1, 0, 0, None).await.unwrap();

        let second = Link::new(ProjectId::new(), LinkId::new());
        let used = second.add_node(&r1, 0, 0, None).await.unwrap_err();
        assert_eq!(used.kind(), "CONFLICT");
        let missing = second.add_node(&r1, 3, 0, None).await.unwrap_err();
        assert_eq!(missing.kind(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn delete_frees_ports_even_when_teardown_fails() {
        let backend = Arc::new(Backend {
            fail_delete: true,
            ..Backend::default()
        });
        let (r1, r2) = (node(&backend, "R1"), node(&backend, "R2"));
        let link = Link::new(ProjectId::new(), LinkId::new());
        link.add_node(&r1, 0, 0, None).await.unwrap();
        link.add_node(&r2, 0, 0, None).await.unwrap();

        assert!(link.delete().await.is_err());
        assert_eq!(r1.port_link(0, 0), None);
        assert_eq!(r2.port_link(0, 0), None);
        let deletes = backend
            .calls
            .lock()
            .iter()
            .filter(|c| c.starts_with("DELETE"))
            .count();
        assert_eq!(deletes, 2);
    }

    #[tokio::test]
    async fn half_created_link_tears_down_the_created_side() {
        let healthy = Arc::new(Backend::default());
        let broken = Arc::new(Backend {
            fail_post: true,
            ..Backend::default()
        });
        let (r1, r2) = (node(&healthy, "R1"), node(&broken, "R2"));
        let link = Link::new(ProjectId::new(), LinkId::new());
        link.add_node(&r1, 0, 0, None).await.unwrap();
        assert!(link.add_node(&r2, 0, 0, None).await.is_err());

        link.delete().await.unwrap();
        let torn_down = |backend: &Backend| {
            backend
                .calls
                .lock()
                .iter()
                .filter(|c| c.starts_with("DELETE") && c.ends_with("/nio"))
                .count()
        };
        assert_eq!(torn_down(&healthy), 1);
        assert_eq!(torn_down(&broken), 0);
        assert_eq!(r1.port_link(0, 0), None);
        assert_eq!(r2.port_link(0, 0), None);
    }

    #[test]
    fn record_carries_filters() {
        let link = Link::new(ProjectId::new(), LinkId::new());
        let mut filters = Map::new();
        filters.insert("delay".into(), json!([50]));
        link.update_filters(filters);
        let record = link.to_record(true);
        assert_eq!(record.filters.unwrap()["delay"], json!([50]));
        assert!(record.project_id.is_none());
    }
}
