//! Serialized form of links between node ports.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::id::{LinkId, NodeId, ProjectId};

/// One side of a link: a node port plus an optional label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkEndpointRecord {
    pub node_id: NodeId,
    pub adapter_number: u32,
    pub port_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<Value>,
}

/// A link record.
///
/// `link_id` is optional on input: entries written without one are skipped by
/// the topology loader. A fully formed link has exactly two endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_id: Option<LinkId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    #[serde(default)]
    pub nodes: Vec<LinkEndpointRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Map<String, Value>>,
}

impl LinkRecord {
    pub fn is_complete(&self) -> bool {
        self.nodes.len() == 2
    }

    pub fn touches(&self, node_id: NodeId) -> bool {
        self.nodes.iter().any(|endpoint| endpoint.node_id == node_id)
    }
}
