//! Node kinds, lifecycle status, and the serialized node record.
//!
//! [`NodeKind`] carries the per-kind capabilities the project aggregate needs
//! (always-running devices, application-id allocation, portability, default
//! port layout) so callers never introspect concrete node types.
//! [`NodeRecord`] is the single serialized form used both in the topology
//! document and in notification payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::id::{ComputeId, NodeId, ProjectId};

/// Fields bound to the identity of one node instance. They are stripped when
/// a node is duplicated.
pub const IDENTITY_FIELDS: &[&str] = &[
    "node_id",
    "name",
    "mac_addr",
    "mac_address",
    "compute_id",
    "application_id",
    "dynamips_id",
];

/// The kind of virtual device a node runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Vpcs,
    Qemu,
    Iou,
    Dynamips,
    Docker,
    Virtualbox,
    Vmware,
    Traceng,
    EthernetSwitch,
    EthernetHub,
    FrameRelaySwitch,
    AtmSwitch,
    Cloud,
    Nat,
}

/// How many adapters a node exposes and how many ports each adapter carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortLayout {
    pub adapters: u32,
    pub ports_per_adapter: u32,
}

impl NodeKind {
    /// Built-in devices have no stopped state worth tracking.
    pub fn is_always_running(self) -> bool {
        matches!(
            self,
            NodeKind::EthernetSwitch
                | NodeKind::EthernetHub
                | NodeKind::FrameRelaySwitch
                | NodeKind::AtmSwitch
                | NodeKind::Cloud
                | NodeKind::Nat
        )
    }

    /// Kinds that need a project-wide unique numeric application id.
    pub fn requires_application_id(self) -> bool {
        matches!(self, NodeKind::Iou)
    }

    /// Kinds whose disks can travel inside an exported archive.
    pub fn is_portable(self) -> bool {
        !matches!(self, NodeKind::Virtualbox | NodeKind::Vmware)
    }

    /// Path segment used by compute backends for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Vpcs => "vpcs",
            NodeKind::Qemu => "qemu",
            NodeKind::Iou => "iou",
            NodeKind::Dynamips => "dynamips",
            NodeKind::Docker => "docker",
            NodeKind::Virtualbox => "virtualbox",
            NodeKind::Vmware => "vmware",
            NodeKind::Traceng => "traceng",
            NodeKind::EthernetSwitch => "ethernet_switch",
            NodeKind::EthernetHub => "ethernet_hub",
            NodeKind::FrameRelaySwitch => "frame_relay_switch",
            NodeKind::AtmSwitch => "atm_switch",
            NodeKind::Cloud => "cloud",
            NodeKind::Nat => "nat",
        }
    }

    /// Port layout used when the node properties do not override it.
    pub fn default_layout(self) -> PortLayout {
        match self {
            NodeKind::EthernetSwitch
            | NodeKind::EthernetHub
            | NodeKind::FrameRelaySwitch
            | NodeKind::AtmSwitch => PortLayout {
                adapters: 1,
                ports_per_adapter: 8,
            },
            NodeKind::Iou => PortLayout {
                adapters: 2,
                ports_per_adapter: 4,
            },
            _ => PortLayout {
                adapters: 1,
                ports_per_adapter: 1,
            },
        }
    }
}

/// Lifecycle status reported for a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Stopped,
    Started,
    Suspended,
}

/// One port of a node, addressed by `(adapter_number, port_number)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRecord {
    pub name: String,
    pub adapter_number: u32,
    pub port_number: u32,
}

/// The serialized form of a node.
///
/// `node_id` defaults to a fresh id so topology entries written without one
/// still load. Driver specific settings live in `properties`; any other keys
/// (label, symbol, console, ...) are carried through `extra` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(default)]
    pub node_id: NodeId,
    pub compute_id: ComputeId,
    pub name: String,
    pub node_type: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default)]
    pub z: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NodeStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortRecord>,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeRecord {
    /// Splits the record into the options used to create a node from it.
    pub fn into_options(self) -> NodeOptions {
        NodeOptions {
            node_type: self.node_type,
            x: self.x,
            y: self.y,
            z: self.z,
            properties: self.properties,
            extra: self.extra,
        }
    }
}

/// Everything needed to create a node besides its id, name, and backend.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOptions {
    pub node_type: NodeKind,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub properties: Map<String, Value>,
    pub extra: Map<String, Value>,
}

impl NodeOptions {
    pub fn new(node_type: NodeKind) -> Self {
        NodeOptions {
            node_type,
            x: 0,
            y: 0,
            z: 0,
            properties: Map::new(),
            extra: Map::new(),
        }
    }

    pub fn at(mut self, x: i32, y: i32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Application id, if one was supplied in the properties.
    pub fn application_id(&self) -> Option<u32> {
        self.properties
            .get("application_id")
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
    }

    /// Port layout, honoring `adapters` / `ports_per_adapter` overrides.
    pub fn port_layout(&self) -> PortLayout {
        let default = self.node_type.default_layout();
        let read = |key: &str| {
            self.properties
                .get(key)
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
        };
        PortLayout {
            adapters: read("adapters").unwrap_or(default.adapters),
            ports_per_adapter: read("ports_per_adapter").unwrap_or(default.ports_per_adapter),
        }
    }

    /// Builds options from a serialized node with its identity stripped.
    ///
    /// Returns `None` when the payload has no usable `node_type`.
    pub fn from_duplicated(mut data: Map<String, Value>, x: i32, y: i32, z: i32) -> Option<Self> {
        strip_identity(&mut data);
        let node_type: NodeKind = serde_json::from_value(data.remove("node_type")?).ok()?;
        let properties = match data.remove("properties") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        for transient in ["x", "y", "z", "status", "ports", "project_id"] {
            data.remove(transient);
        }
        Some(NodeOptions {
            node_type,
            x,
            y,
            z,
            properties,
            extra: data,
        })
    }
}

/// Removes identity-bound fields from a serialized node and its properties.
pub fn strip_identity(data: &mut Map<String, Value>) {
    for field in IDENTITY_FIELDS {
        data.remove(*field);
        if let Some(Value::Object(props)) = data.get_mut("properties") {
            props.remove(*field);
        }
    }
}
