//! The topology document: the persisted representation of a whole project.
//!
//! A [`TopologyDocument`] holds the project metadata plus the `topology`
//! section (computes, nodes, links, drawings). It is versioned by `revision`;
//! documents from a newer revision are refused rather than half-understood.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use netlab_core::compute::ComputeSpec;
use netlab_core::drawing::DrawingRecord;
use netlab_core::id::ProjectId;
use netlab_core::link::LinkRecord;
use netlab_core::node::NodeRecord;
use netlab_core::project::ProjectSettings;

use crate::error::StorageError;

/// Current document revision.
pub const TOPOLOGY_REVISION: u32 = 9;

const TOPOLOGY_TYPE: &str = "topology";

fn topology_type() -> String {
    TOPOLOGY_TYPE.to_string()
}

fn current_revision() -> u32 {
    TOPOLOGY_REVISION
}

/// The persisted project document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyDocument {
    #[serde(rename = "type", default = "topology_type")]
    pub kind: String,
    #[serde(default = "current_revision")]
    pub revision: u32,
    #[serde(default)]
    pub version: String,
    pub name: String,
    pub project_id: ProjectId,
    #[serde(flatten)]
    pub settings: ProjectSettings,
    #[serde(default)]
    pub topology: Topology,
}

/// The entity section of a topology document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Topology {
    pub computes: Vec<ComputeSpec>,
    pub nodes: Vec<NodeRecord>,
    pub links: Vec<LinkRecord>,
    pub drawings: Vec<DrawingRecord>,
}

impl TopologyDocument {
    /// Creates an empty document at the current revision.
    pub fn new(name: impl Into<String>, project_id: ProjectId, settings: ProjectSettings) -> Self {
        TopologyDocument {
            kind: topology_type(),
            revision: TOPOLOGY_REVISION,
            version: env!("CARGO_PKG_VERSION").to_string(),
            name: name.into(),
            project_id,
            settings,
            topology: Topology::default(),
        }
    }

    /// Renders the document as pretty JSON with sorted keys and 4-space indents.
    pub fn to_pretty_json(&self) -> Result<Vec<u8>, StorageError> {
        // Round-trip through Value so object keys come out sorted.
        let value = serde_json::to_value(self)?;
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        value.serialize(&mut serializer)?;
        Ok(out)
    }

    /// Parses and validates a document from raw bytes.
    pub fn from_slice(bytes: &[u8], origin: &Path) -> Result<Self, StorageError> {
        let document: TopologyDocument = serde_json::from_slice(bytes)?;
        if document.kind != TOPOLOGY_TYPE {
            return Err(StorageError::InvalidDocument {
                path: origin.to_path_buf(),
                reason: format!("unexpected document type '{}'", document.kind),
            });
        }
        if document.revision > TOPOLOGY_REVISION {
            return Err(StorageError::UnsupportedRevision {
                revision: document.revision,
                supported: TOPOLOGY_REVISION,
            });
        }
        Ok(document)
    }
}

/// Reads and validates the topology document at `path`.
pub fn load_topology(path: &Path) -> Result<TopologyDocument, StorageError> {
    let bytes = fs::read(path)?;
    TopologyDocument::from_slice(&bytes, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> TopologyDocument {
        let mut doc = TopologyDocument::new("lab1", ProjectId::new(), ProjectSettings::default());
        doc.topology.nodes.push(
            serde_json::from_value(json!({
                "compute_id": "local",
                "name": "R1",
                "node_type": "vpcs"
            }))
            .unwrap(),
        );
        doc
    }

    #[test]
    fn pretty_json_sorts_keys_and_indents() {
        let bytes = sample().to_pretty_json().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("{\n    \"auto_close\""));
        let auto_close = text.find("\"auto_close\"").unwrap();
        let zoom = text.find("\"zoom\"").unwrap();
        assert!(auto_close < zoom);
    }

    #[test]
    fn document_parses_back() {
        let doc = sample();
        let bytes = doc.to_pretty_json().unwrap();
        let back = TopologyDocument::from_slice(&bytes, Path::new("lab1.gns3")).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn newer_revision_is_refused() {
        let mut doc = sample();
        doc.revision = TOPOLOGY_REVISION + 1;
        let bytes = serde_json::to_vec(&doc).unwrap();
        let err = TopologyDocument::from_slice(&bytes, Path::new("x.gns3")).unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedRevision { .. }));
    }

    #[test]
    fn wrong_type_is_refused() {
        let bytes = serde_json::to_vec(&json!({
            "type": "appliance",
            "name": "x",
            "project_id": ProjectId::new()
        }))
        .unwrap();
        let err = TopologyDocument::from_slice(&bytes, Path::new("x.gns3")).unwrap_err();
        assert!(matches!(err, StorageError::InvalidDocument { .. }));
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let bytes = serde_json::to_vec(&json!({
            "name": "bare",
            "project_id": ProjectId::new()
        }))
        .unwrap();
        let doc = TopologyDocument::from_slice(&bytes, Path::new("bare.gns3")).unwrap();
        assert_eq!(doc.revision, TOPOLOGY_REVISION);
        assert!(doc.topology.nodes.is_empty());
        assert!(doc.settings.auto_close);
    }

    #[test]
    fn malformed_node_entry_fails_to_parse() {
        let bytes = serde_json::to_vec(&json!({
            "name": "broken",
            "project_id": ProjectId::new(),
            "topology": {"nodes": [{"name": "R1"}]}
        }))
        .unwrap();
        assert!(TopologyDocument::from_slice(&bytes, Path::new("b.gns3")).is_err());
    }
}
