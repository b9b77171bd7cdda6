//! Appliances: node templates nodes can be created from.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use netlab_core::{ApplianceId, ComputeId, NodeKind, NodeOptions};

const DEFAULT_NAME_FORMAT: &str = "{name}-{0}";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appliance {
    pub appliance_id: ApplianceId,
    pub name: String,
    pub node_type: NodeKind,
    /// Compute the appliance is pinned to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_id: Option<ComputeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_name_format: Option<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Appliance {
    pub fn new(appliance_id: ApplianceId, name: impl Into<String>, node_type: NodeKind) -> Self {
        Appliance {
            appliance_id,
            name: name.into(),
            node_type,
            compute_id: None,
            default_name_format: None,
            properties: Map::new(),
        }
    }

    /// Base name of nodes created from this appliance, with `{name}` expanded.
    pub fn node_name(&self) -> String {
        self.default_name_format
            .as_deref()
            .unwrap_or(DEFAULT_NAME_FORMAT)
            .replace("{name}", &self.name)
    }

    pub fn node_options(&self, x: i32, y: i32) -> NodeOptions {
        let mut options = NodeOptions::new(self.node_type).at(x, y);
        options.properties = self.properties.clone();
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_name_format_numbers_nodes() {
        let appliance = Appliance::new(ApplianceId::new("vpcs"), "PC", NodeKind::Vpcs);
        assert_eq!(appliance.node_name(), "PC-{0}");

        let custom = Appliance {
            default_name_format: Some("{name}{0}".into()),
            ..appliance
        };
        assert_eq!(custom.node_name(), "PC{0}");
    }

    #[test]
    fn options_carry_template_properties() {
        let mut appliance = Appliance::new(ApplianceId::new("r"), "R", NodeKind::Qemu);
        appliance.properties.insert("ram".into(), json!(512));
        let options = appliance.node_options(10, 20);
        assert_eq!((options.x, options.y), (10, 20));
        assert_eq!(options.properties["ram"], json!(512));
    }
}
