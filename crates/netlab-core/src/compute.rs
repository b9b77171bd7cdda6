//! Connection record of a compute backend, as stored in the topology document.

use serde::{Deserialize, Serialize};

use crate::id::ComputeId;

/// How to reach a compute backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeSpec {
    pub compute_id: ComputeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

fn default_protocol() -> String {
    "http".to_string()
}

impl ComputeSpec {
    pub fn new(compute_id: ComputeId, host: impl Into<String>, port: u16) -> Self {
        ComputeSpec {
            compute_id,
            name: None,
            protocol: default_protocol(),
            host: host.into(),
            port,
            user: None,
            password: None,
        }
    }

    /// Base URL of the backend API.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    /// The record without credentials, for documents and payloads.
    pub fn redacted(&self) -> Self {
        ComputeSpec {
            password: None,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_defaults_to_http() {
        let spec: ComputeSpec =
            serde_json::from_str(r#"{"compute_id":"vm","host":"10.0.0.2","port":3080}"#).unwrap();
        assert_eq!(spec.base_url(), "http://10.0.0.2:3080");
    }

    #[test]
    fn redacted_drops_the_password() {
        let mut spec = ComputeSpec::new(ComputeId::new("vm"), "h", 1);
        spec.user = Some("admin".into());
        spec.password = Some("secret".into());
        let redacted = spec.redacted();
        assert_eq!(redacted.user.as_deref(), Some("admin"));
        assert!(redacted.password.is_none());
    }
}
