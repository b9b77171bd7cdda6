pub mod compute;
pub mod drawing;
pub mod error;
pub mod id;
pub mod link;
pub mod names;
pub mod node;
pub mod project;

// Re-export commonly used types
pub use compute::ComputeSpec;
pub use drawing::DrawingRecord;
pub use error::CoreError;
pub use id::{ApplianceId, ComputeId, DrawingId, LinkId, NodeId, ProjectId, SnapshotId};
pub use link::{LinkEndpointRecord, LinkRecord};
pub use names::{next_application_id, NameAllocator, DEFAULT_NAME_SEARCH_LIMIT};
pub use node::{NodeKind, NodeOptions, NodeRecord, NodeStatus, PortLayout, PortRecord};
pub use project::{ProjectRecord, ProjectSettings, ProjectStatus, ProjectUpdate};
