//! Controller for netlab projects: labs of emulated network nodes spread
//! over one or more compute backends.
//!
//! The [`Controller`] keeps the registries of computes, appliances and
//! projects. Each [`Project`] is the single owner of its nodes, links,
//! drawings and snapshots and keeps its topology document on disk in sync
//! with them. Every change is announced on the [`NotificationBus`].

pub mod appliance;
pub mod archive;
pub mod compute;
pub mod config;
pub mod controller;
pub mod drawing;
pub mod error;
pub mod gate;
pub mod link;
pub mod node;
pub mod notification;
pub mod pool;
pub mod project;
pub mod snapshot;

// Re-export commonly used types
pub use appliance::Appliance;
pub use archive::{export_project, import_project, ExportOptions};
pub use compute::{Compute, ComputeError, HttpCompute, Timeout};
pub use config::ControllerConfig;
pub use controller::Controller;
pub use drawing::Drawing;
pub use error::{ControllerError, ErrorDetail};
pub use link::{Link, LinkEndpoint};
pub use node::Node;
pub use notification::{Notification, NotificationBus, NotificationError, NotificationQueue};
pub use pool::BatchPool;
pub use project::{Project, ProjectParams};
pub use snapshot::{Snapshot, SnapshotRecord};
