//! Shared fixtures for the controller integration tests.
//!
//! [`FakeCompute`] stands in for a compute backend: it records every call,
//! tracks how many start/stop/suspend requests overlap, and can be told to
//! fail specific requests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use netlab_controller::{
    Compute, ComputeError, Controller, ControllerConfig, Project, ProjectParams, Timeout,
};
use netlab_core::{ComputeId, ComputeSpec, NodeId, NodeKind, NodeOptions};

const BATCH_VERBS: &[&str] = &["/start", "/stop", "/suspend"];

pub struct FakeCompute {
    id: ComputeId,
    delay: Duration,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    failing_deletes: Mutex<Vec<String>>,
    failing_posts: Mutex<Vec<String>>,
    slow_posts: Mutex<Vec<(String, Duration)>>,
    duplicate_status: Mutex<Option<u16>>,
}

impl FakeCompute {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(FakeCompute {
            id: ComputeId::new(id),
            delay: Duration::from_millis(20),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            failing_deletes: Mutex::new(Vec::new()),
            failing_posts: Mutex::new(Vec::new()),
            slow_posts: Mutex::new(Vec::new()),
            duplicate_status: Mutex::new(None),
        })
    }

    pub fn local() -> Arc<Self> {
        Self::new(ComputeId::LOCAL)
    }

    /// Every DELETE whose path contains `fragment` fails with a 500.
    pub fn fail_deletes_matching(&self, fragment: impl Into<String>) {
        self.failing_deletes.lock().push(fragment.into());
    }

    /// Every POST whose path ends with `suffix` fails with a 500.
    pub fn fail_posts_matching(&self, suffix: impl Into<String>) {
        self.failing_posts.lock().push(suffix.into());
    }

    /// Every POST whose path ends with `suffix` takes `delay` to answer.
    pub fn slow_posts_matching(&self, suffix: impl Into<String>, delay: Duration) {
        self.slow_posts.lock().push((suffix.into(), delay));
    }

    /// Node duplication answers with `status`.
    pub fn fail_duplicates_with(&self, status: u16) {
        *self.duplicate_status.lock() = Some(status);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Number of recorded calls of `method` whose path ends with `suffix`.
    pub fn count(&self, method: &str, suffix: &str) -> usize {
        let prefix = format!("{} ", method);
        self.calls
            .lock()
            .iter()
            .filter(|c| c.starts_with(&prefix) && c.ends_with(suffix))
            .count()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn http_error(&self, status: u16, message: &str) -> ComputeError {
        ComputeError::Http {
            compute_id: self.id.to_string(),
            status,
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl Compute for FakeCompute {
    fn id(&self) -> &ComputeId {
        &self.id
    }

    fn spec(&self) -> ComputeSpec {
        ComputeSpec::new(self.id.clone(), "127.0.0.1", 3080)
    }

    async fn post(&self, path: &str, _body: Value, _timeout: Timeout) -> Result<Value, ComputeError> {
        self.calls.lock().push(format!("POST {}", path));

        let slow = self
            .slow_posts
            .lock()
            .iter()
            .find(|(suffix, _)| path.ends_with(suffix.as_str()))
            .map(|(_, delay)| *delay);
        if let Some(delay) = slow {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .failing_posts
            .lock()
            .iter()
            .any(|suffix| path.ends_with(suffix.as_str()));
        if failing {
            return Err(self.http_error(500, "request failed"));
        }

        if path.ends_with("/duplicate") {
            let refused = *self.duplicate_status.lock();
            return match refused {
                Some(status) => Err(self.http_error(status, "duplication refused")),
                None => Ok(Value::Null),
            };
        }

        if BATCH_VERBS.iter().any(|verb| path.ends_with(verb)) {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            return Ok(json!({}));
        }

        if path.ends_with("/nodes") {
            return Ok(json!({ "console": 5000 }));
        }
        Ok(json!({}))
    }

    async fn delete(&self, path: &str) -> Result<(), ComputeError> {
        self.calls.lock().push(format!("DELETE {}", path));
        let failing = self
            .failing_deletes
            .lock()
            .iter()
            .any(|fragment| path.contains(fragment.as_str()));
        if failing {
            return Err(self.http_error(500, "teardown failed"));
        }
        Ok(())
    }
}

/// A controller rooted at `dir` with `compute` registered.
pub fn controller_with(dir: &Path, compute: Arc<FakeCompute>) -> Arc<Controller> {
    let controller = Controller::new(ControllerConfig::with_projects_path(dir));
    controller.register_compute(compute);
    controller
}

pub fn new_project(controller: &Arc<Controller>, name: &str) -> Arc<Project> {
    controller
        .add_project(ProjectParams::new(name))
        .expect("failed to create project")
}

pub async fn add_vpcs(project: &Project, compute: &Arc<FakeCompute>, name: &str) -> NodeId {
    let node_id = NodeId::new();
    project
        .add_node(compute.clone(), name, node_id, NodeOptions::new(NodeKind::Vpcs))
        .await
        .expect("failed to add node");
    node_id
}
