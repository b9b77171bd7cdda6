//! Controller configuration.
//!
//! Reads configuration from environment variables:
//! - `NETLAB_PROJECTS_PATH`: directory holding projects (default: `~/GNS3/projects`)
//! - `NETLAB_RESTRICT_PROJECT_PATHS`: only allow project paths inside the
//!   projects directory (default: false)
//! - `NETLAB_BATCH_CONCURRENCY`: workers of start/stop/suspend fan-outs (default: 3)
//! - `NETLAB_COMPUTE_TIMEOUT_SECS`: default compute request timeout (default: 30)
//! - `NETLAB_NAME_SEARCH_LIMIT`: node name search bound (default: 1000000)
//! - `NETLAB_NOTIFICATION_CAPACITY`: notification buffer size (default: 1000)
//! - `NETLAB_LOCAL_COMPUTE_HOST` / `NETLAB_LOCAL_COMPUTE_PORT`: where the
//!   `local` compute listens (default: 127.0.0.1:3080)

use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use netlab_core::DEFAULT_NAME_SEARCH_LIMIT;

use crate::error::ControllerError;

/// Runtime settings shared by the controller and its projects.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub projects_path: PathBuf,
    pub restrict_project_paths: bool,
    pub batch_concurrency: usize,
    pub compute_timeout: Duration,
    pub name_search_limit: u32,
    pub notification_capacity: usize,
    pub local_compute_host: String,
    pub local_compute_port: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        ControllerConfig {
            projects_path: PathBuf::from(home).join("GNS3").join("projects"),
            restrict_project_paths: false,
            batch_concurrency: 3,
            compute_timeout: Duration::from_secs(30),
            name_search_limit: DEFAULT_NAME_SEARCH_LIMIT,
            notification_capacity: 1000,
            local_compute_host: "127.0.0.1".to_string(),
            local_compute_port: 3080,
        }
    }
}

impl ControllerConfig {
    /// Config rooted at `projects_path`, everything else default.
    pub fn with_projects_path(projects_path: impl Into<PathBuf>) -> Self {
        ControllerConfig {
            projects_path: projects_path.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self, ControllerError> {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("NETLAB_PROJECTS_PATH") {
            config.projects_path = PathBuf::from(path);
        }
        if let Some(flag) = env_parse::<bool>("NETLAB_RESTRICT_PROJECT_PATHS")? {
            config.restrict_project_paths = flag;
        }
        if let Some(workers) = env_parse::<usize>("NETLAB_BATCH_CONCURRENCY")? {
            config.batch_concurrency = workers.max(1);
        }
        if let Some(secs) = env_parse::<u64>("NETLAB_COMPUTE_TIMEOUT_SECS")? {
            config.compute_timeout = Duration::from_secs(secs);
        }
        if let Some(limit) = env_parse::<u32>("NETLAB_NAME_SEARCH_LIMIT")? {
            config.name_search_limit = limit;
        }
        if let Some(capacity) = env_parse::<usize>("NETLAB_NOTIFICATION_CAPACITY")? {
            config.notification_capacity = capacity.max(1);
        }
        if let Ok(host) = std::env::var("NETLAB_LOCAL_COMPUTE_HOST") {
            config.local_compute_host = host;
        }
        if let Some(port) = env_parse::<u16>("NETLAB_LOCAL_COMPUTE_PORT")? {
            config.local_compute_port = port;
        }
        Ok(config)
    }

    /// Checks a project path against the allow-list.
    ///
    /// With restricted paths, `..` components are refused outright so a path
    /// cannot climb out of the projects directory.
    pub fn check_path_allowed(&self, path: &Path) -> Result<(), ControllerError> {
        if !self.restrict_project_paths {
            return Ok(());
        }
        let climbs = path.components().any(|c| matches!(c, Component::ParentDir));
        if climbs || !path.starts_with(&self.projects_path) {
            return Err(ControllerError::Forbidden(format!(
                "The path {} is not allowed",
                path.display()
            )));
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, ControllerError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ControllerError::BadRequest(format!("invalid value for {}: '{}'", key, raw))),
        Err(_) => Ok(None),
    }
}
