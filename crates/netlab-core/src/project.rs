//! Project-level metadata: status, presentation settings, and the project
//! record used in notifications.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::id::ProjectId;

/// Externally visible project status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Opened,
    Closed,
}

/// Behavior flags and scene metadata. The scene fields are a presentation
/// passthrough and carry no invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    pub auto_start: bool,
    pub auto_close: bool,
    pub auto_open: bool,
    pub scene_height: u32,
    pub scene_width: u32,
    pub zoom: u32,
    pub show_layers: bool,
    pub snap_to_grid: bool,
    pub show_grid: bool,
    pub show_interface_labels: bool,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        ProjectSettings {
            auto_start: false,
            auto_close: true,
            auto_open: false,
            scene_height: 1000,
            scene_width: 2000,
            zoom: 100,
            show_layers: false,
            snap_to_grid: false,
            show_grid: false,
            show_interface_labels: false,
        }
    }
}

/// A partial update of a project's name and settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub auto_start: Option<bool>,
    pub auto_close: Option<bool>,
    pub auto_open: Option<bool>,
    pub scene_height: Option<u32>,
    pub scene_width: Option<u32>,
    pub zoom: Option<u32>,
    pub show_layers: Option<bool>,
    pub snap_to_grid: Option<bool>,
    pub show_grid: Option<bool>,
    pub show_interface_labels: Option<bool>,
}

impl ProjectUpdate {
    /// Applies the settings part of the patch.
    pub fn apply_to(&self, settings: &mut ProjectSettings) {
        fn set<T: Clone>(slot: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *slot = v.clone();
            }
        }
        set(&mut settings.auto_start, &self.auto_start);
        set(&mut settings.auto_close, &self.auto_close);
        set(&mut settings.auto_open, &self.auto_open);
        set(&mut settings.scene_height, &self.scene_height);
        set(&mut settings.scene_width, &self.scene_width);
        set(&mut settings.zoom, &self.zoom);
        set(&mut settings.show_layers, &self.show_layers);
        set(&mut settings.snap_to_grid, &self.snap_to_grid);
        set(&mut settings.show_grid, &self.show_grid);
        set(&mut settings.show_interface_labels, &self.show_interface_labels);
    }
}

/// The serialized form of a project, as sent in lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub name: String,
    pub project_id: ProjectId,
    pub path: PathBuf,
    pub filename: String,
    pub status: ProjectStatus,
    #[serde(flatten)]
    pub settings: ProjectSettings,
}
