//! The on-disk tree of a project directory.
//!
//! ```text
//! <project>/<name>.gns3
//! <project>/snapshots/*.gns3project
//! <project>/project-files/captures
//! <project>/project-files/images
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

pub const PROJECT_FILES_DIR: &str = "project-files";
pub const SNAPSHOTS_DIR: &str = "snapshots";

/// Paths of one project directory.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ProjectLayout { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_files_dir(&self) -> PathBuf {
        self.root.join(PROJECT_FILES_DIR)
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.root.join(SNAPSHOTS_DIR)
    }

    /// Packet capture directory, created on demand.
    pub fn captures_dir(&self) -> Result<PathBuf, StorageError> {
        let path = self.project_files_dir().join("captures");
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Picture directory used by image drawings, created on demand.
    pub fn pictures_dir(&self) -> Result<PathBuf, StorageError> {
        let path = self.project_files_dir().join("images");
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Deletes every picture not named in `referenced`.
    ///
    /// Does nothing once the project directory itself is gone. Returns the
    /// names of the removed files.
    pub fn clean_pictures(&self, referenced: &HashSet<String>) -> Result<Vec<String>, StorageError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let dir = self.pictures_dir()?;
        let mut removed = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if referenced.contains(&name) || !entry.file_type()?.is_file() {
                continue;
            }
            fs::remove_file(entry.path())?;
            removed.push(name);
        }
        removed.sort();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_are_created_on_demand() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        let captures = layout.captures_dir().unwrap();
        assert!(captures.ends_with("project-files/captures"));
        assert!(captures.is_dir());
        assert!(layout.pictures_dir().unwrap().is_dir());
        assert!(!layout.snapshots_dir().exists());
    }

    #[test]
    fn clean_pictures_keeps_referenced_files() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        let pictures = layout.pictures_dir().unwrap();
        fs::write(pictures.join("keep.png"), b"k").unwrap();
        fs::write(pictures.join("drop.png"), b"d").unwrap();

        let referenced: HashSet<String> = ["keep.png".to_string()].into_iter().collect();
        let removed = layout.clean_pictures(&referenced).unwrap();
        assert_eq!(removed, vec!["drop.png".to_string()]);
        assert!(pictures.join("keep.png").exists());
        assert!(!pictures.join("drop.png").exists());
    }

    #[test]
    fn clean_pictures_on_removed_project_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path().join("gone"));
        assert!(layout.clean_pictures(&HashSet::new()).unwrap().is_empty());
        assert!(!dir.path().join("gone").exists());
    }
}
