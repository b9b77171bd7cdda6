//! Crash-safe persistence of the topology document.
//!
//! [`TopologyFile`] writes the document to a temporary file in the project
//! directory and renames it over the canonical path, so readers only ever see
//! a complete document. While a project loads, the previous document is kept
//! as a `.backup` sibling that can be copied back if the load fails.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::document::{load_topology, TopologyDocument};
use crate::error::StorageError;

const BACKUP_SUFFIX: &str = ".backup";

/// Handle on a project's topology document (`<dir>/<name>.gns3`).
#[derive(Debug, Clone)]
pub struct TopologyFile {
    path: PathBuf,
}

impl TopologyFile {
    pub fn new(project_dir: &Path, filename: &str) -> Self {
        TopologyFile {
            path: project_dir.join(filename),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        let mut name: OsString = self.path.as_os_str().to_owned();
        name.push(BACKUP_SUFFIX);
        PathBuf::from(name)
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> Result<TopologyDocument, StorageError> {
        load_topology(&self.path)
    }

    /// Atomically replaces the document on disk.
    pub fn write(&self, document: &TopologyDocument) -> Result<(), StorageError> {
        let bytes = document.to_pretty_json()?;
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|err| err.error)?;
        tracing::debug!("Wrote topology {}", self.path.display());
        Ok(())
    }

    /// Copies the current document to its `.backup` sibling.
    pub fn backup(&self) -> Result<(), StorageError> {
        fs::copy(&self.path, self.backup_path())?;
        Ok(())
    }

    /// Copies the `.backup` sibling over the document, if a backup exists.
    ///
    /// Returns whether a backup was restored.
    pub fn restore_backup(&self) -> Result<bool, StorageError> {
        let backup = self.backup_path();
        if !backup.exists() {
            return Ok(false);
        }
        fs::copy(&backup, &self.path)?;
        Ok(true)
    }

    /// Removes the `.backup` sibling. A missing backup is not an error.
    pub fn discard_backup(&self) -> Result<(), StorageError> {
        match fs::remove_file(self.backup_path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netlab_core::id::ProjectId;
    use netlab_core::project::ProjectSettings;

    fn doc(name: &str) -> TopologyDocument {
        TopologyDocument::new(name, ProjectId::new(), ProjectSettings::default())
    }

    #[test]
    fn write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = TopologyFile::new(dir.path(), "lab1.gns3");
        assert!(!file.exists());

        let document = doc("lab1");
        file.write(&document).unwrap();
        assert!(file.exists());
        assert_eq!(file.load().unwrap(), document);
    }

    #[test]
    fn write_leaves_no_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = TopologyFile::new(dir.path(), "lab1.gns3");
        file.write(&doc("lab1")).unwrap();
        file.write(&doc("lab1")).unwrap();
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn backup_path_is_a_sibling() {
        let file = TopologyFile::new(Path::new("/projects/p"), "lab1.gns3");
        assert_eq!(file.backup_path(), PathBuf::from("/projects/p/lab1.gns3.backup"));
    }

    #[test]
    fn restore_backup_puts_original_bytes_back() {
        let dir = tempfile::tempdir().unwrap();
        let file = TopologyFile::new(dir.path(), "lab1.gns3");
        file.write(&doc("before")).unwrap();
        let original = fs::read(file.path()).unwrap();

        file.backup().unwrap();
        file.write(&doc("after")).unwrap();
        assert_ne!(fs::read(file.path()).unwrap(), original);

        assert!(file.restore_backup().unwrap());
        assert_eq!(fs::read(file.path()).unwrap(), original);

        file.discard_backup().unwrap();
        file.discard_backup().unwrap();
        assert!(!file.backup_path().exists());
        assert!(!file.restore_backup().unwrap());
    }
}
