//! Snapshot archive naming and discovery.
//!
//! A snapshot lives at `<project>/snapshots/<name>_<ddmmyy>_<HHMMSS>.gns3project`.
//! Its id is derived from the file name, so rediscovering the same file after
//! a reset yields the same id.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};

use netlab_core::id::SnapshotId;

use crate::error::StorageError;
use crate::layout::ProjectLayout;

pub const SNAPSHOT_EXTENSION: &str = "gns3project";

const TIMESTAMP_FORMAT: &str = "%d%m%y_%H%M%S";

/// A snapshot archive file, existing or about to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFile {
    pub id: SnapshotId,
    pub name: String,
    pub filename: String,
    pub path: PathBuf,
    pub created_at: Option<DateTime<Utc>>,
}

impl SnapshotFile {
    /// Names a new snapshot of the project rooted at `project_dir`.
    pub fn create(
        project_dir: &Path,
        name: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Self, StorageError> {
        if name.trim().is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(StorageError::InvalidSnapshotName {
                name: name.to_string(),
            });
        }
        let filename = format!(
            "{}_{}.{}",
            name,
            created_at.format(TIMESTAMP_FORMAT),
            SNAPSHOT_EXTENSION
        );
        Ok(Self::at(project_dir, name.to_string(), filename, Some(created_at)))
    }

    /// Describes an existing archive. Returns `None` for non-snapshot files.
    pub fn from_filename(project_dir: &Path, filename: &str) -> Option<Self> {
        let stem = filename.strip_suffix(&format!(".{SNAPSHOT_EXTENSION}"))?;
        let mut parts = stem.rsplitn(3, '_');
        let parsed = match (parts.next(), parts.next(), parts.next()) {
            (Some(time), Some(date), Some(name)) if !name.is_empty() => {
                NaiveDateTime::parse_from_str(&format!("{date}_{time}"), TIMESTAMP_FORMAT)
                    .ok()
                    .map(|ts| (name.to_string(), ts.and_utc()))
            }
            _ => None,
        };
        let (name, created_at) = match parsed {
            Some((name, ts)) => (name, Some(ts)),
            None => (stem.to_string(), None),
        };
        Some(Self::at(project_dir, name, filename.to_string(), created_at))
    }

    fn at(
        project_dir: &Path,
        name: String,
        filename: String,
        created_at: Option<DateTime<Utc>>,
    ) -> Self {
        let path = ProjectLayout::new(project_dir)
            .snapshots_dir()
            .join(&filename);
        SnapshotFile {
            id: SnapshotId::from_filename(&filename),
            name,
            filename,
            path,
            created_at,
        }
    }
}

/// Lists the snapshot archives of a project. A missing directory means none.
pub fn discover_snapshots(project_dir: &Path) -> Result<Vec<SnapshotFile>, StorageError> {
    let dir = ProjectLayout::new(project_dir).snapshots_dir();
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let filename = entry.file_name().to_string_lossy().into_owned();
        if let Some(snapshot) = SnapshotFile::from_filename(project_dir, &filename) {
            found.push(snapshot);
        }
    }
    found.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(found)
}
