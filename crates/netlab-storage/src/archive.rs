//! Portable project archives.
//!
//! An archive is a tar stream holding the topology document under
//! [`ARCHIVE_TOPOLOGY_ENTRY`] and a copy of the project's `project-files/`
//! tree. Snapshots and backup files are never included.

use std::io::Read;
use std::path::{Path, PathBuf};

use tar::{Archive, Builder, EntryType, Header};
use walkdir::WalkDir;

use crate::document::TopologyDocument;
use crate::error::StorageError;
use crate::layout::{ProjectLayout, PROJECT_FILES_DIR};

/// Name of the topology document inside an archive.
pub const ARCHIVE_TOPOLOGY_ENTRY: &str = "project.gns3";

/// Result of unpacking an archive into a directory.
#[derive(Debug)]
pub struct UnpackedProject {
    pub document: TopologyDocument,
    /// Project files written under the destination directory.
    pub files: Vec<PathBuf>,
}

/// Packs `document` and the `project-files/` tree of `project_dir`.
pub fn pack_project(
    project_dir: &Path,
    document: &TopologyDocument,
) -> Result<Vec<u8>, StorageError> {
    let mut builder = Builder::new(Vec::new());

    let bytes = document.to_pretty_json()?;
    let mut header = Header::new_gnu();
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, ARCHIVE_TOPOLOGY_ENTRY, bytes.as_slice())?;

    let files_dir = ProjectLayout::new(project_dir).project_files_dir();
    if files_dir.is_dir() {
        for entry in WalkDir::new(&files_dir).sort_by_file_name() {
            let entry = entry.map_err(|err| StorageError::Archive {
                reason: err.to_string(),
            })?;
            let relative = entry
                .path()
                .strip_prefix(project_dir)
                .map_err(|err| StorageError::Archive {
                    reason: err.to_string(),
                })?;
            if entry.file_type().is_dir() {
                builder.append_dir(relative, entry.path())?;
            } else if entry.file_type().is_file() {
                builder.append_path_with_name(entry.path(), relative)?;
            }
        }
    }

    Ok(builder.into_inner()?)
}

/// Unpacks an archive into `dest`, returning its topology document.
///
/// Entries outside `project-files/` other than the document are ignored.
pub fn unpack_project<R: Read>(reader: R, dest: &Path) -> Result<UnpackedProject, StorageError> {
    std::fs::create_dir_all(dest)?;
    let mut archive = Archive::new(reader);
    let mut document = None;
    let mut files = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        if path == Path::new(ARCHIVE_TOPOLOGY_ENTRY) {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            document = Some(TopologyDocument::from_slice(&bytes, &path)?);
        } else if path.starts_with(PROJECT_FILES_DIR) {
            let is_file = entry.header().entry_type() == EntryType::Regular;
            // unpack_in refuses paths escaping dest
            if entry.unpack_in(dest)? && is_file {
                files.push(dest.join(&path));
            }
        } else {
            tracing::debug!("Skipping archive entry {}", path.display());
        }
    }

    let document = document.ok_or_else(|| StorageError::Archive {
        reason: format!("missing {ARCHIVE_TOPOLOGY_ENTRY}"),
    })?;
    Ok(UnpackedProject { document, files })
}
