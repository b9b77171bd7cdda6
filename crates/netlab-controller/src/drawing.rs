//! Canvas drawings.

use netlab_core::{DrawingId, DrawingRecord, ProjectId};

#[derive(Debug)]
pub struct Drawing {
    project_id: ProjectId,
    record: DrawingRecord,
}

impl Drawing {
    pub fn new(project_id: ProjectId, record: DrawingRecord) -> Self {
        Drawing { project_id, record }
    }

    pub fn id(&self) -> DrawingId {
        self.record.drawing_id
    }

    /// Picture file this drawing keeps alive, if any.
    pub fn resource_filename(&self) -> Option<&str> {
        self.record.resource_filename()
    }

    pub fn to_record(&self, topology_dump: bool) -> DrawingRecord {
        DrawingRecord {
            project_id: (!topology_dump).then_some(self.project_id),
            ..self.record.clone()
        }
    }
}
