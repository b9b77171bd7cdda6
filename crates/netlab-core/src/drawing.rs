//! Canvas annotations. Drawings have no backend footprint.

use serde::{Deserialize, Serialize};

use crate::id::{DrawingId, ProjectId};

/// The serialized form of a drawing (an SVG fragment placed on the canvas).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingRecord {
    #[serde(default)]
    pub drawing_id: DrawingId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    #[serde(default)]
    pub svg: String,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default)]
    pub z: i32,
    #[serde(default)]
    pub rotation: i32,
    #[serde(default)]
    pub locked: bool,
}

impl DrawingRecord {
    pub fn new(svg: impl Into<String>) -> Self {
        DrawingRecord {
            drawing_id: DrawingId::new(),
            project_id: None,
            svg: svg.into(),
            x: 0,
            y: 0,
            z: 0,
            rotation: 0,
            locked: false,
        }
    }

    /// File name of the picture this drawing references in the project's
    /// images directory, if any. Inline `data:` images reference no file.
    pub fn resource_filename(&self) -> Option<&str> {
        if !self.svg.trim_start().starts_with("<image") {
            return None;
        }
        let start = self.svg.find("href=\"")? + "href=\"".len();
        let end = start + self.svg[start..].find('"')?;
        let target = &self.svg[start..end];
        if target.is_empty() || target.starts_with("data:") {
            return None;
        }
        target.rsplit('/').next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_drawing_references_a_picture() {
        let drawing = DrawingRecord::new(r#"<image width="10" xlink:href="images/logo.png"/>"#);
        assert_eq!(drawing.resource_filename(), Some("logo.png"));
    }

    #[test]
    fn shapes_and_inline_images_reference_nothing() {
        let rect = DrawingRecord::new(r#"<svg><rect width="10"/></svg>"#);
        assert_eq!(rect.resource_filename(), None);
        let inline = DrawingRecord::new(r#"<image xlink:href="data:image/png;base64,AAAA"/>"#);
        assert_eq!(inline.resource_filename(), None);
    }
}
