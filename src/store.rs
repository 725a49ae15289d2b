//! Annotation files on disk.
//!
//! Edits are written next to the image as `<image>.<ext>.annotz`. Input files
//! given on the command line may instead be an inspection record, a
//! `{boxes, boxInfo}` pair, or a bare box array.

use crate::annotation::{Annotation, BoxInfo};
use crate::error::Result;
use crate::parse::{self, InspectionRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AnnotationFile {
    pub annotations: Vec<Annotation>,
    /// Analysis output kept alongside manual edits.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub analysis: Vec<Annotation>,
}

pub fn sidecar_path(image_path: &Path) -> PathBuf {
    let ext = image_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    image_path.with_extension(format!("{ext}.annotz"))
}

/// Reads the sidecar of `image_path`, `None` when there is none yet.
pub fn load_sidecar(image_path: &Path) -> Result<Option<AnnotationFile>> {
    let path = sidecar_path(image_path);
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(&path)?;
    let file: AnnotationFile = serde_json::from_str(&data)?;
    debug!(path = %path.display(), count = file.annotations.len(), "loaded sidecar");
    Ok(Some(file))
}

pub fn save_sidecar(image_path: &Path, file: &AnnotationFile) -> Result<PathBuf> {
    let path = sidecar_path(image_path);
    let data = serde_json::to_string_pretty(file)?;
    std::fs::write(&path, data)?;
    debug!(path = %path.display(), count = file.annotations.len(), "saved sidecar");
    Ok(path)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoxesWithInfo {
    boxes: Value,
    #[serde(default)]
    box_info: Vec<BoxInfo>,
}

/// Reads annotations from any of the supported input shapes.
pub fn load_annotations(path: &Path) -> Result<AnnotationFile> {
    let data = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&data)?;
    let file = annotations_from_value(value)?;
    info!(
        path = %path.display(),
        annotations = file.annotations.len(),
        analysis = file.analysis.len(),
        "loaded annotations"
    );
    Ok(file)
}

pub fn annotations_from_value(value: Value) -> Result<AnnotationFile> {
    let (has_annotations, has_boxes) = match &value {
        Value::Object(obj) => (obj.contains_key("annotations"), obj.contains_key("boxes")),
        _ => (false, false),
    };
    let file = if has_annotations {
        serde_json::from_value(value)?
    } else if has_boxes {
        let input: BoxesWithInfo = serde_json::from_value(value)?;
        AnnotationFile {
            annotations: parse::attach_info(&parse::parse_boxes(&input.boxes), &input.box_info),
            analysis: Vec::new(),
        }
    } else if value.is_object() {
        let record: InspectionRecord = serde_json::from_value(value)?;
        AnnotationFile {
            annotations: record.annotations(),
            analysis: record.analysis_annotations(),
        }
    } else {
        AnnotationFile {
            annotations: parse::attach_info(&parse::parse_boxes(&value), &[]),
            analysis: Vec::new(),
        }
    };
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::FaultKind;
    use crate::geometry::ImageRect;
    use serde_json::json;

    #[test]
    fn sidecar_keeps_extension() {
        assert_eq!(
            sidecar_path(Path::new("/tmp/scan.jpg")),
            PathBuf::from("/tmp/scan.jpg.annotz")
        );
    }

    #[test]
    fn sidecar_round_trip() {
        let dir = std::env::temp_dir().join(format!("thermal-overlay-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let image = dir.join("t1.png");
        assert!(load_sidecar(&image).unwrap().is_none());

        let ann = Annotation::new(ImageRect::new(3.0, 4.0, 10.0, 12.0)).with_fault(FaultKind::PointOverload);
        let file = AnnotationFile {
            annotations: vec![ann.clone()],
            analysis: Vec::new(),
        };
        save_sidecar(&image, &file).unwrap();
        let loaded = load_sidecar(&image).unwrap().unwrap();
        assert_eq!(loaded.annotations, vec![ann]);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn input_shapes() {
        let bare = annotations_from_value(json!([[1, 1, 5, 5], [2, 2, 0, 5]])).unwrap();
        assert_eq!(bare.annotations.len(), 1);

        let paired = annotations_from_value(json!({
            "boxes": [1, 1, 5, 5, 7, 7, 5, 5],
            "boxInfo": [{"x": 7, "y": 7, "w": 5, "h": 5, "boxFault": "loose joint"}]
        }))
        .unwrap();
        assert_eq!(paired.annotations[0].fault, FaultKind::None);
        assert_eq!(paired.annotations[1].fault, FaultKind::LooseJoint);

        let record = annotations_from_value(json!({
            "boundingBoxes": [[0.1, 0.1, 0.2, 0.2]],
            "faultTypes": ["wire overload"]
        }))
        .unwrap();
        assert_eq!(record.annotations[0].fault, FaultKind::WireOverload);
        assert!(record.analysis.is_empty());
    }
}
