//! Lenient parsing of persisted box data.
//!
//! Inspection records store boxes in several shapes (nested `[[x,y,w,h]]`,
//! flat `[x,y,w,h,...]`, objects with assorted key names, or any of those
//! serialized into a JSON string). Malformed entries are dropped rather than
//! reported, so a viewer shows fewer boxes instead of failing.

use crate::annotation::{canonicalize_fault, Annotation, BoxInfo, FaultKind};
use crate::error::Error;
use crate::geometry::ImageRect;
use egui::Vec2;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::warn;

/// How box coordinates relate to the image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateSpace {
    /// Guess from the data, see [`looks_normalized`].
    #[default]
    Auto,
    Pixels,
    /// Fractions of the natural width/height.
    Normalized,
}

impl FromStr for CoordinateSpace {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(CoordinateSpace::Auto),
            "pixels" | "pixel" | "px" => Ok(CoordinateSpace::Pixels),
            "normalized" | "normalised" => Ok(CoordinateSpace::Normalized),
            other => Err(Error::UnknownCoordinateSpace(other.to_owned())),
        }
    }
}

impl CoordinateSpace {
    /// Settles `Auto` against concrete boxes.
    pub fn resolve(self, rects: &[ImageRect]) -> CoordinateSpace {
        match self {
            CoordinateSpace::Auto if looks_normalized(rects) => CoordinateSpace::Normalized,
            CoordinateSpace::Auto => CoordinateSpace::Pixels,
            other => other,
        }
    }
}

fn finite(v: f64) -> Option<f32> {
    let v = v as f32;
    v.is_finite().then_some(v)
}

/// A JSON number or a string holding one.
fn to_finite(value: &Value) -> Option<f32> {
    match value {
        Value::Number(n) => n.as_f64().and_then(finite),
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(finite),
        _ => None,
    }
}

/// Accepts a JSON string by parsing it; anything else is returned as-is.
fn unwrap_json_string(raw: &Value) -> Option<Value> {
    match raw {
        Value::String(s) => serde_json::from_str(s).ok(),
        Value::Null => None,
        other => Some(other.clone()),
    }
}

fn push_box(out: &mut Vec<ImageRect>, x: Option<f32>, y: Option<f32>, w: Option<f32>, h: Option<f32>) {
    let (Some(x), Some(y), Some(w), Some(h)) = (x, y, w, h) else {
        return;
    };
    let rect = ImageRect::new(x, y, w, h);
    if rect.is_well_formed() {
        out.push(rect);
    }
}

/// Value of the first key that is present and not `null`.
fn first_of(obj: &Map<String, Value>, keys: &[&str]) -> Option<f32> {
    keys.iter()
        .find_map(|k| obj.get(*k).filter(|v| !v.is_null()))
        .and_then(to_finite)
}

fn box_from_object(obj: &Map<String, Value>, out: &mut Vec<ImageRect>) {
    let x = first_of(obj, &["x", "left", "startX", "0"]);
    let y = first_of(obj, &["y", "top", "startY", "1"]);
    let mut w = first_of(obj, &["w", "width", "2"]);
    let mut h = first_of(obj, &["h", "height", "3"]);
    if let (Some(x), Some(y)) = (x, y) {
        if w.is_none() {
            w = first_of(obj, &["x2", "right", "endX"]).map(|x2| x2 - x);
        }
        if h.is_none() {
            h = first_of(obj, &["y2", "bottom", "endY"]).map(|y2| y2 - y);
        }
    }
    push_box(out, x, y, w, h);
}

/// Parses every well-formed box out of `raw`, in order.
pub fn parse_boxes(raw: &Value) -> Vec<ImageRect> {
    let Some(Value::Array(items)) = unwrap_json_string(raw) else {
        return Vec::new();
    };
    let mut boxes = Vec::new();
    let Some(first) = items.first() else {
        return boxes;
    };

    if matches!(first, Value::Number(_) | Value::String(_)) {
        for chunk in items.chunks_exact(4) {
            push_box(
                &mut boxes,
                to_finite(&chunk[0]),
                to_finite(&chunk[1]),
                to_finite(&chunk[2]),
                to_finite(&chunk[3]),
            );
        }
        return boxes;
    }

    for entry in &items {
        match entry {
            Value::Array(b) if b.len() >= 4 => push_box(
                &mut boxes,
                to_finite(&b[0]),
                to_finite(&b[1]),
                to_finite(&b[2]),
                to_finite(&b[3]),
            ),
            Value::Object(obj) => box_from_object(obj, &mut boxes),
            _ => {}
        }
    }
    boxes
}

/// True when every box fits in the unit square with a size in `(0, 1]`.
///
/// This is a guess: a pixel-space box at the image corner no larger than one
/// pixel looks normalized too. Callers that know better pass an explicit
/// [`CoordinateSpace`].
pub fn looks_normalized(rects: &[ImageRect]) -> bool {
    let unit = |v: f32| (0.0..=1.0).contains(&v);
    !rects.is_empty()
        && rects.iter().all(|r| {
            unit(r.x) && unit(r.y) && r.w > 0.0 && r.w <= 1.0 && r.h > 0.0 && r.h <= 1.0
        })
}

/// Converts caller-space rectangles to image pixels for a given natural size.
pub fn to_pixel_space(rects: &[ImageRect], natural: Vec2, space: CoordinateSpace) -> Vec<ImageRect> {
    match space.resolve(rects) {
        CoordinateSpace::Normalized => rects.iter().map(|r| r.scaled(natural.x, natural.y)).collect(),
        _ => rects.to_vec(),
    }
}

fn coord_key(r: &ImageRect) -> [u32; 4] {
    // +0.0 folds -0.0 into 0.0 so both compare equal
    r.to_array().map(|v| (v + 0.0).to_bits())
}

fn info_index(info: &[BoxInfo]) -> HashMap<[u32; 4], &BoxInfo> {
    info.iter().map(|bi| (coord_key(&bi.rect()), bi)).collect()
}

/// Attaches metadata to boxes by exact coordinate equality. When several
/// info entries share coordinates the last one wins; boxes without a match
/// are unclassified.
pub fn attach_info(rects: &[ImageRect], info: &[BoxInfo]) -> Vec<Annotation> {
    let by_coords = info_index(info);
    rects
        .iter()
        .map(|rect| {
            let mut ann = Annotation::new(*rect);
            if let Some(bi) = by_coords.get(&coord_key(rect)) {
                ann.fault = bi.box_fault.as_deref().map(FaultKind::from_label).unwrap_or_default();
                ann.label = bi.label.clone();
                ann.comment = bi.comment.clone();
            }
            ann
        })
        .collect()
}

fn split_list(s: &str) -> Vec<String> {
    s.split([',', ';', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_owned)
        .collect()
}

fn fit_len<T: Clone>(mut items: Vec<T>, len: usize, fill: T) -> Vec<T> {
    items.resize(len, fill);
    items
}

/// Per-box fault labels, canonicalized and padded with `"none"`.
pub fn parse_fault_types(raw: &Value, expected: usize) -> Vec<String> {
    let items: Vec<String> = match raw {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => items.iter().map(value_to_text).collect(),
            Ok(Value::String(one)) => vec![one],
            Ok(_) => Vec::new(),
            Err(_) => split_list(s),
        },
        Value::Array(items) => items.iter().map(value_to_text).collect(),
        _ => Vec::new(),
    };
    let canonical = items.iter().map(|f| canonicalize_fault(f)).collect();
    fit_len(canonical, expected, "none".to_owned())
}

fn value_to_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Who annotated each box; anything missing or malformed is `"user"`.
pub fn parse_annotated_by(raw: &Value, expected: usize) -> Vec<String> {
    let user = || "user".to_owned();
    let items: Vec<String> = match unwrap_json_string(raw) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => s.trim().to_owned(),
                _ => user(),
            })
            .collect(),
        _ => Vec::new(),
    };
    fit_len(items, expected, user())
}

/// Severity scores per box; non-numeric entries are `None`.
pub fn parse_severities(raw: &Value, expected: usize) -> Vec<Option<f32>> {
    let items: Vec<Option<f32>> = match raw {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => items.iter().map(to_finite).collect(),
            Ok(_) => Vec::new(),
            Err(_) => split_list(s)
                .iter()
                .map(|part| part.parse::<f64>().ok().and_then(finite))
                .collect(),
        },
        Value::Array(items) => items.iter().map(to_finite).collect(),
        _ => Vec::new(),
    };
    fit_len(items, expected, None)
}

/// Optional per-box comments.
pub fn parse_comments(raw: &Value, expected: usize) -> Vec<Option<String>> {
    let items: Vec<Option<String>> = match raw {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => items.iter().map(comment_text).collect(),
            // a bare string only makes sense for a single box
            _ if expected == 1 => vec![comment_text(raw)],
            _ => Vec::new(),
        },
        Value::Array(items) => items.iter().map(comment_text).collect(),
        _ => Vec::new(),
    };
    fit_len(items, expected, None)
}

fn comment_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Annotation fields of a persisted inspection, as the inspection API
/// returns them. Every field may be a JSON string or an already parsed value.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InspectionRecord {
    pub image_url: Option<String>,
    pub bounding_boxes: Value,
    pub fault_types: Value,
    pub annotated_by: Value,
    pub severity: Value,
    pub comment: Value,
    pub box_info: Vec<BoxInfo>,
    /// Earlier snapshots of `bounding_boxes`; the first one is the
    /// untouched analysis output.
    pub bounding_box_history: Value,
    pub fault_type_history: Value,
}

impl InspectionRecord {
    /// Current annotations, one per well-formed box.
    pub fn annotations(&self) -> Vec<Annotation> {
        let rects = parse_boxes(&self.bounding_boxes);
        let n = rects.len();
        let faults = parse_fault_types(&self.fault_types, n);
        let annotators = parse_annotated_by(&self.annotated_by, n);
        let severities = parse_severities(&self.severity, n);
        let comments = parse_comments(&self.comment, n);

        let mut anns = Vec::with_capacity(n);
        for (i, rect) in rects.into_iter().enumerate() {
            let mut ann = Annotation::new(rect).with_fault(FaultKind::from_label(&faults[i]));
            ann.label = Some((i + 1).to_string());
            ann.annotated_by = Some(annotators[i].clone());
            ann.severity = severities[i];
            ann.comment = comments[i].clone();
            anns.push(ann);
        }
        apply_box_info(&mut anns, &self.box_info);
        anns
    }

    /// The first history snapshot, i.e. what the analysis produced before
    /// any manual edits. Empty when there is no history.
    pub fn analysis_annotations(&self) -> Vec<Annotation> {
        let Some(Value::Array(snapshots)) = unwrap_json_string(&self.bounding_box_history) else {
            return Vec::new();
        };
        let Some(first) = snapshots.iter().find(|s| !s.is_null()) else {
            return Vec::new();
        };
        let rects = parse_boxes(first);
        let faults = match unwrap_json_string(&self.fault_type_history) {
            Some(Value::Array(f)) => f.first().map(|v| parse_fault_types(v, rects.len())),
            _ => None,
        }
        .unwrap_or_else(|| vec!["none".to_owned(); rects.len()]);

        if rects.is_empty() {
            warn!("analysis snapshot present but holds no usable boxes");
        }
        rects
            .into_iter()
            .zip(faults)
            .enumerate()
            .map(|(i, (rect, fault))| {
                let mut ann = Annotation::new(rect).with_fault(FaultKind::from_label(&fault));
                ann.label = Some((i + 1).to_string());
                ann.annotated_by = Some("AI".to_owned());
                ann
            })
            .collect()
    }
}

/// Overrides metadata on annotations whose rectangle equals a [`BoxInfo`]'s.
pub fn apply_box_info(anns: &mut [Annotation], info: &[BoxInfo]) {
    if info.is_empty() {
        return;
    }
    let by_coords = info_index(info);
    for ann in anns.iter_mut() {
        if let Some(bi) = by_coords.get(&coord_key(&ann.rect)) {
            if let Some(fault) = &bi.box_fault {
                ann.fault = FaultKind::from_label(fault);
            }
            if bi.label.is_some() {
                ann.label = bi.label.clone();
            }
            if bi.comment.is_some() {
                ann.comment = bi.comment.clone();
            }
        }
    }
}
