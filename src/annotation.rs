use crate::geometry::ImageRect;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type AnnotationId = Uuid;

/// Fault category attached to a box.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FaultKind {
    LooseJoint,
    PointOverload,
    WireOverload,
    #[default]
    None,
    /// Any other label, kept trimmed and lower-cased.
    Other(String),
}

impl FaultKind {
    pub const KNOWN: [FaultKind; 4] = [
        FaultKind::LooseJoint,
        FaultKind::PointOverload,
        FaultKind::WireOverload,
        FaultKind::None,
    ];

    /// Exact match after trimming and case folding. Anything unrecognized
    /// becomes [`FaultKind::Other`], an empty label becomes [`FaultKind::None`].
    pub fn from_label(label: &str) -> Self {
        let folded = label.trim().to_lowercase();
        match folded.as_str() {
            "loose joint" => FaultKind::LooseJoint,
            "point overload" => FaultKind::PointOverload,
            "wire overload" => FaultKind::WireOverload,
            "none" | "" => FaultKind::None,
            _ => FaultKind::Other(folded),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FaultKind::LooseJoint => "loose joint",
            FaultKind::PointOverload => "point overload",
            FaultKind::WireOverload => "wire overload",
            FaultKind::None => "none",
            FaultKind::Other(s) => s,
        }
    }

    pub fn is_classified(&self) -> bool {
        matches!(
            self,
            FaultKind::LooseJoint | FaultKind::PointOverload | FaultKind::WireOverload
        )
    }

    pub fn display_label(&self) -> String {
        display_label(self.as_str())
    }
}

impl From<String> for FaultKind {
    fn from(s: String) -> Self {
        FaultKind::from_label(&s)
    }
}

impl From<FaultKind> for String {
    fn from(kind: FaultKind) -> Self {
        kind.as_str().to_owned()
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps free-form fault text from analysis output onto the known categories.
///
/// Separators (`-`, `_`) become spaces, and keyword pairs are matched loosely,
/// so `"Loose_Joint (faulty)"` is `"loose joint"`. `ok`, `normal` and empty
/// input are `"none"`.
pub fn canonicalize_fault(fault: &str) -> String {
    let lowered = fault.trim().to_lowercase();
    let mut normalized = String::with_capacity(lowered.len());
    let mut in_sep = false;
    for c in lowered.chars() {
        if c == '-' || c == '_' {
            if !in_sep {
                normalized.push(' ');
            }
            in_sep = true;
        } else {
            normalized.push(c);
            in_sep = false;
        }
    }
    if normalized.is_empty() {
        return "none".to_owned();
    }
    let has = |word: &str| normalized.contains(word);
    if has("loose") && has("joint") {
        "loose joint".to_owned()
    } else if has("wire") && has("overload") {
        "wire overload".to_owned()
    } else if has("point") && has("overload") {
        "point overload".to_owned()
    } else if matches!(normalized.as_str(), "none" | "ok" | "normal") {
        "none".to_owned()
    } else {
        normalized
    }
}

/// Human readable label: `"wire overload"` -> `"Wire Overload"`.
pub fn display_label(fault: &str) -> String {
    if fault.is_empty() || fault == "none" {
        return "No classification".to_owned();
    }
    fault
        .split_whitespace()
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Per-category visibility switches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Toggles {
    pub loose_joint: bool,
    pub point_overload: bool,
    pub wire_overload: bool,
}

impl Default for Toggles {
    fn default() -> Self {
        Self::all(true)
    }
}

impl Toggles {
    pub const fn all(on: bool) -> Self {
        Self {
            loose_joint: on,
            point_overload: on,
            wire_overload: on,
        }
    }

    pub fn any(&self) -> bool {
        self.loose_joint || self.point_overload || self.wire_overload
    }

    /// Known categories follow their own toggle. Unclassified boxes have no
    /// toggle of their own and are shown while any toggle is on.
    pub fn shows(&self, fault: &FaultKind) -> bool {
        match fault {
            FaultKind::LooseJoint => self.loose_joint,
            FaultKind::PointOverload => self.point_overload,
            FaultKind::WireOverload => self.wire_overload,
            FaultKind::None | FaultKind::Other(_) => self.any(),
        }
    }
}

/// Metadata for a box, matched to it by exact coordinates.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxInfo {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_fault: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl BoxInfo {
    pub fn rect(&self) -> ImageRect {
        ImageRect::new(self.x, self.y, self.w, self.h)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    #[serde(default = "Uuid::new_v4")]
    pub id: AnnotationId,
    #[serde(flatten)]
    pub rect: ImageRect,
    #[serde(default)]
    pub fault: FaultKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<f32>,
}

impl Annotation {
    pub fn new(rect: ImageRect) -> Self {
        Self {
            id: Uuid::new_v4(),
            rect,
            fault: FaultKind::None,
            label: None,
            comment: None,
            annotated_by: None,
            severity: None,
        }
    }

    pub fn with_fault(mut self, fault: FaultKind) -> Self {
        self.fault = fault;
        self
    }

    /// Text shown on the box badge.
    pub fn badge(&self) -> String {
        match &self.label {
            Some(label) if !label.trim().is_empty() => {
                format!("{} {}", label.trim(), self.fault.display_label())
            }
            _ => self.fault.display_label(),
        }
    }
}
