//! Thermal-image overlay viewer: pan/zoom over an inspection image with an
//! editable layer of fault bounding boxes.
//!
//! [`viewport::Viewport`] holds the interaction state and all of the
//! geometry; [`widget::OverlayViewer`] is the egui surface that feeds it.

pub mod annotation;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod legend;
pub mod overlay;
pub mod parse;
pub mod store;
pub mod viewport;
pub mod widget;

pub use annotation::{Annotation, AnnotationId, BoxInfo, FaultKind, Toggles};
pub use config::ViewerConfig;
pub use error::{Error, Result};
pub use geometry::{ImageRect, ViewTransform};
pub use overlay::OverlayEvent;
pub use parse::CoordinateSpace;
pub use viewport::{FitState, ResetKey, Viewport};
pub use widget::{OverlayResponse, OverlayViewer};
