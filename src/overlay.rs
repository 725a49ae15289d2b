//! Box layer layout: which annotations are drawn, where, and what their
//! controls report back.

use crate::annotation::{Annotation, AnnotationId, Toggles};
use crate::geometry::{ImageRect, ViewTransform};
use crate::parse::{self, CoordinateSpace};
use egui::{Rect, Vec2};

pub const CONTROL_SIZE: f32 = 16.0;
const CONTROL_GAP: f32 = 2.0;

/// Something the user did that the owner of the annotation list must apply.
#[derive(Clone, Debug, PartialEq)]
pub enum OverlayEvent {
    /// A new rectangle in image pixels, rounded to whole pixels.
    DrawComplete(ImageRect),
    /// `rect` is the box exactly as the caller supplied it, so the caller can
    /// match by value if its list changed since the frame was drawn.
    RemoveBox {
        index: usize,
        rect: ImageRect,
        id: AnnotationId,
    },
    SelectBox {
        index: usize,
        rect: ImageRect,
        id: AnnotationId,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct VisibleBox<'a> {
    pub index: usize,
    pub annotation: &'a Annotation,
    /// Same rectangle in image pixels.
    pub pixels: ImageRect,
}

impl VisibleBox<'_> {
    pub fn remove_event(&self) -> OverlayEvent {
        OverlayEvent::RemoveBox {
            index: self.index,
            rect: self.annotation.rect,
            id: self.annotation.id,
        }
    }

    pub fn select_event(&self) -> OverlayEvent {
        OverlayEvent::SelectBox {
            index: self.index,
            rect: self.annotation.rect,
            id: self.annotation.id,
        }
    }

    /// Box outline in viewer-local points.
    pub fn screen_rect(&self, transform: &ViewTransform) -> Rect {
        transform.rect_to_screen(&self.pixels)
    }
}

/// Annotations passing the toggle filter, converted to pixels.
pub fn visible_boxes<'a>(
    annotations: &'a [Annotation],
    natural: Vec2,
    space: CoordinateSpace,
    toggles: &Toggles,
) -> Vec<VisibleBox<'a>> {
    let rects: Vec<ImageRect> = annotations.iter().map(|a| a.rect).collect();
    let pixels = parse::to_pixel_space(&rects, natural, space);
    annotations
        .iter()
        .zip(pixels)
        .enumerate()
        .filter(|(_, (ann, _))| toggles.shows(&ann.fault))
        .map(|(index, (annotation, pixels))| VisibleBox {
            index,
            annotation,
            pixels,
        })
        .collect()
}

/// Remove and select buttons, stacked at the top-left inside the box.
/// Either may be absent when the caller did not ask for it.
pub fn control_rects(box_rect: Rect, removable: bool, selectable: bool) -> (Option<Rect>, Option<Rect>) {
    let size = egui::vec2(CONTROL_SIZE, CONTROL_SIZE);
    let mut cursor = box_rect.min + egui::vec2(CONTROL_GAP, CONTROL_GAP);
    let remove = removable.then(|| {
        let r = Rect::from_min_size(cursor, size);
        cursor.x += CONTROL_SIZE + CONTROL_GAP;
        r
    });
    let select = selectable.then(|| Rect::from_min_size(cursor, size));
    (remove, select)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::FaultKind;

    #[test]
    fn duplicate_coordinates_keep_their_index() {
        let rect = ImageRect::new(10.0, 10.0, 20.0, 20.0);
        let mut a = Annotation::new(rect).with_fault(FaultKind::LooseJoint);
        a.label = Some("first".into());
        let mut b = Annotation::new(rect).with_fault(FaultKind::WireOverload);
        b.label = Some("second".into());
        let anns = [a.clone(), b.clone()];

        let visible = visible_boxes(&anns, egui::vec2(100.0, 100.0), CoordinateSpace::Auto, &Toggles::default());
        assert_eq!(
            visible[0].remove_event(),
            OverlayEvent::RemoveBox {
                index: 0,
                rect,
                id: a.id
            }
        );
        assert_eq!(
            visible[1].remove_event(),
            OverlayEvent::RemoveBox {
                index: 1,
                rect,
                id: b.id
            }
        );
    }

    #[test]
    fn filtered_boxes_keep_source_index() {
        let anns = [
            Annotation::new(ImageRect::new(1.0, 1.0, 5.0, 5.0)).with_fault(FaultKind::LooseJoint),
            Annotation::new(ImageRect::new(9.0, 9.0, 5.0, 5.0)).with_fault(FaultKind::PointOverload),
        ];
        let toggles = Toggles {
            loose_joint: false,
            ..Toggles::default()
        };
        let visible = visible_boxes(&anns, egui::vec2(100.0, 100.0), CoordinateSpace::Pixels, &toggles);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].index, 1);
        match visible[0].select_event() {
            OverlayEvent::SelectBox { index, rect, .. } => {
                assert_eq!(index, 1);
                assert_eq!(rect, anns[1].rect);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn normalized_events_report_caller_space() {
        let anns = [Annotation::new(ImageRect::new(0.5, 0.5, 0.25, 0.25))];
        let visible = visible_boxes(&anns, egui::vec2(200.0, 100.0), CoordinateSpace::Auto, &Toggles::default());
        assert_eq!(visible[0].pixels, ImageRect::new(100.0, 50.0, 50.0, 25.0));
        match visible[0].remove_event() {
            OverlayEvent::RemoveBox { rect, .. } => assert_eq!(rect, anns[0].rect),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn controls_sit_inside_box() {
        let b = Rect::from_min_size(egui::pos2(100.0, 100.0), egui::vec2(80.0, 60.0));
        let (remove, select) = control_rects(b, true, true);
        let remove = remove.unwrap();
        let select = select.unwrap();
        assert!(b.contains_rect(remove));
        assert!(b.contains_rect(select));
        assert!(!remove.intersects(select));
        assert_eq!(control_rects(b, false, true).0, None);
    }
}
