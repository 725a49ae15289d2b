//! egui front end for [`Viewport`]: paints the image and its boxes and turns
//! pointer/wheel input into viewport operations.

use crate::annotation::{Annotation, AnnotationId, Toggles};
use crate::geometry::ImageRect;
use crate::overlay::{self, OverlayEvent};
use crate::parse::CoordinateSpace;
use crate::viewport::{ResetKey, Viewport};
use egui::load::{SizeHint, TexturePoll};
use egui::{Color32, CursorIcon, Pos2, Sense, Stroke, StrokeKind, TextureId, Vec2};
use tracing::warn;

pub struct OverlayViewer<'a> {
    viewport: &'a mut Viewport,
    image_uri: &'a str,
    annotations: &'a [Annotation],
    toggles: Toggles,
    size_hint: Option<Vec2>,
    space: CoordinateSpace,
    allow_draw: bool,
    removable: bool,
    selectable: bool,
    selected: Option<AnnotationId>,
    reset_key: Option<ResetKey>,
}

pub struct OverlayResponse {
    pub response: egui::Response,
    pub events: Vec<OverlayEvent>,
    /// Natural image size once known.
    pub natural_size: Option<Vec2>,
    /// Coordinate space the boxes were interpreted in this frame.
    pub space: CoordinateSpace,
}

impl<'a> OverlayViewer<'a> {
    /// `image_uri` is anything egui's installed loaders understand
    /// (`file://`, `https://`, `bytes://`). It also serves as the image identity:
    /// a different URI starts a fresh fit.
    pub fn new(viewport: &'a mut Viewport, image_uri: &'a str, annotations: &'a [Annotation]) -> Self {
        Self {
            viewport,
            image_uri,
            annotations,
            toggles: Toggles::default(),
            size_hint: None,
            space: CoordinateSpace::Auto,
            allow_draw: false,
            removable: false,
            selectable: false,
            selected: None,
            reset_key: None,
        }
    }

    pub fn toggles(mut self, toggles: Toggles) -> Self {
        self.toggles = toggles;
        self
    }

    /// Natural size to use instead of waiting for the image to decode.
    pub fn natural_size(mut self, size: Option<Vec2>) -> Self {
        self.size_hint = size;
        self
    }

    pub fn coordinate_space(mut self, space: CoordinateSpace) -> Self {
        self.space = space;
        self
    }

    pub fn allow_draw(mut self, allow: bool) -> Self {
        self.allow_draw = allow;
        self
    }

    pub fn removable(mut self, removable: bool) -> Self {
        self.removable = removable;
        self
    }

    pub fn selectable(mut self, selectable: bool) -> Self {
        self.selectable = selectable;
        self
    }

    pub fn selected(mut self, selected: Option<AnnotationId>) -> Self {
        self.selected = selected;
        self
    }

    pub fn reset_key(mut self, key: Option<ResetKey>) -> Self {
        self.reset_key = key;
        self
    }

    fn poll_texture(&mut self, ctx: &egui::Context) -> Option<TextureId> {
        if self.image_uri.is_empty() {
            return None;
        }
        match ctx.try_load_texture(self.image_uri, egui::TextureOptions::LINEAR, SizeHint::default()) {
            Ok(TexturePoll::Ready { texture }) => {
                self.viewport.set_loaded_size(texture.size);
                Some(texture.id)
            }
            Ok(TexturePoll::Pending { size }) => {
                if let Some(size) = size {
                    self.viewport.set_loaded_size(size);
                }
                None
            }
            Err(err) => {
                if self.viewport.note_load_failure() {
                    warn!(uri = self.image_uri, %err, "failed to load overlay image");
                }
                None
            }
        }
    }

    pub fn show(mut self, ui: &mut egui::Ui) -> OverlayResponse {
        let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::click_and_drag());
        let canvas = response.rect;
        let origin = canvas.min;
        let painter = painter.with_clip_rect(canvas);

        self.viewport.set_source(self.image_uri);
        self.viewport.set_reset_key(self.reset_key.clone());
        self.viewport.set_size_hint(self.size_hint);
        let texture = self.poll_texture(ui.ctx());
        self.viewport.set_container_size(canvas.size());

        let config = self.viewport.config().clone();
        let mut events = Vec::new();
        let natural = self.viewport.natural_size();
        let rects: Vec<ImageRect> = self.annotations.iter().map(|a| a.rect).collect();
        let space = self.space.resolve(&rects);

        // Controls are laid out against the transform in effect when the press happened.
        let visible = match natural {
            Some(n) => overlay::visible_boxes(self.annotations, n, space, &self.toggles),
            None => Vec::new(),
        };
        let mut controls = Vec::new();
        let before = self.viewport.transform();
        for vb in &visible {
            let screen = vb.screen_rect(&before).translate(origin.to_vec2());
            let (remove, select) = overlay::control_rects(screen, self.removable, self.selectable);
            if let Some(r) = remove {
                let id = response.id.with(("remove", vb.index));
                if ui.interact(r, id, Sense::click()).clicked() {
                    events.push(vb.remove_event());
                }
                controls.push((r, "×", ui.rect_contains_pointer(r)));
            }
            if let Some(r) = select {
                let id = response.id.with(("select", vb.index));
                if ui.interact(r, id, Sense::click()).clicked() {
                    events.push(vb.select_event());
                }
                controls.push((r, "✏", ui.rect_contains_pointer(r)));
            }
        }
        let over_control = |p: Pos2| controls.iter().any(|(r, _, _)| r.contains(p));

        // Wheel
        if response.contains_pointer() {
            let scroll = ui.input(|i| i.smooth_scroll_delta.y);
            if scroll != 0.0 {
                if let Some(pos) = response.hover_pos() {
                    // egui reports scrolling up as positive
                    self.viewport.wheel(pos - origin.to_vec2(), -scroll);
                }
                ui.ctx().input_mut(|i| {
                    i.smooth_scroll_delta = Vec2::ZERO;
                    i.raw_scroll_delta = Vec2::ZERO;
                });
            }
        }

        // Pan / draw
        if response.drag_started_by(egui::PointerButton::Primary) {
            let press = ui
                .input(|i| i.pointer.press_origin())
                .or_else(|| response.interact_pointer_pos());
            if let Some(pos) = press {
                self.viewport
                    .pointer_down(pos - origin.to_vec2(), over_control(pos), self.allow_draw);
            }
        }
        // egui keeps reporting a drag after the pointer leaves the widget
        if response.dragged_by(egui::PointerButton::Primary) {
            match response.interact_pointer_pos() {
                Some(pos) if canvas.contains(pos) => {
                    self.viewport.pointer_move(pos - origin.to_vec2());
                }
                Some(_) => self.viewport.pointer_leave(),
                None => {}
            }
        }
        if response.drag_stopped_by(egui::PointerButton::Primary) {
            let pos = response
                .interact_pointer_pos()
                .or_else(|| ui.input(|i| i.pointer.latest_pos()));
            match pos {
                Some(pos) if canvas.contains(pos) => {
                    if let Some(rect) = self.viewport.pointer_up(pos - origin.to_vec2()) {
                        events.push(OverlayEvent::DrawComplete(rect));
                    }
                }
                _ => self.viewport.pointer_leave(),
            }
        } else if !response.dragged() && (self.viewport.is_panning() || self.viewport.is_drawing()) {
            self.viewport.pointer_leave();
        }

        // Paint
        let transform = self.viewport.transform();
        let to_canvas = |r: egui::Rect| r.translate(origin.to_vec2());
        painter.rect_filled(canvas, 0.0, Color32::from_gray(config.background_gray));

        // stretched to the effective natural size so hinted sizes line up with the boxes
        if let (Some(tex), Some(size)) = (texture, natural) {
            let img_rect = to_canvas(transform.image_bounds(size));
            let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
            painter.image(tex, img_rect, uv, Color32::WHITE);
        }

        if natural.is_some() {
            for vb in &visible {
                let rect = to_canvas(transform.rect_to_screen(&vb.pixels));
                let color = if self.selected == Some(vb.annotation.id) {
                    config.selected_color32()
                } else {
                    config.box_color32()
                };
                painter.rect_stroke(
                    rect,
                    0.0,
                    Stroke::new(config.stroke_width, color),
                    StrokeKind::Inside,
                );
                draw_badge(&painter, rect, &vb.annotation.badge(), color);
            }

            if let Some(draft) = self.viewport.draft() {
                let r = to_canvas(transform.rect_to_screen(&draft));
                let outline = [r.left_top(), r.right_top(), r.right_bottom(), r.left_bottom(), r.left_top()];
                painter.extend(egui::Shape::dashed_line(
                    &outline,
                    Stroke::new(config.stroke_width, config.draft_color32()),
                    6.0,
                    4.0,
                ));
            }

            for (r, glyph, hovered) in &controls {
                let fill = if *hovered {
                    Color32::from_black_alpha(220)
                } else {
                    Color32::from_black_alpha(150)
                };
                painter.rect_filled(*r, 2.0, fill);
                painter.text(
                    r.center(),
                    egui::Align2::CENTER_CENTER,
                    *glyph,
                    egui::FontId::proportional(12.0),
                    Color32::WHITE,
                );
            }
        }

        if self.viewport.is_panning() {
            ui.ctx().set_cursor_icon(CursorIcon::Grabbing);
        } else if response.hovered() {
            let icon = if self.allow_draw {
                CursorIcon::Crosshair
            } else {
                CursorIcon::Grab
            };
            ui.ctx().set_cursor_icon(icon);
        }

        OverlayResponse {
            response,
            events,
            natural_size: natural,
            space,
        }
    }
}

/// Fault label in a filled tag at the box's top-right corner.
fn draw_badge(painter: &egui::Painter, rect: egui::Rect, text: &str, color: Color32) {
    let galley = painter.layout_no_wrap(text.to_owned(), egui::FontId::proportional(12.0), Color32::WHITE);
    let size = galley.size() + egui::vec2(8.0, 4.0);
    let min = egui::pos2(rect.right() - size.x - 2.0, rect.top() + 2.0);
    let tag = egui::Rect::from_min_size(min, size);
    painter.rect_filled(tag, 2.0, color);
    painter.galley(min + egui::vec2(4.0, 2.0), galley, Color32::WHITE);
}
