//! Coordinate math between image pixels and viewer (screen) points.
//!
//! Screen positions here are local to the viewer: `(0, 0)` is the top-left
//! corner of the viewport, not of the window. Image sizes and viewport sizes
//! are carried as [`egui::Vec2`].

use egui::{Pos2, Vec2};
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in image pixels (top-left origin, y down).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl ImageRect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Rectangle spanned by two corners given in any order.
    pub fn from_corners(a: Pos2, b: Pos2) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            w: (b.x - a.x).abs(),
            h: (b.y - a.y).abs(),
        }
    }

    /// Finite components and a strictly positive size.
    pub fn is_well_formed(&self) -> bool {
        [self.x, self.y, self.w, self.h].iter().all(|v| v.is_finite()) && self.w > 0.0 && self.h > 0.0
    }

    pub fn rounded(&self) -> Self {
        Self {
            x: self.x.round(),
            y: self.y.round(),
            w: self.w.round(),
            h: self.h.round(),
        }
    }

    /// Scale x/w by `sx` and y/h by `sy`.
    pub fn scaled(&self, sx: f32, sy: f32) -> Self {
        Self {
            x: self.x * sx,
            y: self.y * sy,
            w: self.w * sx,
            h: self.h * sy,
        }
    }

    pub fn min(&self) -> Pos2 {
        egui::pos2(self.x, self.y)
    }

    pub fn max(&self) -> Pos2 {
        egui::pos2(self.x + self.w, self.y + self.h)
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.x, self.y, self.w, self.h]
    }
}

/// Maps image pixels to viewer points: `screen = offset + image * scale`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    pub scale: f32,
    pub offset: Vec2,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: Vec2::ZERO,
        }
    }
}

impl ViewTransform {
    pub fn image_to_screen(&self, p: Pos2) -> Pos2 {
        (self.offset + p.to_vec2() * self.scale).to_pos2()
    }

    /// Inverse of [`Self::image_to_screen`], clamped to the non-negative quadrant.
    pub fn screen_to_image(&self, p: Pos2) -> Pos2 {
        let x = (p.x - self.offset.x) / self.scale;
        let y = (p.y - self.offset.y) / self.scale;
        egui::pos2(x.max(0.0), y.max(0.0))
    }

    pub fn rect_to_screen(&self, r: &ImageRect) -> egui::Rect {
        egui::Rect::from_min_max(self.image_to_screen(r.min()), self.image_to_screen(r.max()))
    }

    /// Screen-space rectangle covered by an image of `image` pixels.
    pub fn image_bounds(&self, image: Vec2) -> egui::Rect {
        egui::Rect::from_min_size(self.offset.to_pos2(), image * self.scale)
    }
}

/// Largest scale at which the whole image fits inside `view` minus `padding`
/// on every side. This is the zoom floor.
pub fn compute_min_scale(image: Vec2, view: Vec2, padding: f32) -> f32 {
    let avail_w = (view.x - 2.0 * padding).max(1.0);
    let avail_h = (view.y - 2.0 * padding).max(1.0);
    (avail_w / image.x).min(avail_h / image.y)
}

/// Offset along one axis. An image larger than the padded viewport is kept
/// from exposing more than `padding` of background on either edge; a smaller
/// one is centered regardless of `proposed`.
pub fn clamp_axis(scaled: f32, view: f32, padding: f32, proposed: f32) -> f32 {
    if scaled > view - 2.0 * padding {
        let lo = view - scaled - padding;
        let hi = padding;
        hi.min(lo.max(proposed))
    } else {
        (view - scaled) / 2.0
    }
}

pub fn clamp_offset(scale: f32, image: Vec2, view: Vec2, padding: f32, proposed: Vec2) -> Vec2 {
    egui::vec2(
        clamp_axis(image.x * scale, view.x, padding, proposed.x),
        clamp_axis(image.y * scale, view.y, padding, proposed.y),
    )
}

/// Minimum-zoom transform with the image centered on both axes.
pub fn fit_to_view(image: Vec2, view: Vec2, padding: f32) -> ViewTransform {
    let scale = compute_min_scale(image, view, padding);
    let scaled = image * scale;
    ViewTransform {
        scale,
        offset: (view - scaled) / 2.0,
    }
}

/// Smooth exponential zoom step for a wheel delta (positive delta zooms out).
pub fn zoom_factor(delta_y: f32, sensitivity: f32) -> f32 {
    (-delta_y * sensitivity).exp()
}

/// Offset that keeps the image point under `cursor` fixed when going from
/// `current.scale` to `new_scale`. Not clamped.
pub fn zoom_about(current: &ViewTransform, cursor: Pos2, new_scale: f32) -> Vec2 {
    let c = cursor.to_vec2();
    c - (c - current.offset) * (new_scale / current.scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::vec2;

    const PAD: f32 = 10.0;

    #[test]
    fn fit_keeps_image_inside_and_centered() {
        let cases = [
            (vec2(640.0, 480.0), vec2(800.0, 600.0)),
            (vec2(1920.0, 1080.0), vec2(400.0, 700.0)),
            (vec2(50.0, 300.0), vec2(1000.0, 200.0)),
            (vec2(333.0, 333.0), vec2(333.0, 333.0)),
        ];
        for (image, view) in cases {
            let t = fit_to_view(image, view, PAD);
            let scaled = image * t.scale;
            assert!(scaled.x <= view.x + 1e-3, "{image:?} in {view:?}");
            assert!(scaled.y <= view.y + 1e-3, "{image:?} in {view:?}");
            let left = t.offset.x;
            let right = view.x - (t.offset.x + scaled.x);
            let top = t.offset.y;
            let bottom = view.y - (t.offset.y + scaled.y);
            assert!((left - right).abs() < 1e-3);
            assert!((top - bottom).abs() < 1e-3);
            assert!(left >= PAD - 1e-3 && top >= PAD - 1e-3);
        }
    }

    #[test]
    fn min_scale_uses_tighter_axis() {
        let s = compute_min_scale(vec2(200.0, 100.0), vec2(420.0, 120.0), PAD);
        // width allows 2.0, height allows 1.0
        assert!((s - 1.0).abs() < 1e-6);
    }

    #[test]
    fn small_axis_is_forced_to_center() {
        // 100px scaled image in a 300px viewport: always centered
        assert_eq!(clamp_axis(100.0, 300.0, PAD, -500.0), 100.0);
        assert_eq!(clamp_axis(100.0, 300.0, PAD, 250.0), 100.0);
    }

    #[test]
    fn large_axis_is_clamped_to_padding_band() {
        let scaled = 1000.0;
        let view = 300.0;
        assert_eq!(clamp_axis(scaled, view, PAD, 50.0), PAD);
        assert_eq!(clamp_axis(scaled, view, PAD, -5000.0), view - scaled - PAD);
        assert_eq!(clamp_axis(scaled, view, PAD, -200.0), -200.0);
    }

    #[test]
    fn zoom_about_keeps_cursor_point_fixed() {
        let t = ViewTransform {
            scale: 1.5,
            offset: vec2(-40.0, 12.0),
        };
        let cursor = egui::pos2(217.0, 93.0);
        let before = t.screen_to_image(cursor);
        let new_scale = t.scale * zoom_factor(-120.0, 0.0015);
        let after = ViewTransform {
            scale: new_scale,
            offset: zoom_about(&t, cursor, new_scale),
        };
        let back = after.image_to_screen(before);
        assert!((back.x - cursor.x).abs() < 1e-3);
        assert!((back.y - cursor.y).abs() < 1e-3);
    }

    #[test]
    fn zoom_factor_direction() {
        assert!(zoom_factor(100.0, 0.0015) < 1.0);
        assert!(zoom_factor(-100.0, 0.0015) > 1.0);
        assert_eq!(zoom_factor(0.0, 0.0015), 1.0);
    }

    #[test]
    fn screen_to_image_never_negative() {
        let t = ViewTransform {
            scale: 2.0,
            offset: vec2(100.0, 100.0),
        };
        assert_eq!(t.screen_to_image(egui::pos2(0.0, 0.0)), egui::pos2(0.0, 0.0));
        assert_eq!(t.screen_to_image(egui::pos2(120.0, 140.0)), egui::pos2(10.0, 20.0));
    }

    #[test]
    fn corners_normalize() {
        let r = ImageRect::from_corners(egui::pos2(30.0, 5.0), egui::pos2(10.0, 25.0));
        assert_eq!(r, ImageRect::new(10.0, 5.0, 20.0, 20.0));
    }
}
