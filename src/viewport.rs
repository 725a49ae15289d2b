//! Viewer state machine: fitting, pan, zoom and rectangle drawing.
//!
//! [`Viewport`] owns everything that has to survive between frames. The
//! widget feeds it sizes and pointer input in viewer-local coordinates and
//! reads back the current [`ViewTransform`].

use crate::config::ViewerConfig;
use crate::geometry::{self, ImageRect, ViewTransform};
use egui::{Pos2, Vec2};
use tracing::{debug, trace};

/// Whether the transform is still owned by the automatic fit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FitState {
    /// Waiting for both the image size and the container size.
    #[default]
    NotFitted,
    /// Showing the fit-to-view transform; container resizes refit.
    Fitted,
    /// The user panned or zoomed; resizes only re-clamp.
    UserAdjusted,
}

/// Caller-supplied value whose change forces a fresh fit, even when the
/// image itself stays the same.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResetKey {
    Text(String),
    Number(i64),
}

impl From<&str> for ResetKey {
    fn from(s: &str) -> Self {
        ResetKey::Text(s.to_owned())
    }
}

impl From<String> for ResetKey {
    fn from(s: String) -> Self {
        ResetKey::Text(s)
    }
}

impl From<i64> for ResetKey {
    fn from(n: i64) -> Self {
        ResetKey::Number(n)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Gesture {
    #[default]
    Idle,
    /// `last` is the most recent pointer position in viewer points.
    Panning { last: Pos2 },
    /// `start` and `current` are in image pixels.
    Drawing { start: Pos2, current: Pos2 },
}

#[derive(Clone, Debug)]
pub struct Viewport {
    config: ViewerConfig,
    transform: ViewTransform,
    fit: FitState,
    gesture: Gesture,
    source: Option<String>,
    reset_key: Option<ResetKey>,
    size_hint: Option<Vec2>,
    loaded_size: Option<Vec2>,
    container: Option<Vec2>,
    load_failed: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(ViewerConfig::default())
    }
}

fn positive(size: Vec2) -> Option<Vec2> {
    (size.x > 0.0 && size.y > 0.0 && size.x.is_finite() && size.y.is_finite()).then_some(size)
}

impl Viewport {
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            transform: ViewTransform::default(),
            fit: FitState::NotFitted,
            gesture: Gesture::Idle,
            source: None,
            reset_key: None,
            size_hint: None,
            loaded_size: None,
            container: None,
            load_failed: false,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn transform(&self) -> ViewTransform {
        self.transform
    }

    pub fn fit_state(&self) -> FitState {
        self.fit
    }

    pub fn gesture(&self) -> Gesture {
        self.gesture
    }

    pub fn container_size(&self) -> Option<Vec2> {
        self.container
    }

    /// Natural image size: explicit hints win over the size reported by the
    /// loaded image. `None` until a positive size is known.
    pub fn natural_size(&self) -> Option<Vec2> {
        self.size_hint.or(self.loaded_size)
    }

    /// Both sizes known and the initial fit applied.
    pub fn is_ready(&self) -> bool {
        self.fit != FitState::NotFitted && self.natural_size().is_some() && self.container.is_some()
    }

    pub fn min_scale(&self) -> Option<f32> {
        let image = self.natural_size()?;
        let view = self.container?;
        Some(geometry::compute_min_scale(image, view, self.config.padding))
    }

    /// Declare which image is being shown. A different identity clears the
    /// loaded size and interaction state. Returns true when it changed.
    pub fn set_source(&mut self, source: &str) -> bool {
        if self.source.as_deref() == Some(source) {
            return false;
        }
        debug!(source, "overlay image changed");
        self.source = Some(source.to_owned());
        self.loaded_size = None;
        self.load_failed = false;
        self.gesture = Gesture::Idle;
        self.fit = FitState::NotFitted;
        self.try_fit();
        true
    }

    pub fn set_reset_key(&mut self, key: Option<ResetKey>) {
        if self.reset_key == key {
            return;
        }
        debug!(?key, "reset key changed");
        self.reset_key = key;
        self.gesture = Gesture::Idle;
        self.fit = FitState::NotFitted;
        self.try_fit();
    }

    pub fn set_size_hint(&mut self, hint: Option<Vec2>) {
        let hint = hint.and_then(positive);
        if self.size_hint == hint {
            return;
        }
        let before = self.natural_size();
        self.size_hint = hint;
        if self.natural_size() != before {
            self.sizes_changed();
        }
    }

    /// Size reported by the image once it is decoded. Calling this for an
    /// image that was already available on the first frame is the normal path.
    pub fn set_loaded_size(&mut self, size: Vec2) {
        let Some(size) = positive(size) else {
            return;
        };
        if self.loaded_size == Some(size) {
            return;
        }
        let before = self.natural_size();
        self.loaded_size = Some(size);
        if self.natural_size() != before {
            self.sizes_changed();
        }
    }

    pub fn set_container_size(&mut self, size: Vec2) {
        let Some(size) = positive(size) else {
            return;
        };
        if self.container == Some(size) {
            return;
        }
        self.container = Some(size);
        self.sizes_changed();
    }

    /// Returns true the first time a load failure is reported for the current source.
    pub fn note_load_failure(&mut self) -> bool {
        !std::mem::replace(&mut self.load_failed, true)
    }

    /// Explicit "Reset": back to fit-to-view, handing control back to the auto-fit.
    pub fn reset(&mut self) {
        self.fit = FitState::NotFitted;
        self.gesture = Gesture::Idle;
        self.try_fit();
    }

    fn sizes_changed(&mut self) {
        match self.fit {
            FitState::NotFitted => {
                self.try_fit();
            }
            FitState::Fitted => {
                self.apply_fit();
            }
            FitState::UserAdjusted => self.reclamp(),
        }
    }

    /// Applies the fit once both sizes are known. No-op in any other state.
    fn try_fit(&mut self) -> bool {
        if self.fit != FitState::NotFitted {
            return false;
        }
        if self.apply_fit() {
            self.fit = FitState::Fitted;
            true
        } else {
            false
        }
    }

    fn apply_fit(&mut self) -> bool {
        let (Some(image), Some(view)) = (self.natural_size(), self.container) else {
            return false;
        };
        self.transform = geometry::fit_to_view(image, view, self.config.padding);
        debug!(
            scale = self.transform.scale,
            offset_x = self.transform.offset.x,
            offset_y = self.transform.offset.y,
            "fit to view"
        );
        true
    }

    fn reclamp(&mut self) {
        let (Some(image), Some(view)) = (self.natural_size(), self.container) else {
            return;
        };
        let min = geometry::compute_min_scale(image, view, self.config.padding);
        self.transform.scale = self.transform.scale.max(min);
        self.transform.offset = self.clamped(self.transform.scale, self.transform.offset);
    }

    fn clamped(&self, scale: f32, proposed: Vec2) -> Vec2 {
        match (self.natural_size(), self.container) {
            (Some(image), Some(view)) => {
                geometry::clamp_offset(scale, image, view, self.config.padding, proposed)
            }
            _ => proposed,
        }
    }

    /// Viewer-local point to image pixels. `origin` is the viewer's top-left
    /// corner in the same space as `client`.
    pub fn screen_to_image(&self, client: Pos2, origin: Pos2) -> Pos2 {
        self.transform.screen_to_image(client - origin.to_vec2())
    }

    /// Viewer point to image pixels, clipped to the image extent.
    fn image_point(&self, pos: Pos2) -> Pos2 {
        let p = self.transform.screen_to_image(pos);
        match self.natural_size() {
            Some(size) => p.min(size.to_pos2()),
            None => p,
        }
    }

    /// Cursor-anchored wheel zoom. Returns true when the transform changed.
    pub fn wheel(&mut self, cursor: Pos2, delta_y: f32) -> bool {
        if delta_y == 0.0 || !self.is_ready() {
            return false;
        }
        let Some(min) = self.min_scale() else {
            return false;
        };
        let factor = geometry::zoom_factor(delta_y, self.config.wheel_sensitivity);
        let new_scale = (self.transform.scale * factor).min(self.config.max_scale).max(min);
        let proposed = geometry::zoom_about(&self.transform, cursor, new_scale);
        self.transform.offset = self.clamped(new_scale, proposed);
        self.transform.scale = new_scale;
        self.fit = FitState::UserAdjusted;
        trace!(scale = new_scale, "wheel zoom");
        true
    }

    /// Primary pointer pressed at `pos`. Presses over a per-box control start
    /// nothing; otherwise draw mode decides between drawing and panning.
    pub fn pointer_down(&mut self, pos: Pos2, over_control: bool, allow_draw: bool) {
        if over_control || !self.is_ready() {
            return;
        }
        if allow_draw {
            let start = self.image_point(pos);
            self.gesture = Gesture::Drawing { start, current: start };
            trace!(x = start.x, y = start.y, "draw start");
        } else {
            self.gesture = Gesture::Panning { last: pos };
            self.fit = FitState::UserAdjusted;
            trace!("pan start");
        }
    }

    pub fn pointer_move(&mut self, pos: Pos2) {
        match self.gesture {
            Gesture::Idle => {}
            Gesture::Panning { last } => {
                let proposed = self.transform.offset + (pos - last);
                self.transform.offset = self.clamped(self.transform.scale, proposed);
                self.gesture = Gesture::Panning { last: pos };
            }
            Gesture::Drawing { start, .. } => {
                let current = self.image_point(pos);
                self.gesture = Gesture::Drawing { start, current };
            }
        }
    }

    /// Ends the active gesture. A finished draw large enough on both axes is
    /// returned rounded to whole pixels.
    pub fn pointer_up(&mut self, pos: Pos2) -> Option<ImageRect> {
        self.pointer_move(pos);
        let finished = std::mem::take(&mut self.gesture);
        let Gesture::Drawing { start, current } = finished else {
            return None;
        };
        let rect = ImageRect::from_corners(start, current);
        let min = self.config.min_draw_size;
        if rect.w > min && rect.h > min {
            debug!(?rect, "draw complete");
            // round the corners, not x/w, so the far edge stays on the image
            Some(ImageRect::from_corners(start.round(), current.round()))
        } else {
            trace!(?rect, "draw discarded");
            None
        }
    }

    /// Pointer left the viewer: pans stop, unfinished drawings are dropped.
    pub fn pointer_leave(&mut self) {
        if self.gesture != Gesture::Idle {
            trace!("pointer left, gesture dropped");
        }
        self.gesture = Gesture::Idle;
    }

    pub fn is_panning(&self) -> bool {
        matches!(self.gesture, Gesture::Panning { .. })
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.gesture, Gesture::Drawing { .. })
    }

    /// Live rectangle of the drawing in progress, in image pixels.
    pub fn draft(&self) -> Option<ImageRect> {
        match self.gesture {
            Gesture::Drawing { start, current } => Some(ImageRect::from_corners(start, current)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::{pos2, vec2};

    fn ready(image: Vec2, view: Vec2) -> Viewport {
        let mut vp = Viewport::default();
        vp.set_source("file://thermal.png");
        vp.set_loaded_size(image);
        vp.set_container_size(view);
        vp
    }

    #[test]
    fn fits_regardless_of_size_order() {
        let mut a = Viewport::default();
        a.set_source("img");
        a.set_loaded_size(vec2(640.0, 480.0));
        a.set_container_size(vec2(900.0, 500.0));

        let mut b = Viewport::default();
        b.set_source("img");
        b.set_container_size(vec2(900.0, 500.0));
        b.set_loaded_size(vec2(640.0, 480.0));

        assert_eq!(a.fit_state(), FitState::Fitted);
        assert_eq!(a.transform(), b.transform());
    }

    #[test]
    fn hint_fits_before_image_loads() {
        let mut vp = Viewport::default();
        vp.set_source("img");
        vp.set_size_hint(Some(vec2(200.0, 100.0)));
        vp.set_container_size(vec2(420.0, 220.0));
        assert_eq!(vp.fit_state(), FitState::Fitted);
        assert!((vp.transform().scale - 2.0).abs() < 1e-6);
    }

    #[test]
    fn resize_refits_until_user_interacts() {
        let mut vp = ready(vec2(100.0, 100.0), vec2(120.0, 120.0));
        vp.set_container_size(vec2(220.0, 220.0));
        assert!((vp.transform().scale - 2.0).abs() < 1e-6);

        vp.wheel(pos2(110.0, 110.0), -200.0);
        assert_eq!(vp.fit_state(), FitState::UserAdjusted);
        let zoomed = vp.transform().scale;
        vp.set_container_size(vec2(160.0, 160.0));
        assert_eq!(vp.fit_state(), FitState::UserAdjusted);
        assert_eq!(vp.transform().scale, zoomed);
    }

    #[test]
    fn resize_after_interaction_respects_new_floor() {
        let mut vp = ready(vec2(100.0, 100.0), vec2(120.0, 120.0));
        vp.pointer_down(pos2(50.0, 50.0), false, false);
        vp.pointer_up(pos2(50.0, 50.0));
        vp.set_container_size(vec2(1020.0, 1020.0));
        assert_eq!(vp.fit_state(), FitState::UserAdjusted);
        assert!(vp.transform().scale >= vp.min_scale().unwrap());
    }

    #[test]
    fn reset_key_forces_refit() {
        let mut vp = ready(vec2(100.0, 100.0), vec2(120.0, 120.0));
        vp.set_reset_key(Some("stored".into()));
        vp.wheel(pos2(60.0, 60.0), -300.0);
        assert_ne!(vp.transform().scale, 1.0);

        vp.set_reset_key(Some("stored".into()));
        assert_eq!(vp.fit_state(), FitState::UserAdjusted);

        vp.set_reset_key(Some("ai".into()));
        assert_eq!(vp.fit_state(), FitState::Fitted);
        assert!((vp.transform().scale - 1.0).abs() < 1e-6);
    }

    #[test]
    fn new_source_waits_for_its_own_size() {
        let mut vp = ready(vec2(100.0, 100.0), vec2(120.0, 120.0));
        assert!(vp.set_source("other"));
        assert_eq!(vp.fit_state(), FitState::NotFitted);
        assert!(vp.natural_size().is_none());
        vp.set_loaded_size(vec2(50.0, 50.0));
        assert_eq!(vp.fit_state(), FitState::Fitted);
        assert!((vp.transform().scale - 2.0).abs() < 1e-6);
    }

    #[test]
    fn zoom_never_exceeds_bounds() {
        let mut vp = ready(vec2(100.0, 100.0), vec2(120.0, 120.0));
        for _ in 0..100 {
            vp.wheel(pos2(30.0, 90.0), -500.0);
        }
        assert!((vp.transform().scale - 8.0).abs() < 1e-4);
        for _ in 0..100 {
            vp.wheel(pos2(30.0, 90.0), 500.0);
        }
        assert!((vp.transform().scale - 1.0).abs() < 1e-4);
        assert_eq!(vp.transform().offset, vec2(10.0, 10.0));
    }

    #[test]
    fn pan_stays_inside_padding_band() {
        let mut vp = ready(vec2(100.0, 100.0), vec2(120.0, 120.0));
        vp.wheel(pos2(60.0, 60.0), -1000.0);
        vp.pointer_down(pos2(60.0, 60.0), false, false);
        assert!(vp.is_panning());
        vp.pointer_move(pos2(5000.0, 5000.0));
        assert_eq!(vp.transform().offset, vec2(10.0, 10.0));
        vp.pointer_move(pos2(-5000.0, -5000.0));
        let scaled = 100.0 * vp.transform().scale;
        let expected = 120.0 - scaled - 10.0;
        assert!((vp.transform().offset.x - expected).abs() < 1e-3);
        vp.pointer_leave();
        assert_eq!(vp.gesture(), Gesture::Idle);
    }

    #[test]
    fn press_on_control_starts_nothing() {
        let mut vp = ready(vec2(100.0, 100.0), vec2(120.0, 120.0));
        vp.pointer_down(pos2(50.0, 50.0), true, false);
        assert_eq!(vp.gesture(), Gesture::Idle);
        assert_eq!(vp.fit_state(), FitState::Fitted);
        vp.pointer_down(pos2(50.0, 50.0), true, true);
        assert_eq!(vp.gesture(), Gesture::Idle);
    }

    #[test]
    fn draw_mode_never_pans() {
        let mut vp = ready(vec2(100.0, 100.0), vec2(120.0, 120.0));
        let before = vp.transform();
        vp.pointer_down(pos2(15.0, 15.0), false, true);
        assert!(vp.is_drawing());
        vp.pointer_move(pos2(90.0, 70.0));
        assert_eq!(vp.transform(), before);
        assert_eq!(vp.fit_state(), FitState::Fitted);
        assert_eq!(vp.draft(), Some(ImageRect::new(5.0, 5.0, 75.0, 55.0)));
    }

    #[test]
    fn draw_emits_rounded_rect() {
        // scale 1.0, offset 10: screen (15,15) is image (5,5)
        let mut vp = ready(vec2(100.0, 100.0), vec2(120.0, 120.0));
        vp.pointer_down(pos2(15.0, 15.0), false, true);
        vp.pointer_move(pos2(20.2, 21.0));
        let rect = vp.pointer_up(pos2(25.0, 25.0));
        assert_eq!(rect, Some(ImageRect::new(5.0, 5.0, 10.0, 10.0)));
        assert!(vp.draft().is_none());
    }

    #[test]
    fn tiny_draw_is_discarded() {
        let mut vp = ready(vec2(100.0, 100.0), vec2(120.0, 120.0));
        vp.pointer_down(pos2(15.0, 15.0), false, true);
        assert_eq!(vp.pointer_up(pos2(19.0, 60.0)), None);
        vp.pointer_down(pos2(15.0, 15.0), false, true);
        assert_eq!(vp.pointer_up(pos2(60.0, 18.0)), None);
    }

    #[test]
    fn draw_past_the_edge_is_clipped_to_the_image() {
        // scale 1.0, offset 10: the image covers screen 10..110
        let mut vp = ready(vec2(100.0, 100.0), vec2(120.0, 120.0));
        vp.pointer_down(pos2(60.0, 40.0), false, true);
        vp.pointer_move(pos2(400.0, 300.0));
        assert_eq!(vp.draft(), Some(ImageRect::new(50.0, 30.0, 50.0, 70.0)));
        let rect = vp.pointer_up(pos2(400.0, 300.0));
        assert_eq!(rect, Some(ImageRect::new(50.0, 30.0, 50.0, 70.0)));

        vp.pointer_down(pos2(0.0, 0.0), false, true);
        let rect = vp.pointer_up(pos2(500.0, 500.0)).unwrap();
        assert_eq!(rect, ImageRect::new(0.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn rounding_keeps_far_edge_on_the_image() {
        let mut vp = ready(vec2(100.0, 100.0), vec2(120.0, 120.0));
        vp.pointer_down(pos2(20.5, 20.5), false, true);
        let rect = vp.pointer_up(pos2(200.0, 200.0)).unwrap();
        assert!(rect.x + rect.w <= 100.0);
        assert!(rect.y + rect.h <= 100.0);
    }

    #[test]
    fn leave_drops_unfinished_drawing() {
        let mut vp = ready(vec2(100.0, 100.0), vec2(120.0, 120.0));
        vp.pointer_down(pos2(15.0, 15.0), false, true);
        vp.pointer_move(pos2(80.0, 80.0));
        vp.pointer_leave();
        assert_eq!(vp.pointer_up(pos2(80.0, 80.0)), None);
    }

    #[test]
    fn gestures_ignored_until_fitted() {
        let mut vp = Viewport::default();
        vp.set_source("img");
        vp.set_container_size(vec2(300.0, 300.0));
        vp.pointer_down(pos2(10.0, 10.0), false, false);
        assert_eq!(vp.gesture(), Gesture::Idle);
        assert!(!vp.wheel(pos2(10.0, 10.0), 100.0));
    }

    #[test]
    fn load_failure_reported_once_per_source() {
        let mut vp = Viewport::default();
        vp.set_source("a");
        assert!(vp.note_load_failure());
        assert!(!vp.note_load_failure());
        vp.set_source("b");
        assert!(vp.note_load_failure());
    }
}
