use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for the overlay viewer. Every field has a default, so a config
/// file only needs to name what it overrides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Margin in screen points kept between the fitted image and the viewport edge.
    pub padding: f32,
    /// Upper zoom bound. The lower bound is always the fit-to-view scale.
    pub max_scale: f32,
    /// `k` in `exp(-delta_y * k)`.
    pub wheel_sensitivity: f32,
    /// A drawn rectangle must exceed this on both axes (image pixels) to be kept.
    pub min_draw_size: f32,
    pub stroke_width: f32,
    pub box_color: [u8; 3],
    pub selected_color: [u8; 3],
    pub draft_color: [u8; 3],
    pub background_gray: u8,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            padding: 10.0,
            max_scale: 8.0,
            wheel_sensitivity: 0.0015,
            min_draw_size: 4.0,
            stroke_width: 2.0,
            box_color: [230, 40, 40],
            selected_color: [40, 140, 255],
            draft_color: [255, 200, 0],
            background_gray: 40,
        }
    }
}

impl ViewerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: ViewerConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.padding.is_finite() && self.padding >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "padding must be a non-negative number, got {}",
                self.padding
            )));
        }
        if !(self.max_scale.is_finite() && self.max_scale > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "max_scale must be positive, got {}",
                self.max_scale
            )));
        }
        if !(self.wheel_sensitivity.is_finite() && self.wheel_sensitivity > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "wheel_sensitivity must be positive, got {}",
                self.wheel_sensitivity
            )));
        }
        if !(self.min_draw_size.is_finite() && self.min_draw_size >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "min_draw_size must be non-negative, got {}",
                self.min_draw_size
            )));
        }
        Ok(())
    }

    pub fn box_color32(&self) -> egui::Color32 {
        rgb(self.box_color)
    }

    pub fn selected_color32(&self) -> egui::Color32 {
        rgb(self.selected_color)
    }

    pub fn draft_color32(&self) -> egui::Color32 {
        rgb(self.draft_color)
    }
}

fn rgb(c: [u8; 3]) -> egui::Color32 {
    egui::Color32::from_rgb(c[0], c[1], c[2])
}
