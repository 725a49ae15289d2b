//! Burns visible boxes into a copy of the image.

use crate::annotation::{Annotation, Toggles};
use crate::error::Result;
use crate::geometry::ImageRect;
use crate::overlay;
use crate::parse::CoordinateSpace;
use image::RgbaImage;
use std::path::{Path, PathBuf};
use tracing::info;

pub fn export_path(image_path: &Path) -> PathBuf {
    let stem = image_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("out");
    image_path.with_file_name(format!("{stem}_annotated.png"))
}

/// Writes `<stem>_annotated.png` next to the source with every annotation
/// that passes `toggles` outlined in `color`.
pub fn export_annotated(
    image_path: &Path,
    annotations: &[Annotation],
    space: CoordinateSpace,
    toggles: &Toggles,
    color: [u8; 3],
    thickness: f32,
) -> Result<PathBuf> {
    let mut img = image::open(image_path)?.to_rgba8();
    let natural = egui::vec2(img.width() as f32, img.height() as f32);
    let c = [color[0], color[1], color[2], 255];
    for vb in overlay::visible_boxes(annotations, natural, space, toggles) {
        draw_rect_on_image(&mut img, &vb.pixels, thickness, c);
    }
    let out_path = export_path(image_path);
    img.save(&out_path)?;
    info!(path = %out_path.display(), "exported annotated image");
    Ok(out_path)
}

/// Outlines `r` with a stroke of `thickness` pixels laid inside the box,
/// clipped to the image.
pub fn draw_rect_on_image(img: &mut RgbaImage, r: &ImageRect, thickness: f32, color: [u8; 4]) {
    let t = thickness.round().max(1.0) as i64;
    let x0 = r.x.round() as i64;
    let y0 = r.y.round() as i64;
    let x1 = (r.x + r.w).round() as i64;
    let y1 = (r.y + r.h).round() as i64;
    fill_span(img, x0, y0, x1, y0 + t, color);
    fill_span(img, x0, y1 - t, x1, y1, color);
    fill_span(img, x0, y0, x0 + t, y1, color);
    fill_span(img, x1 - t, y0, x1, y1, color);
}

/// Fills the half-open pixel span `[x0, x1) x [y0, y1)`.
fn fill_span(img: &mut RgbaImage, x0: i64, y0: i64, x1: i64, y1: i64, color: [u8; 4]) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    for y in y0.max(0)..y1.min(h) {
        for x in x0.max(0)..x1.min(w) {
            img.put_pixel(x as u32, y as u32, image::Rgba(color));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outline_only_touches_border() {
        let mut img = RgbaImage::new(40, 40);
        draw_rect_on_image(&mut img, &ImageRect::new(10.0, 10.0, 20.0, 20.0), 1.0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(10, 10).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(20, 10).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(20, 20).0, [0, 0, 0, 0]);
    }

    #[test]
    fn boxes_past_the_edge_are_clipped() {
        let mut img = RgbaImage::new(10, 10);
        draw_rect_on_image(&mut img, &ImageRect::new(5.0, 5.0, 50.0, 50.0), 3.0, [1, 2, 3, 255]);
        assert_eq!(img.get_pixel(9, 5).0, [1, 2, 3, 255]);
    }

    #[test]
    fn stroke_width_is_in_pixels() {
        let mut img = RgbaImage::new(40, 40);
        draw_rect_on_image(&mut img, &ImageRect::new(5.0, 5.0, 30.0, 30.0), 4.0, [9, 9, 9, 255]);
        for y in 5..9 {
            assert_eq!(img.get_pixel(20, y).0, [9, 9, 9, 255], "row {y}");
        }
        assert_eq!(img.get_pixel(20, 9).0, [0, 0, 0, 0]);
        assert_eq!(img.get_pixel(34, 20).0, [9, 9, 9, 255]);
        assert_eq!(img.get_pixel(35, 20).0, [0, 0, 0, 0]);
        assert_eq!(img.get_pixel(4, 20).0, [0, 0, 0, 0]);
    }

    #[test]
    fn export_name() {
        assert_eq!(
            export_path(Path::new("/data/t-17.jpg")),
            PathBuf::from("/data/t-17_annotated.png")
        );
    }
}
