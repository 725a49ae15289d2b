use anyhow::{Context as _, Result};
use clap::Parser;
use eframe::egui;
use egui_extras::{Column, TableBuilder};
use std::path::{Path, PathBuf};
use thermal_overlay::annotation::{Annotation, AnnotationId, FaultKind, Toggles};
use thermal_overlay::store::{self, AnnotationFile};
use thermal_overlay::{export, legend};
use thermal_overlay::{
    CoordinateSpace, ImageRect, OverlayEvent, OverlayViewer, ResetKey, ViewerConfig, Viewport,
};
use tracing::{info, warn};

// ── CLI ─────────────────────────────────────────────────────────────────────

/// Thermal inspection image viewer with fault annotations
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Image to open (png, jpg, bmp, tiff, webp)
    #[arg(value_name = "IMAGE")]
    image: Option<PathBuf>,

    /// Annotations to show instead of the image's sidecar: an inspection
    /// record, a {boxes, boxInfo} object or a plain box array
    #[arg(long, value_name = "FILE")]
    boxes: Option<PathBuf>,

    /// Viewer config file (JSON)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Natural image width, used before the image has decoded
    #[arg(long, requires = "height")]
    width: Option<f32>,

    /// Natural image height, used before the image has decoded
    #[arg(long, requires = "width")]
    height: Option<f32>,

    /// Box coordinate space: auto, pixels or normalized
    #[arg(long, default_value = "auto", value_name = "SPACE")]
    space: CoordinateSpace,
}

// ── App ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ResultView {
    Stored,
    Analysis,
}

impl ResultView {
    fn key(self) -> ResetKey {
        match self {
            ResultView::Stored => "stored".into(),
            ResultView::Analysis => "analysis".into(),
        }
    }
}

struct ViewerApp {
    image_path: Option<PathBuf>,
    image_uri: String,
    viewport: Viewport,
    config: ViewerConfig,

    annotations: Vec<Annotation>,
    analysis: Vec<Annotation>,
    view: ResultView,

    toggles: Toggles,
    draw_mode: bool,
    new_fault: FaultKind,
    selected: Option<AnnotationId>,

    space: CoordinateSpace,
    resolved_space: CoordinateSpace,
    size_hint: Option<egui::Vec2>,
    natural: Option<egui::Vec2>,
    status: Option<String>,
}

fn image_uri(path: &Path) -> String {
    let abs = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    format!("file://{}", abs.display())
}

/// A drawn pixel rectangle, clipped to the image and expressed in the same
/// space as the list it joins. A normalized box sticking out of the unit
/// square would flip the whole list to pixel space.
fn drawn_to_caller_space(rect: ImageRect, space: CoordinateSpace, natural: Option<egui::Vec2>) -> ImageRect {
    let Some(n) = natural else {
        return rect;
    };
    let clipped = ImageRect::from_corners(
        rect.min().clamp(egui::Pos2::ZERO, n.to_pos2()),
        rect.max().clamp(egui::Pos2::ZERO, n.to_pos2()),
    );
    match space {
        CoordinateSpace::Normalized => clipped.scaled(1.0 / n.x, 1.0 / n.y),
        _ => clipped,
    }
}

/// Index of the annotation an event refers to: by id, then by the index if
/// it still holds the same rectangle, then by the first equal rectangle.
fn find_target(list: &[Annotation], index: usize, rect: &ImageRect, id: AnnotationId) -> Option<usize> {
    if let Some(pos) = list.iter().position(|a| a.id == id) {
        return Some(pos);
    }
    if list.get(index).is_some_and(|a| a.rect == *rect) {
        return Some(index);
    }
    list.iter().position(|a| a.rect == *rect)
}

impl ViewerApp {
    fn new(args: Args, config: ViewerConfig, initial: Option<AnnotationFile>) -> Self {
        let size_hint = match (args.width, args.height) {
            (Some(w), Some(h)) => Some(egui::vec2(w, h)),
            _ => None,
        };
        let mut app = Self {
            image_path: None,
            image_uri: String::new(),
            viewport: Viewport::new(config.clone()),
            config,
            annotations: Vec::new(),
            analysis: Vec::new(),
            view: ResultView::Stored,
            toggles: Toggles::default(),
            draw_mode: false,
            new_fault: FaultKind::None,
            selected: None,
            space: args.space,
            resolved_space: args.space,
            size_hint,
            natural: None,
            status: None,
        };
        if let Some(path) = args.image {
            app.open_image(path, initial.is_none());
        }
        if let Some(file) = initial {
            app.annotations = file.annotations;
            app.analysis = file.analysis;
        }
        app
    }

    fn open_image(&mut self, path: PathBuf, load_sidecar: bool) {
        info!(path = %path.display(), "opening image");
        self.image_uri = image_uri(&path);
        self.annotations.clear();
        self.analysis.clear();
        self.selected = None;
        self.view = ResultView::Stored;
        if load_sidecar {
            match store::load_sidecar(&path) {
                Ok(Some(file)) => {
                    self.annotations = file.annotations;
                    self.analysis = file.analysis;
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(%err, "could not read annotations sidecar");
                    self.status = Some(format!("Could not read annotations: {err}"));
                }
            }
        }
        self.image_path = Some(path);
    }

    fn auto_save(&mut self) {
        let Some(path) = &self.image_path else {
            return;
        };
        let file = AnnotationFile {
            annotations: self.annotations.clone(),
            analysis: self.analysis.clone(),
        };
        if let Err(err) = store::save_sidecar(path, &file) {
            warn!(%err, "could not save annotations");
            self.status = Some(format!("Could not save annotations: {err}"));
        }
    }

    fn export(&mut self) {
        let Some(path) = &self.image_path else {
            return;
        };
        let result = export::export_annotated(
            path,
            self.current(),
            self.space,
            &self.toggles,
            self.config.box_color,
            self.config.stroke_width,
        );
        self.status = Some(match result {
            Ok(out) => format!("Exported to {}", out.display()),
            Err(err) => {
                warn!(%err, "export failed");
                format!("Export failed: {err}")
            }
        });
    }

    fn current(&self) -> &[Annotation] {
        match self.view {
            ResultView::Stored => &self.annotations,
            ResultView::Analysis => &self.analysis,
        }
    }

    fn editable(&self) -> bool {
        self.view == ResultView::Stored
    }

    fn remove_selected(&mut self) {
        let Some(id) = self.selected.take() else {
            return;
        };
        let before = self.annotations.len();
        self.annotations.retain(|a| a.id != id);
        if self.annotations.len() != before {
            self.auto_save();
        }
    }

    fn apply(&mut self, event: OverlayEvent) {
        match event {
            OverlayEvent::DrawComplete(rect) => {
                if !self.editable() {
                    return;
                }
                let rect = drawn_to_caller_space(rect, self.resolved_space, self.natural);
                let mut ann = Annotation::new(rect).with_fault(self.new_fault.clone());
                ann.label = Some((self.annotations.len() + 1).to_string());
                ann.annotated_by = Some("user".to_owned());
                self.selected = Some(ann.id);
                self.annotations.push(ann);
                self.auto_save();
            }
            OverlayEvent::RemoveBox { index, rect, id } => {
                if !self.editable() {
                    return;
                }
                if let Some(pos) = find_target(&self.annotations, index, &rect, id) {
                    let removed = self.annotations.remove(pos);
                    if self.selected == Some(removed.id) {
                        self.selected = None;
                    }
                    self.auto_save();
                }
            }
            OverlayEvent::SelectBox { id, .. } => {
                self.selected = Some(id);
            }
        }
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("Open…").clicked() {
                if let Some(path) = rfd::FileDialog::new()
                    .add_filter("Images", &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "webp"])
                    .pick_file()
                {
                    // --width/--height described the image given on the command line
                    self.size_hint = None;
                    self.open_image(path, true);
                }
            }
            ui.separator();
            ui.selectable_value(&mut self.view, ResultView::Stored, "Stored result");
            ui.add_enabled_ui(!self.analysis.is_empty(), |ui| {
                ui.selectable_value(&mut self.view, ResultView::Analysis, "AI result");
            });
            ui.separator();
            ui.checkbox(&mut self.toggles.loose_joint, "Loose joint");
            ui.checkbox(&mut self.toggles.point_overload, "Point overload");
            ui.checkbox(&mut self.toggles.wire_overload, "Wire overload");
            ui.separator();
            ui.add_enabled_ui(self.editable(), |ui| {
                ui.toggle_value(&mut self.draw_mode, "Draw");
                egui::ComboBox::from_id_salt("new_fault")
                    .selected_text(self.new_fault.display_label())
                    .show_ui(ui, |ui| {
                        for kind in FaultKind::KNOWN {
                            let label = kind.display_label();
                            ui.selectable_value(&mut self.new_fault, kind, label);
                        }
                    });
            });
            ui.separator();
            if ui.button("Reset").clicked() {
                self.viewport.reset();
            }
            ui.label(format!("Zoom: {:.0}%", self.viewport.transform().scale * 100.0));
        });
    }

    fn side_panel(&mut self, ui: &mut egui::Ui) {
        let editable = self.editable();
        let mut changed = false;
        let mut delete = false;

        if let Some(ann) = self
            .selected
            .and_then(|id| self.annotations.iter_mut().find(|a| a.id == id))
            .filter(|_| editable)
        {
            ui.heading("Selected");
            egui::ComboBox::from_id_salt("selected_fault")
                .selected_text(ann.fault.display_label())
                .show_ui(ui, |ui| {
                    for kind in FaultKind::KNOWN {
                        let label = kind.display_label();
                        changed |= ui.selectable_value(&mut ann.fault, kind, label).changed();
                    }
                });
            let mut comment = ann.comment.clone().unwrap_or_default();
            if ui.text_edit_multiline(&mut comment).changed() {
                ann.comment = (!comment.trim().is_empty()).then_some(comment);
                changed = true;
            }
            delete = ui.button("Delete").clicked();
            ui.separator();
        }
        if changed {
            self.auto_save();
        }
        if delete {
            self.remove_selected();
        }

        ui.heading("Legend");
        let list = self.current();
        let entries = legend::build_legend(list);
        let mut clicked = None;
        TableBuilder::new(ui)
            .striped(true)
            .column(Column::auto())
            .column(Column::remainder())
            .column(Column::auto())
            .column(Column::auto())
            .header(18.0, |mut header| {
                header.col(|ui| {
                    ui.strong("#");
                });
                header.col(|ui| {
                    ui.strong("Fault");
                });
                header.col(|ui| {
                    ui.strong("By");
                });
                header.col(|ui| {
                    ui.strong("Severity");
                });
            })
            .body(|mut body| {
                for entry in &entries {
                    let id = list[entry.index].id;
                    body.row(18.0, |mut row| {
                        row.col(|ui| {
                            let text = (entry.index + 1).to_string();
                            if ui.selectable_label(self.selected == Some(id), text).clicked() {
                                clicked = Some(id);
                            }
                        });
                        row.col(|ui| {
                            ui.label(entry.label.as_str());
                        });
                        row.col(|ui| {
                            ui.label(entry.annotator.as_str());
                        });
                        row.col(|ui| {
                            ui.label(entry.severity.as_deref().unwrap_or("-"));
                        });
                    });
                }
            });
        if clicked.is_some() {
            self.selected = clicked;
        }
    }
}

// ── eframe App impl ────────────────────────────────────────────────────────

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if !ctx.wants_keyboard_input() {
            let (delete, export, escape) = ctx.input(|i| {
                (
                    i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace),
                    i.modifiers.command && i.key_pressed(egui::Key::S),
                    i.key_pressed(egui::Key::Escape),
                )
            });
            if delete && self.editable() {
                self.remove_selected();
            }
            if export {
                self.export();
            }
            if escape {
                self.selected = None;
                self.draw_mode = false;
            }
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui));

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                match &self.image_path {
                    Some(p) => ui.label(p.display().to_string()),
                    None => ui.label("No image. Use Open… to pick one."),
                };
                if let Some(status) = &self.status {
                    ui.separator();
                    ui.label(status.as_str());
                }
            });
        });

        egui::SidePanel::right("legend")
            .default_width(260.0)
            .show(ctx, |ui| self.side_panel(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let editable = self.editable();
                let list = match self.view {
                    ResultView::Stored => &self.annotations,
                    ResultView::Analysis => &self.analysis,
                };
                let out = OverlayViewer::new(&mut self.viewport, &self.image_uri, list)
                    .toggles(self.toggles)
                    .natural_size(self.size_hint)
                    .coordinate_space(self.space)
                    .allow_draw(self.draw_mode && editable)
                    .removable(editable)
                    .selectable(true)
                    .selected(self.selected)
                    .reset_key(Some(self.view.key()))
                    .show(ui);
                self.natural = out.natural_size;
                self.resolved_space = out.space;
                for event in out.events {
                    self.apply(event);
                }
            });
    }
}

// ── Main ────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ViewerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ViewerConfig::default(),
    };

    if let Some(path) = &args.image {
        if !path.exists() {
            anyhow::bail!("File not found: {}", path.display());
        }
    }

    let initial = match &args.boxes {
        Some(path) => Some(
            store::load_annotations(path)
                .with_context(|| format!("loading annotations {}", path.display()))?,
        ),
        None => None,
    };

    let title = match &args.image {
        Some(path) => format!(
            "thermal-overlay - {}",
            path.file_name().and_then(|n| n.to_str()).unwrap_or("")
        ),
        None => "thermal-overlay".to_owned(),
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title(&title),
        ..Default::default()
    };

    eframe::run_native(
        &title,
        options,
        Box::new(move |cc| {
            egui_extras::install_image_loaders(&cc.egui_ctx);
            Ok(Box::new(ViewerApp::new(args, config, initial)))
        }),
    )
    .map_err(|e| anyhow::anyhow!("failed to run viewer: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removal_prefers_id_then_index_then_value() {
        let rect = ImageRect::new(1.0, 1.0, 8.0, 8.0);
        let a = Annotation::new(rect);
        let b = Annotation::new(rect);
        let c = Annotation::new(ImageRect::new(20.0, 20.0, 8.0, 8.0));
        let list = vec![a.clone(), b.clone(), c.clone()];

        assert_eq!(find_target(&list, 0, &rect, b.id), Some(1));

        let stale = uuid::Uuid::new_v4();
        assert_eq!(find_target(&list, 1, &rect, stale), Some(1));
        // index drifted onto a different box: fall back to the first equal rectangle
        assert_eq!(find_target(&list, 2, &rect, stale), Some(0));
        assert_eq!(find_target(&list, 0, &ImageRect::new(5.0, 5.0, 5.0, 5.0), stale), None);
    }

    #[test]
    fn box_drawn_past_the_edge_keeps_list_normalized() {
        let natural = Some(egui::vec2(200.0, 100.0));
        let mut rects = vec![ImageRect::new(0.5, 0.5, 0.25, 0.25)];
        let drawn = ImageRect::new(10.0, 5.0, 208.0, 104.0);
        let stored = drawn_to_caller_space(drawn, CoordinateSpace::Normalized, natural);
        let expected = [0.05, 0.05, 0.95, 0.95];
        for (got, want) in stored.to_array().into_iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "{stored:?}");
        }
        rects.push(stored);
        assert_eq!(CoordinateSpace::Auto.resolve(&rects), CoordinateSpace::Normalized);

        let pixels = drawn_to_caller_space(drawn, CoordinateSpace::Pixels, natural);
        assert_eq!(pixels, ImageRect::new(10.0, 5.0, 190.0, 95.0));
    }

    #[test]
    fn cli_parses_space_and_hints() {
        let args = Args::try_parse_from([
            "thermal-overlay",
            "scan.png",
            "--space",
            "normalized",
            "--width",
            "640",
            "--height",
            "480",
        ])
        .unwrap();
        assert_eq!(args.space, CoordinateSpace::Normalized);
        assert_eq!(args.width, Some(640.0));
        assert!(Args::try_parse_from(["thermal-overlay", "--width", "640"]).is_err());
    }
}
