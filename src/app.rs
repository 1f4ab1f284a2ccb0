use eframe::egui;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

use crate::annotation::{Annotations, Mode, Point};
use crate::client::{encode_png, SegmentationClient};
use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::mask::{download_name, Mask};
use crate::prompt::PromptPayload;
use crate::tracker::{RequestTracker, Ticket};
use crate::view::Viewport;

const POINT_RADIUS: f32 = 3.0;
const BOX_STROKE: f32 = 2.0;
/// Drags shorter than this many screen pixels on both axes do not make a box.
const MIN_BOX_EXTENT: f32 = 5.0;

const POSITIVE_COLOR: egui::Color32 = egui::Color32::from_rgb(0, 255, 255);
const NEGATIVE_COLOR: egui::Color32 = egui::Color32::from_rgb(255, 0, 0);
const BOX_COLOR: egui::Color32 = egui::Color32::from_rgb(0, 128, 0);

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "tif", "tiff"];

struct SourceImage {
    path: PathBuf,
    name: Option<String>,
    image: DynamicImage,
    png: Vec<u8>,
}

struct Completed {
    ticket: Ticket,
    result: Result<Mask>,
}

#[derive(Default)]
struct Shortcuts {
    point_mode: bool,
    box_mode: bool,
    undo: bool,
    redo: bool,
    submit: bool,
    download: bool,
    cancel_box: bool,
}

// ── App ─────────────────────────────────────────────────────────────────────

pub struct AnnotateApp {
    client: SegmentationClient,
    runtime: Runtime,
    tx: mpsc::UnboundedSender<Completed>,
    rx: mpsc::UnboundedReceiver<Completed>,
    tracker: RequestTracker,
    auto_submit: bool,

    source: Option<SourceImage>,
    texture: Option<egui::TextureHandle>,
    mask: Option<Mask>,
    mask_texture: Option<egui::TextureHandle>,

    annotations: Annotations,
    mode: Mode,

    viewport: Viewport,
    needs_fit: bool,
    panning: bool,

    status: Option<String>,
}

impl AnnotateApp {
    pub fn new(config: &Config) -> Result<Self> {
        let client = SegmentationClient::new(config)?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("sam-client")
            .enable_all()
            .build()?;
        let (tx, rx) = mpsc::unbounded_channel();
        log::info!("segmentation endpoint: {}", client.endpoint());

        let mut app = Self {
            client,
            runtime,
            tx,
            rx,
            tracker: RequestTracker::new(),
            auto_submit: config.auto_submit(),
            source: None,
            texture: None,
            mask: None,
            mask_texture: None,
            annotations: Annotations::new(),
            mode: Mode::default(),
            viewport: Viewport::new((0.0, 0.0)),
            needs_fit: true,
            panning: false,
            status: None,
        };
        if let Some(path) = &config.image {
            app.open_image(path);
        }
        Ok(app)
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub fn mask(&self) -> Option<&Mask> {
        self.mask.as_ref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.tracker.is_loading()
    }

    fn load_image(&mut self, path: &Path) -> Result<()> {
        let image = image::open(path)?;
        let png = encode_png(&image)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string);
        log::info!(
            "loaded {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );

        self.viewport = Viewport::new((image.width() as f32, image.height() as f32));
        self.needs_fit = true;
        self.source = Some(SourceImage {
            path: path.to_path_buf(),
            name,
            image,
            png,
        });
        self.texture = None;
        self.annotations.reset();
        self.drop_mask();
        self.tracker.invalidate();
        self.status = None;
        Ok(())
    }

    /// Loads `path`, reporting failures in the status bar.
    pub fn open_image(&mut self, path: &Path) {
        if let Err(e) = self.load_image(path) {
            log::error!("failed to open {}: {}", path.display(), e);
            self.status = Some(format!("Could not open {}: {}", path.display(), e));
        }
    }

    fn pick_image(&mut self) {
        let picked = rfd::FileDialog::new()
            .add_filter("Images", IMAGE_EXTENSIONS)
            .pick_file();
        if let Some(path) = picked {
            self.open_image(&path);
        }
    }

    fn drop_mask(&mut self) {
        self.mask = None;
        self.mask_texture = None;
    }

    pub fn clear(&mut self) {
        self.annotations.clear();
        self.drop_mask();
        self.tracker.invalidate();
        self.status = None;
    }

    /// Switching tools abandons a box that is still being dragged.
    fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            self.annotations.cancel_box();
            self.mode = mode;
        }
    }

    /// Ends a primary drag. The box is only committed when the drag finishes
    /// in box mode without a pan in progress; otherwise it is dropped.
    fn finish_box_drag(&mut self) -> bool {
        if self.mode == Mode::Box && !self.panning {
            self.annotations.end_box(MIN_BOX_EXTENT / self.viewport.zoom)
        } else {
            self.annotations.cancel_box();
            false
        }
    }

    fn on_annotations_changed(&mut self, ctx: &egui::Context) {
        if self.auto_submit {
            self.submit(ctx);
        }
    }

    /// Sends the current prompts unless there is nothing to send or a request
    /// is already running, in which case it is retried once that finishes.
    pub fn submit(&mut self, ctx: &egui::Context) {
        let Some(source) = &self.source else {
            return;
        };
        let Some(payload) = PromptPayload::from_annotations(&self.annotations) else {
            // Nothing left to prompt with: a mask still in flight is outdated.
            self.tracker.invalidate();
            return;
        };
        let Some(ticket) = self.tracker.try_begin() else {
            log::debug!("request in flight, submission queued");
            return;
        };

        if log::log_enabled!(log::Level::Debug) {
            if let Ok(json) = serde_json::to_string(&payload) {
                log::debug!("submitting request #{}: {}", ticket.id, json);
            }
        }

        let client = self.client.clone();
        let tx = self.tx.clone();
        let ctx = ctx.clone();
        let png = source.png.clone();
        self.runtime.spawn(async move {
            let result = client.segment(png, &payload).await;
            let _ = tx.send(Completed { ticket, result });
            ctx.request_repaint();
        });
    }

    fn poll_responses(&mut self, ctx: &egui::Context) {
        while let Ok(done) = self.rx.try_recv() {
            let outcome = self.tracker.finish(done.ticket);
            if outcome.apply {
                self.apply_result(done.result);
            } else {
                log::debug!("discarding stale response #{}", done.ticket.id);
            }
            if outcome.resubmit {
                self.submit(ctx);
            }
        }
    }

    fn apply_result(&mut self, result: Result<Mask>) {
        match result {
            Ok(mask) => {
                self.mask = Some(mask);
                self.mask_texture = None;
                self.status = None;
            }
            Err(ClientError::NoMask) => {
                log::warn!("segmentation service returned no mask");
                self.status = Some("No mask found".to_string());
            }
            Err(e) => {
                log::error!("segmentation failed: {}", e);
                self.status = Some(e.to_string());
            }
        }
    }

    fn download_mask(&mut self) {
        let Some(mask) = &self.mask else {
            self.status = Some("No mask to download".to_string());
            return;
        };
        let name = download_name(self.source.as_ref().and_then(|s| s.name.as_deref()));
        let mut dialog = rfd::FileDialog::new()
            .add_filter("PNG", &["png"])
            .set_file_name(name.as_str());
        if let Some(dir) = self.source.as_ref().and_then(|s| s.path.parent()) {
            dialog = dialog.set_directory(dir);
        }
        let Some(path) = dialog.save_file() else {
            return;
        };
        match mask.save(&path) {
            Ok(()) => self.status = Some(format!("Saved {}", path.display())),
            Err(e) => {
                log::error!("failed to save mask: {}", e);
                self.status = Some(format!("Could not save mask: {}", e));
            }
        }
    }

    fn ensure_textures(&mut self, ctx: &egui::Context) {
        if self.texture.is_none() {
            if let Some(source) = &self.source {
                let rgba = source.image.to_rgba8();
                let size = [rgba.width() as usize, rgba.height() as usize];
                let pixels = rgba.as_flat_samples();
                let color_image =
                    egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
                self.texture =
                    Some(ctx.load_texture("image", color_image, egui::TextureOptions::LINEAR));
            }
        }
        if self.mask_texture.is_none() {
            if let Some(mask) = &self.mask {
                let overlay = mask.overlay_rgba();
                let size = [overlay.width() as usize, overlay.height() as usize];
                let pixels = overlay.as_flat_samples();
                let color_image =
                    egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
                self.mask_texture =
                    Some(ctx.load_texture("mask", color_image, egui::TextureOptions::LINEAR));
            }
        }
    }

    fn draw_annotations(&self, painter: &egui::Painter, canvas_rect: egui::Rect) {
        let to_screen = |p: Point| self.viewport.image_to_screen(canvas_rect, p.to_pos2());

        for p in self.annotations.points() {
            painter.circle_filled(to_screen(*p), POINT_RADIUS, POSITIVE_COLOR);
        }
        for p in self.annotations.negative_points() {
            painter.circle_filled(to_screen(*p), POINT_RADIUS, NEGATIVE_COLOR);
        }

        let stroke = egui::Stroke::new(BOX_STROKE, BOX_COLOR);
        for b in self
            .annotations
            .boxes()
            .iter()
            .chain(self.annotations.current_box())
        {
            let r = b.to_rect();
            let rect = egui::Rect::from_two_pos(to_screen(r.min.into()), to_screen(r.max.into()));
            painter.rect_stroke(rect, 0.0, stroke, egui::StrokeKind::Middle);
        }
    }

    fn read_shortcuts(ctx: &egui::Context) -> Shortcuts {
        ctx.input(|i| {
            let command = i.modifiers.command;
            Shortcuts {
                point_mode: !command && i.key_pressed(egui::Key::P),
                box_mode: !command && i.key_pressed(egui::Key::B),
                undo: command && !i.modifiers.shift && i.key_pressed(egui::Key::Z),
                redo: command && i.modifiers.shift && i.key_pressed(egui::Key::Z),
                submit: i.key_pressed(egui::Key::Enter),
                download: command && i.key_pressed(egui::Key::S),
                cancel_box: i.key_pressed(egui::Key::Escape),
            }
        })
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let keys = Self::read_shortcuts(ctx);
        if keys.point_mode {
            self.set_mode(Mode::Point);
        }
        if keys.box_mode {
            self.set_mode(Mode::Box);
        }
        if keys.undo && self.annotations.undo() {
            self.on_annotations_changed(ctx);
        }
        if keys.redo && self.annotations.redo() {
            self.on_annotations_changed(ctx);
        }
        if keys.submit {
            self.submit(ctx);
        }
        if keys.download {
            self.download_mask();
        }
        if keys.cancel_box {
            self.annotations.cancel_box();
        }

        let dropped = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .find_map(|f| f.path.clone())
        });
        if let Some(path) = dropped {
            self.open_image(&path);
        }
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        let ctx = ui.ctx().clone();
        ui.horizontal(|ui| {
            for (mode, label) in [(Mode::Point, "Point Mode"), (Mode::Box, "Box Mode")] {
                if ui.selectable_label(self.mode == mode, label).clicked() {
                    self.set_mode(mode);
                }
            }
            if ui.button("Clear").clicked() {
                self.clear();
            }
            ui.separator();
            if ui
                .add_enabled(self.annotations.can_undo(), egui::Button::new("Undo"))
                .clicked()
                && self.annotations.undo()
            {
                self.on_annotations_changed(&ctx);
            }
            if ui
                .add_enabled(self.annotations.can_redo(), egui::Button::new("Redo"))
                .clicked()
                && self.annotations.redo()
            {
                self.on_annotations_changed(&ctx);
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("Open Image").clicked() {
                    self.pick_image();
                }
                if ui.button("Submit").clicked() {
                    self.submit(&ctx);
                }
                if ui.button("Download Mask").clicked() {
                    self.download_mask();
                }
                ui.separator();
                ui.label(format!("Zoom: {:.0}%", self.viewport.zoom * 100.0));
                if self.tracker.is_loading() {
                    ui.add(egui::Spinner::new());
                }
            });
        });
    }

    fn status_bar(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(format!(
                "{} point(s), {} negative(s), {} box(es)",
                self.annotations.points().len(),
                self.annotations.negative_points().len(),
                self.annotations.boxes().len(),
            ));
            if let Some(mask) = &self.mask {
                ui.separator();
                if let Some(score) = mask.score {
                    ui.label(format!("Mask score: {:.3}", score));
                }
                ui.label(format!("Coverage: {:.1}%", mask.coverage() * 100.0));
            }
            if let Some(status) = &self.status {
                ui.separator();
                ui.label(status.as_str());
            }
        });
    }

    fn canvas(&mut self, ui: &mut egui::Ui) {
        let ctx = ui.ctx().clone();
        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let canvas_rect = response.rect;

        painter.rect_filled(canvas_rect, 0.0, egui::Color32::from_gray(40));

        let Some(tex) = &self.texture else {
            painter.text(
                canvas_rect.center(),
                egui::Align2::CENTER_CENTER,
                "Drop an image here, or use Open Image",
                egui::FontId::proportional(18.0),
                egui::Color32::from_gray(180),
            );
            return;
        };

        if self.needs_fit {
            self.viewport.fit(canvas_rect);
            self.needs_fit = false;
        }

        let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
        let img_rect = self.viewport.image_rect_on_screen(canvas_rect);
        painter.image(tex.id(), img_rect, uv, egui::Color32::WHITE);
        if let Some(mask_tex) = &self.mask_texture {
            painter.image(mask_tex.id(), img_rect, uv, egui::Color32::WHITE);
        }
        self.draw_annotations(&painter, canvas_rect);

        // Pan with the middle mouse button
        let middle_down = ctx.input(|i| i.pointer.middle_down());
        if middle_down {
            let delta = ctx.input(|i| i.pointer.delta());
            self.viewport.pan_by(delta);
            self.panning = true;
        } else {
            self.panning = false;
        }

        // Zoom with the scroll wheel
        let scroll_delta = ctx.input(|i| i.smooth_scroll_delta.y);
        if scroll_delta != 0.0 && response.hovered() {
            if let Some(cursor) = response.hover_pos() {
                self.viewport
                    .zoom_at(canvas_rect, cursor, 1.0 + scroll_delta * 0.002);
            }
        }

        let mut changed = false;

        if response.drag_stopped_by(egui::PointerButton::Primary) {
            changed |= self.finish_box_drag();
        } else if self.annotations.current_box().is_some()
            && !ctx.input(|i| i.pointer.primary_down())
        {
            self.annotations.cancel_box();
        }

        if self.panning {
            return;
        }

        let zoom = self.viewport.zoom;

        if response.clicked_by(egui::PointerButton::Primary) && self.mode == Mode::Point {
            if let Some(p) = response
                .interact_pointer_pos()
                .and_then(|pos| self.viewport.to_image(canvas_rect, pos))
            {
                changed |= self.annotations.add_point(p, zoom);
            }
        }

        if response.clicked_by(egui::PointerButton::Secondary) {
            if let Some(p) = response
                .interact_pointer_pos()
                .and_then(|pos| self.viewport.to_image(canvas_rect, pos))
            {
                changed |= self.annotations.secondary_action(p, self.mode, zoom);
            }
        }

        if self.mode == Mode::Box {
            if response.drag_started_by(egui::PointerButton::Primary) {
                if let Some(p) = response
                    .interact_pointer_pos()
                    .and_then(|pos| self.viewport.to_image(canvas_rect, pos))
                {
                    self.annotations.begin_box(p);
                }
            }

            if response.dragged_by(egui::PointerButton::Primary) {
                if let Some(pos) = response.interact_pointer_pos() {
                    let p = self.viewport.to_image_clamped(canvas_rect, pos);
                    self.annotations.drag_box(p);
                }
            }
        }

        if changed {
            self.on_annotations_changed(&ctx);
        }
    }
}

// ── eframe App impl ────────────────────────────────────────────────────────

impl eframe::App for AnnotateApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_responses(ctx);
        self.handle_shortcuts(ctx);
        self.ensure_textures(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui));
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| self.status_bar(ui));
        egui::CentralPanel::default().show(ctx, |ui| self.canvas(ui));

        if self.tracker.is_loading() {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
    }
}
