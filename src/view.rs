use eframe::egui;

use crate::annotation::Point;

pub const MIN_ZOOM: f32 = 0.05;
pub const MAX_ZOOM: f32 = 20.0;

/// Pan and zoom of the image inside the canvas.
#[derive(Clone, Debug)]
pub struct Viewport {
    pub pan: egui::Vec2,
    pub zoom: f32,
    image_size: egui::Vec2,
}

impl Viewport {
    pub fn new(image_size: (f32, f32)) -> Self {
        Self {
            pan: egui::Vec2::ZERO,
            zoom: 1.0,
            image_size: egui::vec2(image_size.0, image_size.1),
        }
    }

    pub fn image_size(&self) -> egui::Vec2 {
        self.image_size
    }

    /// Centers the image and picks the largest zoom that shows all of it.
    pub fn fit(&mut self, canvas_rect: egui::Rect) {
        self.pan = egui::Vec2::ZERO;
        if self.image_size.x <= 0.0 || self.image_size.y <= 0.0 {
            self.zoom = 1.0;
            return;
        }
        let zx = canvas_rect.width() / self.image_size.x;
        let zy = canvas_rect.height() / self.image_size.y;
        self.zoom = zx.min(zy).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Convert image-space coords to screen-space
    pub fn image_to_screen(&self, canvas_rect: egui::Rect, img_pos: egui::Pos2) -> egui::Pos2 {
        let center = canvas_rect.center();
        center + self.pan + (img_pos.to_vec2() - self.image_size * 0.5) * self.zoom
    }

    /// Convert screen-space coords to image-space
    pub fn screen_to_image(&self, canvas_rect: egui::Rect, screen_pos: egui::Pos2) -> egui::Pos2 {
        let center = canvas_rect.center();
        let rel = screen_pos - center - self.pan;
        egui::pos2(
            rel.x / self.zoom + self.image_size.x * 0.5,
            rel.y / self.zoom + self.image_size.y * 0.5,
        )
    }

    pub fn image_rect_on_screen(&self, canvas_rect: egui::Rect) -> egui::Rect {
        let top_left = self.image_to_screen(canvas_rect, egui::Pos2::ZERO);
        let bot_right =
            self.image_to_screen(canvas_rect, egui::pos2(self.image_size.x, self.image_size.y));
        egui::Rect::from_min_max(top_left, bot_right)
    }

    /// Image-space point under `screen_pos`, or `None` when the pointer is
    /// off the image.
    pub fn to_image(&self, canvas_rect: egui::Rect, screen_pos: egui::Pos2) -> Option<Point> {
        let p = self.screen_to_image(canvas_rect, screen_pos);
        let inside = p.x >= 0.0 && p.y >= 0.0 && p.x <= self.image_size.x && p.y <= self.image_size.y;
        inside.then(|| Point::from(p))
    }

    /// Image-space point under `screen_pos`, pulled onto the image edge.
    pub fn to_image_clamped(&self, canvas_rect: egui::Rect, screen_pos: egui::Pos2) -> Point {
        let p = self.screen_to_image(canvas_rect, screen_pos);
        Point::new(
            p.x.clamp(0.0, self.image_size.x),
            p.y.clamp(0.0, self.image_size.y),
        )
    }

    pub fn pan_by(&mut self, delta: egui::Vec2) {
        self.pan += delta;
    }

    /// Zooms by `factor` keeping the image point under `cursor` fixed.
    pub fn zoom_at(&mut self, canvas_rect: egui::Rect, cursor: egui::Pos2, factor: f32) {
        let new_zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        let cursor_rel = cursor - canvas_rect.center() - self.pan;
        self.pan -= cursor_rel * (new_zoom / self.zoom - 1.0);
        self.zoom = new_zoom;
    }
}
