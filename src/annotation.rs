use eframe::egui;

/// Screen-space radius within which a primary click is considered to land on
/// an existing positive point.
pub const ADD_POINT_RADIUS: f32 = 15.0;
/// Screen-space radius used when a secondary click looks for a point to remove.
pub const REMOVE_POINT_RADIUS: f32 = 10.0;

// ── Data Model ──────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn to_pos2(self) -> egui::Pos2 {
        egui::pos2(self.x, self.y)
    }
}

impl From<egui::Pos2> for Point {
    fn from(p: egui::Pos2) -> Self {
        Self { x: p.x, y: p.y }
    }
}

/// A box anchored where the drag started. `width` and `height` go negative
/// when the pointer moves up or left of the anchor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub start_x: f32,
    pub start_y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn anchored(at: Point) -> Self {
        Self {
            start_x: at.x,
            start_y: at.y,
            width: 0.0,
            height: 0.0,
        }
    }

    /// Same rectangle with non-negative extents.
    pub fn normalized(&self) -> Self {
        let [x1, y1, x2, y2] = self.corners();
        Self {
            start_x: x1,
            start_y: y1,
            width: x2 - x1,
            height: y2 - y1,
        }
    }

    /// `[x1, y1, x2, y2]` with the top-left corner first.
    pub fn corners(&self) -> [f32; 4] {
        let (ax, bx) = (self.start_x, self.start_x + self.width);
        let (ay, by) = (self.start_y, self.start_y + self.height);
        [ax.min(bx), ay.min(by), ax.max(bx), ay.max(by)]
    }

    pub fn contains(&self, p: Point) -> bool {
        let [x1, y1, x2, y2] = self.corners();
        p.x >= x1 && p.x <= x2 && p.y >= y1 && p.y <= y2
    }

    pub fn to_rect(&self) -> egui::Rect {
        let [x1, y1, x2, y2] = self.corners();
        egui::Rect::from_min_max(egui::pos2(x1, y1), egui::pos2(x2, y2))
    }
}

/// First point within `threshold` of `pos`, in insertion order.
pub fn find_nearby_point(points: &[Point], pos: Point, threshold: f32) -> Option<usize> {
    points.iter().position(|p| p.distance(pos) <= threshold)
}

// ── Tool / Interaction State ────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Point,
    Box,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Snapshot {
    points: Vec<Point>,
    negative_points: Vec<Point>,
    boxes: Vec<BoundingBox>,
}

#[derive(Debug, Default)]
pub struct Annotations {
    points: Vec<Point>,
    negative_points: Vec<Point>,
    boxes: Vec<BoundingBox>,
    current_box: Option<BoundingBox>,

    undo_stack: Vec<Snapshot>,
    redo_stack: Vec<Snapshot>,
}

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn negative_points(&self) -> &[Point] {
        &self.negative_points
    }

    pub fn boxes(&self) -> &[BoundingBox] {
        &self.boxes
    }

    pub fn current_box(&self) -> Option<&BoundingBox> {
        self.current_box.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.negative_points.is_empty() && self.boxes.is_empty()
    }

    /// Negative points alone are not enough to prompt the model.
    pub fn has_prompt(&self) -> bool {
        !self.points.is_empty() || !self.boxes.is_empty()
    }

    /// Primary click in point mode. `scale` is the current zoom, used to turn
    /// the screen-space hit radius into image space.
    pub fn add_point(&mut self, pos: Point, scale: f32) -> bool {
        if find_nearby_point(&self.points, pos, ADD_POINT_RADIUS / scale).is_some() {
            return false;
        }
        self.push_undo();
        self.points.push(pos);
        true
    }

    /// Secondary click: removes whatever lies under the pointer, or drops a
    /// negative point when nothing does. Boxes are only hit in box mode.
    pub fn secondary_action(&mut self, pos: Point, mode: Mode, scale: f32) -> bool {
        let radius = REMOVE_POINT_RADIUS / scale;

        if let Some(idx) = find_nearby_point(&self.points, pos, radius) {
            self.push_undo();
            self.points.remove(idx);
            return true;
        }

        let box_idx = match mode {
            Mode::Box => self.boxes.iter().position(|b| b.contains(pos)),
            Mode::Point => None,
        };
        if let Some(idx) = box_idx {
            self.push_undo();
            self.boxes.remove(idx);
            return true;
        }

        self.push_undo();
        match find_nearby_point(&self.negative_points, pos, radius) {
            Some(idx) => {
                self.negative_points.remove(idx);
            }
            None => self.negative_points.push(pos),
        }
        true
    }

    pub fn begin_box(&mut self, pos: Point) {
        self.current_box = Some(BoundingBox::anchored(pos));
    }

    pub fn drag_box(&mut self, pos: Point) {
        if let Some(b) = self.current_box.as_mut() {
            b.width = pos.x - b.start_x;
            b.height = pos.y - b.start_y;
        }
    }

    /// Commits the in-progress box unless it is smaller than `min_extent` on
    /// both axes. Returns whether a box was added.
    pub fn end_box(&mut self, min_extent: f32) -> bool {
        let Some(b) = self.current_box.take() else {
            return false;
        };
        if b.width.abs() < min_extent && b.height.abs() < min_extent {
            log::debug!("discarding degenerate box {:?}", b);
            return false;
        }
        self.push_undo();
        self.boxes.push(b.normalized());
        true
    }

    pub fn cancel_box(&mut self) {
        self.current_box = None;
    }

    pub fn clear(&mut self) -> bool {
        self.current_box = None;
        if self.is_empty() {
            return false;
        }
        self.push_undo();
        self.points.clear();
        self.negative_points.clear();
        self.boxes.clear();
        true
    }

    /// Forgets annotations and history, used when a new image is loaded.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo(&mut self) -> bool {
        let Some(prev) = self.undo_stack.pop() else {
            return false;
        };
        let current = self.snapshot();
        self.redo_stack.push(current);
        self.restore(prev);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(next) = self.redo_stack.pop() else {
            return false;
        };
        let current = self.snapshot();
        self.undo_stack.push(current);
        self.restore(next);
        true
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            points: self.points.clone(),
            negative_points: self.negative_points.clone(),
            boxes: self.boxes.clone(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.points = snapshot.points;
        self.negative_points = snapshot.negative_points;
        self.boxes = snapshot.boxes;
        self.current_box = None;
    }

    fn push_undo(&mut self) {
        let current = self.snapshot();
        self.undo_stack.push(current);
        self.redo_stack.clear();
    }
}
