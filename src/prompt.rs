//! Prompt encoding for the `/sam` endpoint.
//!
//! The service reads multipart form fields: `image` (file), `points` (JSON
//! list of `[x, y]`), `boxes` (JSON `[x1, y1, x2, y2]` for a single box) and
//! `negatives` (JSON list of `[x, y]`). Positive points get label 1 and
//! negatives label 0 on the server side.

use serde::Serialize;

use crate::annotation::{Annotations, Point};
use crate::error::Result;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PromptPayload {
    pub points: Vec<[f32; 2]>,
    pub negatives: Vec<[f32; 2]>,
    /// Only the first drawn box is sent; the service accepts a single box.
    #[serde(rename = "boxes")]
    pub box_corners: Option<[f32; 4]>,
}

fn coords(points: &[Point]) -> Vec<[f32; 2]> {
    points.iter().map(|p| [p.x, p.y]).collect()
}

impl PromptPayload {
    /// `None` unless there is at least one positive point or box.
    pub fn from_annotations(annotations: &Annotations) -> Option<Self> {
        if !annotations.has_prompt() {
            return None;
        }
        Some(Self {
            points: coords(annotations.points()),
            negatives: coords(annotations.negative_points()),
            box_corners: annotations.boxes().first().map(|b| b.corners()),
        })
    }

    /// Text fields in the order they are appended to the form. Optional
    /// fields are left out entirely rather than sent empty.
    pub fn form_fields(&self) -> Result<Vec<(&'static str, String)>> {
        let mut fields = vec![("points", serde_json::to_string(&self.points)?)];
        if let Some(corners) = &self.box_corners {
            fields.push(("boxes", serde_json::to_string(corners)?));
        }
        if !self.negatives.is_empty() {
            fields.push(("negatives", serde_json::to_string(&self.negatives)?));
        }
        Ok(fields)
    }

    pub fn prompt_count(&self) -> usize {
        self.points.len() + self.negatives.len() + usize::from(self.box_corners.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Mode;

    #[test]
    fn test_no_payload_without_positive_prompt() {
        let mut a = Annotations::new();
        assert!(PromptPayload::from_annotations(&a).is_none());
        a.secondary_action(Point::new(5.0, 5.0), Mode::Point, 1.0);
        assert!(PromptPayload::from_annotations(&a).is_none());
    }

    #[test]
    fn test_points_only() {
        let mut a = Annotations::new();
        a.add_point(Point::new(10.0, 20.5), 1.0);
        a.add_point(Point::new(100.0, 200.0), 1.0);
        let payload = PromptPayload::from_annotations(&a).unwrap();
        let fields = payload.form_fields().unwrap();
        assert_eq!(fields, vec![("points", "[[10.0,20.5],[100.0,200.0]]".to_string())]);
    }

    #[test]
    fn test_box_sends_first_box_as_corners() {
        let mut a = Annotations::new();
        a.begin_box(Point::new(80.0, 90.0));
        a.drag_box(Point::new(20.0, 30.0));
        a.end_box(1.0);
        a.begin_box(Point::new(200.0, 200.0));
        a.drag_box(Point::new(300.0, 300.0));
        a.end_box(1.0);
        a.secondary_action(Point::new(5.0, 5.0), Mode::Box, 1.0);

        let payload = PromptPayload::from_annotations(&a).unwrap();
        assert_eq!(payload.prompt_count(), 2);
        let fields = payload.form_fields().unwrap();
        assert_eq!(
            fields,
            vec![
                ("points", "[]".to_string()),
                ("boxes", "[20.0,30.0,80.0,90.0]".to_string()),
                ("negatives", "[[5.0,5.0]]".to_string()),
            ]
        );
    }
}
