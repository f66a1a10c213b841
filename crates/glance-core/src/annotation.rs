//! Drawable annotations built from recognition results.

use crate::surface::{Paint, Surface};
use crate::transform::Transform;
use crate::types::{Face, LabelScore, LandmarkKind, Point, Recognition, Rect, TextElement};

// --- Shared paint configuration ---
const STROKE_WIDTH: f32 = 4.0;
const TEXT_SIZE: f32 = 50.0;
const FACE_TEXT_SIZE: f32 = 30.0;
const LABEL_TEXT_SIZE: f32 = 40.0;
const LANDMARK_RADIUS: f32 = 10.0;
/// Label captions are not tied to a region; drawn at a fixed view-space anchor.
const LABEL_ANCHOR: Point = Point::new(20.0, 60.0);
/// Landmarks drawn on faces; others reported by the detector are ignored.
const DRAWN_LANDMARKS: [LandmarkKind; 2] = [LandmarkKind::LeftEye, LandmarkKind::RightEye];

const RECT_PAINT: Paint = Paint {
    color: Paint::RED,
    stroke_width: STROKE_WIDTH,
    text_size: TEXT_SIZE,
};

const fn text_paint(text_size: f32) -> Paint {
    Paint {
        color: Paint::RED,
        stroke_width: STROKE_WIDTH,
        text_size,
    }
}

/// One renderable recognition result. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    /// Recognized text: outlined box with the string under it.
    Text(TextElement),
    /// Detected face: outlined box, smile caption, eye markers.
    Face(Face),
    /// Classifier caption, typically `"<label>: <score>"`.
    Label(String),
}

impl Annotation {
    pub fn label(top: &LabelScore) -> Self {
        Self::Label(format!("{}: {:.2}", top.label, top.confidence))
    }

    /// Draw onto `surface`, mapping preview coordinates with `transform`.
    pub fn draw(&self, surface: &mut dyn Surface, transform: &Transform) {
        match self {
            Self::Text(element) => draw_text_element(surface, transform, element),
            Self::Face(face) => draw_face(surface, transform, face),
            Self::Label(caption) => {
                surface.draw_text(caption, LABEL_ANCHOR, &text_paint(LABEL_TEXT_SIZE));
            }
        }
    }
}

fn draw_text_element(surface: &mut dyn Surface, transform: &Transform, element: &TextElement) {
    let rect: Rect = transform.map_rect(element.bounds);
    surface.stroke_rect(rect, &RECT_PAINT);
    surface.draw_text(&element.text, rect.bottom_left(), &text_paint(TEXT_SIZE));
}

fn draw_face(surface: &mut dyn Surface, transform: &Transform, face: &Face) {
    let rect = transform.map_rect(face.bounds);
    let paint = text_paint(FACE_TEXT_SIZE);
    surface.stroke_rect(rect, &RECT_PAINT);
    surface.draw_text(&smile_caption(face.smiling_probability), rect.bottom_left(), &paint);

    for kind in DRAWN_LANDMARKS {
        let Some(position) = face.landmark(kind) else {
            continue;
        };
        let center = transform.map_point(position);
        surface.fill_circle(center, LANDMARK_RADIUS, &paint);
        surface.draw_text(kind.name(), center, &paint);
    }
}

fn smile_caption(probability: f32) -> String {
    format!("Smile: {:.1}%", probability * 100.0)
}

impl Recognition {
    /// Convert a result into annotations.
    ///
    /// Text yields one annotation per element and faces one per face; a
    /// classification collapses to a single caption for the top label.
    pub fn into_annotations(self) -> Vec<Annotation> {
        match self {
            Recognition::Text(elements) => elements.into_iter().map(Annotation::Text).collect(),
            Recognition::Faces(faces) => faces.into_iter().map(Annotation::Face).collect(),
            labels @ Recognition::Labels(_) => {
                labels.top_label().map(Annotation::label).into_iter().collect()
            }
        }
    }
}
