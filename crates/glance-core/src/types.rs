use serde::{Deserialize, Serialize};

/// A point in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle given by its edges, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Anchor used for captions drawn under a box.
    pub fn bottom_left(&self) -> Point {
        Point::new(self.left, self.bottom)
    }
}

/// One recognized text element (a word) and its bounding box in preview space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextElement {
    pub text: String,
    pub bounds: Rect,
}

/// Named facial landmark positions a face detector may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkKind {
    LeftEye,
    RightEye,
    Nose,
    LeftMouth,
    RightMouth,
    LeftEar,
    RightEar,
}

impl LandmarkKind {
    /// Caption drawn next to the landmark marker.
    pub fn name(self) -> &'static str {
        match self {
            Self::LeftEye => "LeftEye",
            Self::RightEye => "RightEye",
            Self::Nose => "Nose",
            Self::LeftMouth => "LeftMouth",
            Self::RightMouth => "RightMouth",
            Self::LeftEar => "LeftEar",
            Self::RightEar => "RightEar",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub kind: LandmarkKind,
    pub position: Point,
}

/// A detected face with classification and landmark data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub bounds: Rect,
    /// Probability in [0, 1] that the face is smiling.
    pub smiling_probability: f32,
    #[serde(default)]
    pub landmarks: Vec<Landmark>,
}

impl Face {
    /// Position of the given landmark, if the detector reported it.
    pub fn landmark(&self, kind: LandmarkKind) -> Option<Point> {
        self.landmarks
            .iter()
            .find(|l| l.kind == kind)
            .map(|l| l.position)
    }
}

/// One classifier output: a vocabulary label and its confidence in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub confidence: f32,
}

/// Structured output of a single recognition request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum Recognition {
    Text(Vec<TextElement>),
    Faces(Vec<Face>),
    Labels(Vec<LabelScore>),
}

impl Recognition {
    /// True when the detector ran successfully but found nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(items) => items.is_empty(),
            Self::Faces(items) => items.is_empty(),
            Self::Labels(items) => items.is_empty(),
        }
    }

    /// Highest-confidence label, if this is a classification result.
    ///
    /// Ties keep the earliest label in vocabulary order.
    pub fn top_label(&self) -> Option<&LabelScore> {
        let Self::Labels(items) = self else {
            return None;
        };
        items.iter().fold(None, |best: Option<&LabelScore>, item| match best {
            Some(b) if b.confidence >= item.confidence => Some(b),
            _ => Some(item),
        })
    }
}
