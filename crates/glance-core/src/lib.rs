//! glance-core — Annotation overlay compositor.
//!
//! Holds recognition results as drawable annotations and renders them onto a
//! display surface, mapping preview-image pixels into view pixels on every pass.

pub mod annotation;
pub mod overlay;
pub mod surface;
pub mod transform;
pub mod types;

pub use annotation::Annotation;
pub use overlay::Overlay;
pub use surface::{DrawCommand, Paint, RecordingSurface, Surface};
pub use transform::Transform;
pub use types::{Face, LabelScore, Landmark, LandmarkKind, Point, Recognition, Rect, TextElement};
