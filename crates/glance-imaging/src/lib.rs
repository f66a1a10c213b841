//! glance-imaging — Image processing around the overlay.
//!
//! Normalizes captured photos for display and detection, encodes them into
//! classifier input tensors, and rasterizes overlay annotations.

pub mod labels;
pub mod normalize;
pub mod raster;
pub mod tensor;

pub use labels::{LabelError, LabelVocabulary};
pub use normalize::{normalize, normalize_image, normalize_with, NormalizeError, NormalizeOptions};
pub use raster::{compose, load_font, RasterError, RasterSurface};
pub use tensor::{encode, TensorBuffer};
