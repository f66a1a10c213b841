//! Classifier input encoding.
//!
//! The classifier consumes a quantized NHWC tensor: batch 1, RGB, one byte
//! per channel, rows top to bottom. The byte layout here is that contract.

use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::{ArrayView4, ShapeError};

pub const DIM_BATCH_SIZE: usize = 1;
pub const DIM_PIXEL_SIZE: usize = 3;
/// Default classifier input resolution (MobileNet).
pub const DEFAULT_INPUT_SIZE: u32 = 224;

/// Flat `1 × height × width × 3` RGB byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl TensorBuffer {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// NHWC shape `[1, height, width, 3]`.
    pub fn shape(&self) -> [usize; 4] {
        [
            DIM_BATCH_SIZE,
            self.height as usize,
            self.width as usize,
            DIM_PIXEL_SIZE,
        ]
    }

    /// Zero-copy NHWC view for the inference runtime.
    pub fn as_array(&self) -> Result<ArrayView4<'_, u8>, ShapeError> {
        let [n, h, w, c] = self.shape();
        ArrayView4::from_shape((n, h, w, c), &self.data)
    }
}

/// Resample `image` to exactly `width` × `height` (aspect ratio is not
/// preserved) and serialize it as RGB bytes, row-major.
pub fn encode(image: &DynamicImage, width: u32, height: u32) -> TensorBuffer {
    let rgb = if image.width() == width && image.height() == height {
        image.to_rgb8()
    } else {
        image.resize_exact(width, height, FilterType::Triangle).to_rgb8()
    };

    // RgbImage stores pixels row-major as [r, g, b] triples: the tensor layout.
    let data = rgb.into_raw();
    debug_assert_eq!(
        data.len(),
        DIM_BATCH_SIZE * height as usize * width as usize * DIM_PIXEL_SIZE
    );

    tracing::trace!(width, height, bytes = data.len(), "encoded classifier tensor");
    TensorBuffer { data, width, height }
}
