//! Photo normalization: orientation fix and fit-to-view resize.

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("image file not found: {0}")]
    NotFound(String),
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("target size unknown ({width}x{height}) — measure the view before normalizing")]
    TargetUnknown { width: u32, height: u32 },
}

/// Optional normalization steps.
#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    /// Center-crop so that long side / short side does not exceed this ratio.
    pub max_aspect: Option<f32>,
}

/// Load a captured photo and fit it into a `target_width` × `target_height` box.
pub fn normalize(
    path: impl AsRef<Path>,
    target_width: u32,
    target_height: u32,
) -> Result<RgbaImage, NormalizeError> {
    normalize_with(path, target_width, target_height, &NormalizeOptions::default())
}

pub fn normalize_with(
    path: impl AsRef<Path>,
    target_width: u32,
    target_height: u32,
    options: &NormalizeOptions,
) -> Result<RgbaImage, NormalizeError> {
    let path = path.as_ref();
    let shown = path.display().to_string();
    if !path.exists() {
        return Err(NormalizeError::NotFound(shown));
    }
    check_target(target_width, target_height)?;

    // Header-only read before committing to a full decode.
    let (width, height) = image::image_dimensions(path).map_err(|source| NormalizeError::Decode {
        path: shown.clone(),
        source,
    })?;
    tracing::debug!(path = %shown, width, height, "read image dimensions");

    let decoded = image::open(path).map_err(|source| NormalizeError::Decode {
        path: shown.clone(),
        source,
    })?;

    let out = normalize_image(decoded, target_width, target_height, options)?;
    tracing::info!(
        path = %shown,
        source_width = width,
        source_height = height,
        width = out.width(),
        height = out.height(),
        "normalized photo"
    );
    Ok(out)
}

/// Orient and resize an already-decoded image.
///
/// Landscape images are rotated 90° clockwise; portrait and square images
/// pass through. The result is scaled uniformly so both sides fit the target.
pub fn normalize_image(
    image: DynamicImage,
    target_width: u32,
    target_height: u32,
    options: &NormalizeOptions,
) -> Result<RgbaImage, NormalizeError> {
    check_target(target_width, target_height)?;

    let rgba = image.into_rgba8();
    let rotated = if rgba.width() > rgba.height() {
        imageops::rotate90(&rgba)
    } else {
        rgba
    };

    let cropped = match options.max_aspect {
        Some(max_aspect) => crop_to_aspect(rotated, max_aspect),
        None => rotated,
    };

    let (w, h) = cropped.dimensions();
    let factor = (w as f32 / target_width as f32).max(h as f32 / target_height as f32);
    let new_w = ((w as f32 / factor).round() as u32).clamp(1, target_width);
    let new_h = ((h as f32 / factor).round() as u32).clamp(1, target_height);

    if (new_w, new_h) == (w, h) {
        return Ok(cropped);
    }
    Ok(imageops::resize(&cropped, new_w, new_h, FilterType::Triangle))
}

fn check_target(width: u32, height: u32) -> Result<(), NormalizeError> {
    if width == 0 || height == 0 {
        return Err(NormalizeError::TargetUnknown { width, height });
    }
    Ok(())
}

fn crop_to_aspect(image: RgbaImage, max_aspect: f32) -> RgbaImage {
    let (w, h) = image.dimensions();
    if max_aspect < 1.0 || w == 0 || h == 0 {
        return image;
    }
    let (long, short) = (w.max(h), w.min(h));
    let allowed = (short as f32 * max_aspect).floor() as u32;
    if long <= allowed {
        return image;
    }
    if h >= w {
        let y = (h - allowed) / 2;
        imageops::crop_imm(&image, 0, y, w, allowed).to_image()
    } else {
        let x = (w - allowed) / 2;
        imageops::crop_imm(&image, x, 0, allowed, h).to_image()
    }
}
