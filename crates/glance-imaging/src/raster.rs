//! Rasterize overlay annotations onto an RGBA image.

use ab_glyph::{FontVec, PxScale};
use glance_core::{Paint, Point, Rect, Surface};
use image::imageops;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_text_mut};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("font file not found: {0}")]
    FontNotFound(String),
    #[error("failed to read font: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid font data: {0}")]
    InvalidFont(String),
}

/// Load a TrueType/OpenType font for annotation captions.
pub fn load_font(path: impl AsRef<Path>) -> Result<FontVec, RasterError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RasterError::FontNotFound(path.display().to_string()));
    }
    let bytes = std::fs::read(path)?;
    FontVec::try_from_vec(bytes).map_err(|e| RasterError::InvalidFont(e.to_string()))
}

/// Place `photo` centered on a `view_width` × `view_height` transparent canvas.
///
/// Returns the canvas and the photo's top-left offset, which becomes the
/// overlay origin. The offset is snapped to whole pixels so the pasted photo
/// and the annotations drawn at that origin line up.
pub fn compose(photo: &RgbaImage, view_width: u32, view_height: u32) -> (RgbaImage, Point) {
    let x = ((i64::from(view_width) - i64::from(photo.width())) as f64 / 2.0).floor() as i64;
    let y = ((i64::from(view_height) - i64::from(photo.height())) as f64 / 2.0).floor() as i64;
    let mut canvas = RgbaImage::new(view_width, view_height);
    imageops::overlay(&mut canvas, photo, x, y);
    (canvas, Point::new(x as f32, y as f32))
}

/// [`Surface`] backed by an image buffer.
///
/// Primitives are offset by `origin`. Text needs a font; without one,
/// captions are skipped.
pub struct RasterSurface<'a> {
    image: &'a mut RgbaImage,
    size: (u32, u32),
    origin: Point,
    font: Option<&'a FontVec>,
}

impl<'a> RasterSurface<'a> {
    /// Surface covering the whole image.
    pub fn new(image: &'a mut RgbaImage) -> Self {
        let size = image.dimensions();
        Self {
            image,
            size,
            origin: Point::default(),
            font: None,
        }
    }

    /// Restrict the render target to a `width` × `height` region at `origin`.
    pub fn with_region(mut self, origin: Point, width: u32, height: u32) -> Self {
        self.origin = origin;
        self.size = (width, height);
        self
    }

    pub fn with_font(mut self, font: &'a FontVec) -> Self {
        self.font = Some(font);
        self
    }

    fn offset(&self, p: Point) -> (f32, f32) {
        (p.x + self.origin.x, p.y + self.origin.y)
    }
}

impl Surface for RasterSurface<'_> {
    fn dimensions(&self) -> (u32, u32) {
        self.size
    }

    fn stroke_rect(&mut self, rect: Rect, paint: &Paint) {
        let (left, top) = self.offset(Point::new(rect.left, rect.top));
        let (w, h) = (rect.width().round() as i32, rect.height().round() as i32);
        let color = Rgba(paint.color);

        // Stroke straddles the edge, as on a vector canvas.
        let stroke = paint.stroke_width.round().max(1.0) as i32;
        let inset_start = -(stroke / 2);
        for t in inset_start..inset_start + stroke {
            let (rw, rh) = (w - 2 * t, h - 2 * t);
            if rw < 1 || rh < 1 {
                continue;
            }
            let r = imageproc::rect::Rect::at(left.round() as i32 + t, top.round() as i32 + t)
                .of_size(rw as u32, rh as u32);
            draw_hollow_rect_mut(self.image, r, color);
        }
    }

    fn fill_circle(&mut self, center: Point, radius: f32, paint: &Paint) {
        let (x, y) = self.offset(center);
        draw_filled_circle_mut(
            self.image,
            (x.round() as i32, y.round() as i32),
            radius.round() as i32,
            Rgba(paint.color),
        );
    }

    fn draw_text(&mut self, text: &str, anchor: Point, paint: &Paint) {
        let Some(font) = self.font else {
            tracing::debug!(text, "no font configured; skipping caption");
            return;
        };
        let (x, y) = self.offset(anchor);
        // imageproc places the top of the glyph box at y; the anchor is the baseline.
        let top = y - paint.text_size;
        draw_text_mut(
            self.image,
            Rgba(paint.color),
            x.round() as i32,
            top.round() as i32,
            PxScale::from(paint.text_size),
            font,
            text,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glance_core::{Annotation, Overlay, TextElement};
    use std::sync::Arc;

    const PAINT: Paint = Paint {
        color: Paint::RED,
        stroke_width: 1.0,
        text_size: 10.0,
    };
    const RED: Rgba<u8> = Rgba(Paint::RED);

    #[test]
    fn test_stroke_rect_corners() {
        let mut img = RgbaImage::new(40, 40);
        RasterSurface::new(&mut img).stroke_rect(Rect::new(5.0, 5.0, 11.0, 11.0), &PAINT);
        assert_eq!(*img.get_pixel(5, 5), RED);
        assert_eq!(*img.get_pixel(10, 5), RED);
        assert_eq!(*img.get_pixel(5, 10), RED);
        assert_eq!(*img.get_pixel(10, 10), RED);
        assert_eq!(img.get_pixel(8, 8)[3], 0, "outline only");
    }

    #[test]
    fn test_thick_stroke_straddles_edge() {
        let mut img = RgbaImage::new(40, 40);
        let paint = Paint { stroke_width: 4.0, ..PAINT };
        RasterSurface::new(&mut img).stroke_rect(Rect::new(10.0, 10.0, 30.0, 30.0), &paint);
        assert_eq!(*img.get_pixel(8, 20), RED);
        assert_eq!(*img.get_pixel(11, 20), RED);
        assert_eq!(img.get_pixel(13, 20)[3], 0);
    }

    #[test]
    fn test_origin_offset_applied() {
        let mut img = RgbaImage::new(40, 40);
        RasterSurface::new(&mut img)
            .with_region(Point::new(10.0, 20.0), 20, 20)
            .fill_circle(Point::new(2.0, 2.0), 1.0, &PAINT);
        assert_eq!(*img.get_pixel(12, 22), RED);
        assert_eq!(img.get_pixel(2, 2)[3], 0);
    }

    #[test]
    fn test_text_without_font_is_skipped() {
        let mut img = RgbaImage::new(20, 20);
        RasterSurface::new(&mut img).draw_text("hi", Point::new(2.0, 15.0), &PAINT);
        assert!(img.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_compose_centers_photo() {
        let photo = RgbaImage::from_pixel(10, 20, Rgba([0, 255, 0, 255]));
        let (canvas, origin) = compose(&photo, 30, 40);
        assert_eq!(origin, Point::new(10.0, 10.0));
        assert_eq!(canvas.get_pixel(10, 10)[1], 255);
        assert_eq!(canvas.get_pixel(9, 10)[3], 0);
    }

    #[test]
    fn test_compose_odd_margin_aligns_annotations() {
        let photo = RgbaImage::from_pixel(9, 9, Rgba([0, 255, 0, 255]));
        let (mut canvas, origin) = compose(&photo, 20, 20);
        assert_eq!(origin, Point::new(5.0, 5.0));
        assert_eq!(canvas.get_pixel(5, 5)[1], 255);
        assert_eq!(canvas.get_pixel(4, 5)[3], 0);

        RasterSurface::new(&mut canvas)
            .with_region(origin, 9, 9)
            .fill_circle(Point::new(0.0, 0.0), 0.0, &PAINT);
        assert_eq!(*canvas.get_pixel(5, 5), RED);
        assert_eq!(canvas.get_pixel(6, 6)[1], 255);
    }

    #[test]
    fn test_compose_photo_larger_than_view() {
        let photo = RgbaImage::from_pixel(12, 4, Rgba([0, 255, 0, 255]));
        let (canvas, origin) = compose(&photo, 9, 4);
        assert_eq!(origin, Point::new(-2.0, 0.0));
        assert_eq!(canvas.dimensions(), (9, 4));
        assert_eq!(canvas.get_pixel(0, 0)[1], 255);
    }

    #[test]
    fn test_overlay_renders_into_region() {
        let overlay = Overlay::new();
        overlay.set_preview_size(10, 10);
        overlay.add(Arc::new(Annotation::Text(TextElement {
            text: "x".into(),
            bounds: Rect::new(1.0, 1.0, 5.0, 5.0),
        })));

        let mut img = RgbaImage::new(60, 60);
        let drawn = {
            let mut surface = RasterSurface::new(&mut img).with_region(Point::new(10.0, 10.0), 20, 20);
            overlay.render_surface(&mut surface)
        };
        assert_eq!(drawn, 1);
        assert_eq!(overlay.transform().width_scale_factor, 2.0);
        // Box (2,2)-(10,10) in view space, shifted by the origin.
        assert_eq!(*img.get_pixel(12, 12), RED);
    }
}
