//! Preview-space to view-space coordinate mapping.

use crate::types::{Point, Rect};

/// Per-axis scale from preview pixels to view pixels.
///
/// Recomputed by the overlay on every render pass. There is no per-point
/// translation: the overlay origin offset is applied once by the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub width_scale_factor: f32,
    pub height_scale_factor: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        width_scale_factor: 1.0,
        height_scale_factor: 1.0,
    };

    /// Scale factors for a render target of `target_*` pixels showing a
    /// preview of `preview_*` pixels. `None` if any dimension is zero.
    pub fn from_sizes(
        target_width: u32,
        target_height: u32,
        preview_width: u32,
        preview_height: u32,
    ) -> Option<Self> {
        if target_width == 0 || target_height == 0 || preview_width == 0 || preview_height == 0 {
            return None;
        }
        Some(Self {
            width_scale_factor: target_width as f32 / preview_width as f32,
            height_scale_factor: target_height as f32 / preview_height as f32,
        })
    }

    pub fn scale_x(&self, horizontal: f32) -> f32 {
        horizontal * self.width_scale_factor
    }

    pub fn scale_y(&self, vertical: f32) -> f32 {
        vertical * self.height_scale_factor
    }

    /// Same as [`scale_x`](Self::scale_x); kept as the coordinate (rather than length) entry point.
    pub fn translate_x(&self, x: f32) -> f32 {
        self.scale_x(x)
    }

    /// Same as [`scale_y`](Self::scale_y).
    pub fn translate_y(&self, y: f32) -> f32 {
        self.scale_y(y)
    }

    pub fn map_point(&self, p: Point) -> Point {
        Point::new(self.translate_x(p.x), self.translate_y(p.y))
    }

    pub fn map_rect(&self, r: Rect) -> Rect {
        Rect::new(
            self.translate_x(r.left),
            self.translate_y(r.top),
            self.translate_x(r.right),
            self.translate_y(r.bottom),
        )
    }
}
