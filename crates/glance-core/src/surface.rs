//! Drawing primitives the annotations render through.

use crate::types::{Point, Rect};

/// Paint configuration for one primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paint {
    /// RGBA color.
    pub color: [u8; 4],
    pub stroke_width: f32,
    pub text_size: f32,
}

impl Paint {
    pub const RED: [u8; 4] = [255, 0, 0, 255];
}

/// A render target: the host display or an offscreen image.
///
/// Coordinates passed in are view-space pixels relative to the overlay origin.
pub trait Surface {
    /// Render target size in pixels (width, height).
    fn dimensions(&self) -> (u32, u32);

    fn stroke_rect(&mut self, rect: Rect, paint: &Paint);

    fn fill_circle(&mut self, center: Point, radius: f32, paint: &Paint);

    /// Draw `text` with its baseline starting at `anchor`.
    fn draw_text(&mut self, text: &str, anchor: Point, paint: &Paint);
}

/// A recorded drawing operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    StrokeRect { rect: Rect, paint: Paint },
    FillCircle { center: Point, radius: f32, paint: Paint },
    Text { text: String, anchor: Point, paint: Paint },
}

/// Surface that records a display list instead of rasterizing.
///
/// Hosts with their own renderer replay the commands; tests inspect them.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Take the recorded commands, leaving the surface empty for the next frame.
    pub fn take(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Strings drawn so far, in draw order.
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Surface for RecordingSurface {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn stroke_rect(&mut self, rect: Rect, paint: &Paint) {
        self.commands.push(DrawCommand::StrokeRect { rect, paint: *paint });
    }

    fn fill_circle(&mut self, center: Point, radius: f32, paint: &Paint) {
        self.commands.push(DrawCommand::FillCircle {
            center,
            radius,
            paint: *paint,
        });
    }

    fn draw_text(&mut self, text: &str, anchor: Point, paint: &Paint) {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            anchor,
            paint: *paint,
        });
    }
}
