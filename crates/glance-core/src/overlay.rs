//! Thread-safe annotation overlay.
//!
//! Recognition workers add and clear annotations while the render thread
//! draws them. A single mutex covers the annotation set together with the
//! preview size and scale factors, so a render pass sees one consistent
//! snapshot and the transform it draws with.

use crate::annotation::Annotation;
use crate::surface::Surface;
use crate::transform::Transform;
use crate::types::Point;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

type RedrawHook = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct OverlayState {
    preview_width: u32,
    preview_height: u32,
    transform: Transform,
    origin: Point,
    /// Unordered; membership is by `Arc` identity.
    annotations: Vec<Arc<Annotation>>,
}

/// Owns the annotations of the current capture and renders them.
#[derive(Default)]
pub struct Overlay {
    state: Mutex<OverlayState>,
    revision: AtomicU64,
    redraw: Option<RedrawHook>,
}

impl std::fmt::Debug for Overlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Overlay")
            .field("preview_width", &state.preview_width)
            .field("preview_height", &state.preview_height)
            .field("transform", &state.transform)
            .field("annotations", &state.annotations.len())
            .field("revision", &self.revision())
            .finish()
    }
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlay that calls `hook` after every mutation to request a redraw.
    ///
    /// The hook runs outside the lock and must not block.
    pub fn with_redraw_hook(hook: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            redraw: Some(Box::new(hook)),
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, OverlayState> {
        // A panic inside a draw call must not take the overlay down with it.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn invalidate(&self) {
        self.revision.fetch_add(1, Ordering::Release);
        if let Some(hook) = &self.redraw {
            hook();
        }
    }

    /// Record the pixel size of the image the next annotations refer to.
    ///
    /// Zero in either dimension is ignored.
    pub fn set_preview_size(&self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            tracing::warn!(width, height, "ignoring empty preview size");
            return;
        }
        let mut state = self.lock();
        state.preview_width = width;
        state.preview_height = height;
    }

    pub fn preview_size(&self) -> (u32, u32) {
        let state = self.lock();
        (state.preview_width, state.preview_height)
    }

    /// Offset of the displayed photo inside the view, applied once to the
    /// whole overlay by the surface.
    pub fn translate(&self, x: f32, y: f32) {
        self.lock().origin = Point::new(x, y);
        self.invalidate();
    }

    pub fn origin(&self) -> Point {
        self.lock().origin
    }

    /// Scale factors computed by the last render pass.
    pub fn transform(&self) -> Transform {
        self.lock().transform
    }

    pub fn clear(&self) {
        self.lock().annotations.clear();
        self.invalidate();
    }

    /// Insert an annotation. Adding the same handle twice keeps one entry.
    pub fn add(&self, annotation: Arc<Annotation>) {
        {
            let mut state = self.lock();
            if !state.annotations.iter().any(|a| Arc::ptr_eq(a, &annotation)) {
                state.annotations.push(annotation);
            }
        }
        self.invalidate();
    }

    /// Remove an annotation by identity. Absent annotations are ignored.
    pub fn remove(&self, annotation: &Arc<Annotation>) {
        {
            let mut state = self.lock();
            if let Some(pos) = state.annotations.iter().position(|a| Arc::ptr_eq(a, annotation)) {
                state.annotations.swap_remove(pos);
            }
        }
        self.invalidate();
    }

    pub fn len(&self) -> usize {
        self.lock().annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of mutations so far; hosts can poll it instead of installing a hook.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Recompute the transform for a `target_width` × `target_height` render
    /// target and draw every annotation. Returns the number drawn.
    ///
    /// Before a preview size is known the previous transform (identity by
    /// default) is kept.
    pub fn render(&self, target_width: u32, target_height: u32, surface: &mut dyn Surface) -> usize {
        let mut state = self.lock();
        if let Some(t) = Transform::from_sizes(
            target_width,
            target_height,
            state.preview_width,
            state.preview_height,
        ) {
            state.transform = t;
        }

        let transform = state.transform;
        for annotation in &state.annotations {
            annotation.draw(surface, &transform);
        }
        state.annotations.len()
    }

    /// [`render`](Self::render) using the surface's own dimensions.
    pub fn render_surface(&self, surface: &mut dyn Surface) -> usize {
        let (width, height) = surface.dimensions();
        self.render(width, height, surface)
    }
}
