//! Capture-scoped recognition pipeline.
//!
//! Every detector owns a dedicated OS thread. A capture submits the same
//! normalized image to all of them; each completes independently and, on
//! success, replaces the overlay contents with its own annotations. Results
//! for a capture that has since been superseded are discarded.

use crate::classifier::ClassifierError;
use crate::replay::ReplayError;
use glance_core::{Overlay, Recognition};
use image::RgbaImage;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Pending requests per detector before `submit` waits.
const REQUEST_QUEUE_DEPTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectorKind {
    Text,
    Face,
    Label,
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Face => "face",
            Self::Label => "label",
        })
    }
}

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("recognition engine failed: {0}")]
    Engine(String),
    #[error("classifier: {0}")]
    Classifier(#[from] ClassifierError),
    #[error("replay: {0}")]
    Replay(#[from] ReplayError),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("a {0} detector is already registered")]
    DuplicateDetector(DetectorKind),
    #[error("failed to spawn detector thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("capture {0} has been superseded")]
    StaleCapture(CaptureId),
    #[error("{0} detector did not finish within {1:?}")]
    Timeout(DetectorKind, Duration),
    #[error("detector thread exited")]
    ChannelClosed,
}

/// A recognition engine. Called on the detector's worker thread.
pub trait Recognizer: Send + 'static {
    fn kind(&self) -> DetectorKind;

    fn recognize(&mut self, image: &RgbaImage) -> Result<Recognition, DetectionError>;
}

/// Generation number of a capture. Later captures have larger ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CaptureId(u64);

impl fmt::Display for CaptureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-detector state for one capture.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionState {
    Idle,
    Submitted,
    /// Completed; `annotations` is zero when nothing was found.
    Succeeded { annotations: usize },
    Failed(String),
    /// Completed after a newer capture began; the result was dropped.
    Discarded,
}

impl DetectionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Idle | Self::Submitted)
    }
}

/// User-facing message raised by a detector completion.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    NotFound(DetectorKind),
    DetectionFailed { kind: DetectorKind, reason: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(DetectorKind::Text) => f.write_str("Text not found"),
            Self::NotFound(DetectorKind::Face) => f.write_str("Face not found"),
            Self::NotFound(DetectorKind::Label) => f.write_str("Not found"),
            Self::DetectionFailed { kind, reason } => {
                write!(f, "Error running {kind} detection: {reason}")
            }
        }
    }
}

struct Request {
    capture: CaptureId,
    image: Arc<RgbaImage>,
    reply: oneshot::Sender<DetectionState>,
}

struct DetectorStatus {
    capture: CaptureId,
    state: DetectionState,
}

struct DetectorHandle {
    kind: DetectorKind,
    tx: mpsc::Sender<Request>,
    status: Arc<Mutex<DetectorStatus>>,
}

/// Shared between the pipeline and its worker threads.
struct Shared {
    overlay: Arc<Overlay>,
    /// Current capture generation. Held while committing results so a
    /// capture cannot begin between the staleness check and the overlay update.
    generation: Mutex<u64>,
    notices: mpsc::UnboundedSender<Notice>,
}

impl Shared {
    fn generation(&self) -> MutexGuard<'_, u64> {
        self.generation.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn notify(&self, notice: Notice) {
        tracing::info!(%notice, "notice");
        // Nobody listening is fine; notices are advisory.
        let _ = self.notices.send(notice);
    }
}

fn lock_status(status: &Mutex<DetectorStatus>) -> MutexGuard<'_, DetectorStatus> {
    status.lock().unwrap_or_else(|e| e.into_inner())
}

/// Pending result of one detector for one capture.
pub struct Submission {
    pub kind: DetectorKind,
    pub capture: CaptureId,
    reply: oneshot::Receiver<DetectionState>,
}

impl Submission {
    /// Wait for the detector to finish.
    pub async fn wait(self) -> Result<DetectionState, PipelineError> {
        self.reply.await.map_err(|_| PipelineError::ChannelClosed)
    }

    /// [`wait`](Self::wait), giving up after `timeout`. The detector keeps
    /// running; its late result is still applied or discarded as usual.
    pub async fn wait_timeout(self, timeout: Duration) -> Result<DetectionState, PipelineError> {
        let kind = self.kind;
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| PipelineError::Timeout(kind, timeout))?
    }
}

/// Drives registered detectors against captures and feeds the overlay.
pub struct Pipeline {
    shared: Arc<Shared>,
    detectors: Vec<DetectorHandle>,
}

impl Pipeline {
    /// Create a pipeline writing into `overlay`. Notices arrive on the returned receiver.
    pub fn new(overlay: Arc<Overlay>) -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (notices, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            overlay,
            generation: Mutex::new(0),
            notices,
        });
        (
            Self {
                shared,
                detectors: Vec::new(),
            },
            rx,
        )
    }

    pub fn overlay(&self) -> &Arc<Overlay> {
        &self.shared.overlay
    }

    pub fn detectors(&self) -> Vec<DetectorKind> {
        self.detectors.iter().map(|d| d.kind).collect()
    }

    /// Spawn a worker thread for `recognizer`. One detector per kind.
    pub fn register<R: Recognizer>(&mut self, recognizer: R) -> Result<(), PipelineError> {
        let kind = recognizer.kind();
        if self.detectors.iter().any(|d| d.kind == kind) {
            return Err(PipelineError::DuplicateDetector(kind));
        }

        let (tx, rx) = mpsc::channel::<Request>(REQUEST_QUEUE_DEPTH);
        let status = Arc::new(Mutex::new(DetectorStatus {
            capture: CaptureId(*self.shared.generation()),
            state: DetectionState::Idle,
        }));

        let shared = self.shared.clone();
        let worker_status = status.clone();
        std::thread::Builder::new()
            .name(format!("glance-{kind}"))
            .spawn(move || run_detector(recognizer, rx, shared, worker_status))?;

        tracing::info!(%kind, "detector registered");
        self.detectors.push(DetectorHandle { kind, tx, status });
        Ok(())
    }

    /// Start a new capture: clear the overlay, record the preview size, and
    /// supersede every in-flight request.
    pub fn begin_capture(&self, preview_width: u32, preview_height: u32) -> CaptureId {
        let mut generation = self.shared.generation();
        *generation += 1;
        let capture = CaptureId(*generation);

        self.shared.overlay.clear();
        self.shared.overlay.set_preview_size(preview_width, preview_height);
        for detector in &self.detectors {
            let mut status = lock_status(&detector.status);
            status.capture = capture;
            status.state = DetectionState::Idle;
        }

        tracing::info!(%capture, preview_width, preview_height, "capture started");
        capture
    }

    pub fn current_capture(&self) -> CaptureId {
        CaptureId(*self.shared.generation())
    }

    /// State of the `kind` detector for the current capture.
    pub fn state(&self, kind: DetectorKind) -> Option<DetectionState> {
        self.detectors
            .iter()
            .find(|d| d.kind == kind)
            .map(|d| lock_status(&d.status).state.clone())
    }

    /// Submit `image` to every registered detector.
    pub async fn submit(
        &self,
        capture: CaptureId,
        image: Arc<RgbaImage>,
    ) -> Result<Vec<Submission>, PipelineError> {
        let mut submissions = Vec::with_capacity(self.detectors.len());
        for detector in &self.detectors {
            submissions.push(self.submit_to(detector, capture, image.clone()).await?);
        }
        Ok(submissions)
    }

    /// Submit `image` to the `kind` detector only.
    pub async fn submit_one(
        &self,
        kind: DetectorKind,
        capture: CaptureId,
        image: Arc<RgbaImage>,
    ) -> Result<Option<Submission>, PipelineError> {
        match self.detectors.iter().find(|d| d.kind == kind) {
            Some(detector) => Ok(Some(self.submit_to(detector, capture, image).await?)),
            None => Ok(None),
        }
    }

    async fn submit_to(
        &self,
        detector: &DetectorHandle,
        capture: CaptureId,
        image: Arc<RgbaImage>,
    ) -> Result<Submission, PipelineError> {
        if capture != self.current_capture() {
            return Err(PipelineError::StaleCapture(capture));
        }

        // Marked before sending: the worker may finish before `send` returns.
        let previous = {
            let mut status = lock_status(&detector.status);
            (status.capture == capture)
                .then(|| std::mem::replace(&mut status.state, DetectionState::Submitted))
        };

        let (reply, reply_rx) = oneshot::channel();
        let request = Request {
            capture,
            image,
            reply,
        };
        if detector.tx.send(request).await.is_err() {
            let mut status = lock_status(&detector.status);
            if let Some(previous) = previous {
                if status.capture == capture && status.state == DetectionState::Submitted {
                    status.state = previous;
                }
            }
            tracing::warn!(kind = %detector.kind, %capture, "detector channel closed");
            return Err(PipelineError::ChannelClosed);
        }

        tracing::debug!(kind = %detector.kind, %capture, "submitted");
        Ok(Submission {
            kind: detector.kind,
            capture,
            reply: reply_rx,
        })
    }
}

fn run_detector<R: Recognizer>(
    mut recognizer: R,
    mut rx: mpsc::Receiver<Request>,
    shared: Arc<Shared>,
    status: Arc<Mutex<DetectorStatus>>,
) {
    let kind = recognizer.kind();
    tracing::info!(%kind, "detector thread started");
    while let Some(req) = rx.blocking_recv() {
        let result = panic::catch_unwind(AssertUnwindSafe(|| recognizer.recognize(&req.image)))
            .unwrap_or_else(|payload| {
                let reason = panic_message(payload.as_ref());
                tracing::error!(%kind, capture = %req.capture, %reason, "recognizer panicked");
                Err(DetectionError::Engine(format!("recognizer panicked: {reason}")))
            });
        let state = complete(&shared, kind, req.capture, result);

        {
            let mut status = lock_status(&status);
            if status.capture == req.capture {
                status.state = state.clone();
            }
        }
        // The submitter may have stopped waiting.
        let _ = req.reply.send(state);
    }
    tracing::info!(%kind, "detector thread exiting");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

/// Apply one detector result to the overlay.
fn complete(
    shared: &Shared,
    kind: DetectorKind,
    capture: CaptureId,
    result: Result<Recognition, DetectionError>,
) -> DetectionState {
    let generation = shared.generation();
    if *generation != capture.0 {
        tracing::warn!(%kind, %capture, current = *generation, "discarding stale result");
        return DetectionState::Discarded;
    }

    match result {
        Ok(recognition) if recognition.is_empty() => {
            tracing::debug!(%kind, %capture, "nothing recognized");
            shared.notify(Notice::NotFound(kind));
            DetectionState::Succeeded { annotations: 0 }
        }
        Ok(recognition) => {
            let annotations = recognition.into_annotations();
            let count = annotations.len();
            shared.overlay.clear();
            for annotation in annotations {
                shared.overlay.add(Arc::new(annotation));
            }
            tracing::debug!(%kind, %capture, annotations = count, "recognition applied");
            DetectionState::Succeeded { annotations: count }
        }
        Err(err) => {
            tracing::warn!(%kind, %capture, error = %err, "detection failed");
            shared.notify(Notice::DetectionFailed {
                kind,
                reason: err.to_string(),
            });
            DetectionState::Failed(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glance_core::{LabelScore, Rect, RecordingSurface, TextElement};
    use std::sync::mpsc as std_mpsc;

    /// Returns a fixed result for every request.
    struct Fixed {
        kind: DetectorKind,
        result: fn() -> Result<Recognition, DetectionError>,
    }

    impl Recognizer for Fixed {
        fn kind(&self) -> DetectorKind {
            self.kind
        }

        fn recognize(&mut self, _image: &RgbaImage) -> Result<Recognition, DetectionError> {
            (self.result)()
        }
    }

    /// Blocks until released, to hold a request in flight.
    struct Gated {
        gate: std_mpsc::Receiver<()>,
    }

    impl Recognizer for Gated {
        fn kind(&self) -> DetectorKind {
            DetectorKind::Text
        }

        fn recognize(&mut self, _image: &RgbaImage) -> Result<Recognition, DetectionError> {
            let _ = self.gate.recv();
            Ok(hello())
        }
    }

    /// Panics on its first request, then recognizes normally.
    struct PanicsOnce {
        panicked: bool,
    }

    impl Recognizer for PanicsOnce {
        fn kind(&self) -> DetectorKind {
            DetectorKind::Text
        }

        fn recognize(&mut self, _image: &RgbaImage) -> Result<Recognition, DetectionError> {
            if !self.panicked {
                self.panicked = true;
                panic!("engine crashed");
            }
            Ok(hello())
        }
    }

    fn hello() -> Recognition {
        Recognition::Text(vec![TextElement {
            text: "HELLO".into(),
            bounds: Rect::new(10.0, 10.0, 100.0, 40.0),
        }])
    }

    fn image() -> Arc<RgbaImage> {
        Arc::new(RgbaImage::new(100, 100))
    }

    #[tokio::test]
    async fn test_success_populates_overlay() {
        let overlay = Arc::new(Overlay::new());
        let (mut pipeline, _notices) = Pipeline::new(overlay.clone());
        pipeline
            .register(Fixed { kind: DetectorKind::Text, result: || Ok(hello()) })
            .unwrap();

        let capture = pipeline.begin_capture(100, 100);
        assert_eq!(pipeline.state(DetectorKind::Text), Some(DetectionState::Idle));

        let subs = pipeline.submit(capture, image()).await.unwrap();
        let state = subs.into_iter().next().unwrap().wait().await.unwrap();
        assert_eq!(state, DetectionState::Succeeded { annotations: 1 });
        assert_eq!(pipeline.state(DetectorKind::Text), Some(state));

        let mut surface = RecordingSurface::new(200, 150);
        assert_eq!(overlay.render_surface(&mut surface), 1);
        assert_eq!(surface.texts(), vec!["HELLO"]);
    }

    #[tokio::test]
    async fn test_empty_result_raises_not_found() {
        let overlay = Arc::new(Overlay::new());
        let (mut pipeline, mut notices) = Pipeline::new(overlay.clone());
        pipeline
            .register(Fixed { kind: DetectorKind::Face, result: || Ok(Recognition::Faces(vec![])) })
            .unwrap();

        let capture = pipeline.begin_capture(10, 10);
        let sub = pipeline
            .submit_one(DetectorKind::Face, capture, image())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sub.wait().await.unwrap(), DetectionState::Succeeded { annotations: 0 });
        assert_eq!(notices.recv().await, Some(Notice::NotFound(DetectorKind::Face)));
        assert!(overlay.is_empty());
    }

    #[tokio::test]
    async fn test_failure_leaves_overlay_and_notifies() {
        let overlay = Arc::new(Overlay::new());
        let (mut pipeline, mut notices) = Pipeline::new(overlay.clone());
        pipeline
            .register(Fixed {
                kind: DetectorKind::Label,
                result: || Err(DetectionError::Engine("model offline".into())),
            })
            .unwrap();

        let capture = pipeline.begin_capture(10, 10);
        let subs = pipeline.submit(capture, image()).await.unwrap();
        let state = subs.into_iter().next().unwrap().wait().await.unwrap();
        assert!(matches!(state, DetectionState::Failed(ref r) if r.contains("model offline")));

        let notice = notices.recv().await.unwrap();
        assert!(matches!(notice, Notice::DetectionFailed { kind: DetectorKind::Label, .. }));
        assert!(overlay.is_empty());
    }

    #[tokio::test]
    async fn test_stale_result_is_discarded() {
        let overlay = Arc::new(Overlay::new());
        let (mut pipeline, _notices) = Pipeline::new(overlay.clone());
        let (release, gate) = std_mpsc::channel();
        pipeline.register(Gated { gate }).unwrap();

        let first = pipeline.begin_capture(100, 100);
        let sub = pipeline.submit(first, image()).await.unwrap().pop().unwrap();

        let second = pipeline.begin_capture(50, 50);
        assert!(second > first);
        release.send(()).unwrap();

        assert_eq!(sub.wait().await.unwrap(), DetectionState::Discarded);
        assert!(overlay.is_empty(), "stale annotations must not reach the new capture");
        assert_eq!(pipeline.state(DetectorKind::Text), Some(DetectionState::Idle));
    }

    #[tokio::test]
    async fn test_submit_for_superseded_capture_rejected() {
        let (mut pipeline, _notices) = Pipeline::new(Arc::new(Overlay::new()));
        pipeline
            .register(Fixed { kind: DetectorKind::Text, result: || Ok(hello()) })
            .unwrap();
        let old = pipeline.begin_capture(10, 10);
        pipeline.begin_capture(10, 10);
        assert!(matches!(
            pipeline.submit(old, image()).await,
            Err(PipelineError::StaleCapture(c)) if c == old
        ));
    }

    #[tokio::test]
    async fn test_each_success_replaces_overlay() {
        let overlay = Arc::new(Overlay::new());
        let (mut pipeline, _notices) = Pipeline::new(overlay.clone());
        pipeline
            .register(Fixed { kind: DetectorKind::Text, result: || Ok(hello()) })
            .unwrap();
        pipeline
            .register(Fixed {
                kind: DetectorKind::Label,
                result: || {
                    Ok(Recognition::Labels(vec![LabelScore { label: "cat".into(), confidence: 0.9 }]))
                },
            })
            .unwrap();

        let capture = pipeline.begin_capture(100, 100);
        for sub in pipeline.submit(capture, image()).await.unwrap() {
            assert!(sub.wait().await.unwrap().is_terminal());
        }
        // Whichever detector finished last owns the overlay.
        assert_eq!(overlay.len(), 1);
    }

    #[tokio::test]
    async fn test_panicking_recognizer_fails_and_detector_survives() {
        let overlay = Arc::new(Overlay::new());
        let (mut pipeline, mut notices) = Pipeline::new(overlay.clone());
        pipeline.register(PanicsOnce { panicked: false }).unwrap();

        let first = pipeline.begin_capture(100, 100);
        let sub = pipeline.submit(first, image()).await.unwrap().pop().unwrap();
        let state = sub.wait().await.unwrap();
        assert!(matches!(state, DetectionState::Failed(ref r) if r.contains("engine crashed")));
        assert_eq!(pipeline.state(DetectorKind::Text), Some(state));
        assert!(matches!(
            notices.recv().await,
            Some(Notice::DetectionFailed { kind: DetectorKind::Text, .. })
        ));
        assert!(overlay.is_empty());

        let second = pipeline.begin_capture(100, 100);
        let sub = pipeline.submit(second, image()).await.unwrap().pop().unwrap();
        assert_eq!(sub.wait().await.unwrap(), DetectionState::Succeeded { annotations: 1 });
        assert_eq!(overlay.len(), 1);
    }

    #[tokio::test]
    async fn test_wait_timeout_reports_timeout() {
        let overlay = Arc::new(Overlay::new());
        let (mut pipeline, _notices) = Pipeline::new(overlay.clone());
        let (release, gate) = std_mpsc::channel();
        pipeline.register(Gated { gate }).unwrap();

        let capture = pipeline.begin_capture(100, 100);
        let sub = pipeline.submit(capture, image()).await.unwrap().pop().unwrap();
        let limit = Duration::from_millis(50);
        assert!(matches!(
            sub.wait_timeout(limit).await,
            Err(PipelineError::Timeout(DetectorKind::Text, d)) if d == limit
        ));
        assert_eq!(pipeline.state(DetectorKind::Text), Some(DetectionState::Submitted));
        release.send(()).unwrap();
    }

    #[tokio::test]
    async fn test_closed_detector_channel_restores_state() {
        let (mut pipeline, _notices) = Pipeline::new(Arc::new(Overlay::new()));
        let capture = pipeline.begin_capture(10, 10);
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        drop(rx);
        pipeline.detectors.push(DetectorHandle {
            kind: DetectorKind::Face,
            tx,
            status: Arc::new(Mutex::new(DetectorStatus {
                capture,
                state: DetectionState::Idle,
            })),
        });

        assert!(matches!(
            pipeline.submit(capture, image()).await,
            Err(PipelineError::ChannelClosed)
        ));
        assert_eq!(pipeline.state(DetectorKind::Face), Some(DetectionState::Idle));
    }

    #[test]
    fn test_poisoned_status_lock_recovers() {
        let (mut pipeline, _notices) = Pipeline::new(Arc::new(Overlay::new()));
        pipeline
            .register(Fixed { kind: DetectorKind::Text, result: || Ok(hello()) })
            .unwrap();
        let status = pipeline.detectors[0].status.clone();
        let _ = std::thread::spawn(move || {
            let _guard = status.lock().unwrap();
            panic!("poison the status lock");
        })
        .join();

        let capture = pipeline.begin_capture(10, 10);
        assert_eq!(capture, CaptureId(1));
        assert_eq!(pipeline.state(DetectorKind::Text), Some(DetectionState::Idle));
    }

    #[test]
    fn test_duplicate_detector_rejected() {
        let (mut pipeline, _notices) = Pipeline::new(Arc::new(Overlay::new()));
        let fixed = || Fixed { kind: DetectorKind::Text, result: || Ok(hello()) };
        pipeline.register(fixed()).unwrap();
        assert!(matches!(
            pipeline.register(fixed()),
            Err(PipelineError::DuplicateDetector(DetectorKind::Text))
        ));
    }

    #[test]
    fn test_notice_messages() {
        assert_eq!(Notice::NotFound(DetectorKind::Text).to_string(), "Text not found");
        assert_eq!(Notice::NotFound(DetectorKind::Label).to_string(), "Not found");
    }
}
