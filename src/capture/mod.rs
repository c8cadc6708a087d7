//! Capture session boundary.
//!
//! Camera acquisition lives outside this crate. Whatever drives the camera
//! pushes frames into a [`CaptureSession`] and flips its active flag; the
//! pipeline only ever reads the latest frame.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::debug;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A single still frame with its encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Arc<[u8]>,
    content_type: String,
}

impl Frame {
    /// Wrap encoded image bytes, sniffing the MIME type from the content.
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        let content_type = infer::get(&bytes)
            .map(|kind| kind.mime_type().to_string())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        Self {
            bytes,
            content_type,
        }
    }

    /// Wrap encoded image bytes with a caller-declared MIME type.
    pub fn with_content_type(bytes: impl Into<Arc<[u8]>>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Source of live frames for the pipeline.
pub trait CaptureSession: Send + Sync {
    /// Whether the camera stream is currently running.
    fn is_active(&self) -> bool;

    /// The most recent frame, if one is available.
    fn current_frame(&self) -> Option<Frame>;
}

/// In-memory capture session fed by an external producer.
///
/// Stopping the session drops the last frame, mirroring a camera stream whose
/// tracks have been stopped.
#[derive(Default)]
pub struct SharedCaptureSession {
    active: AtomicBool,
    frame: RwLock<Option<Frame>>,
}

impl SharedCaptureSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Active session already holding a frame, handy for one-shot runs.
    pub fn with_frame(frame: Frame) -> Self {
        let session = Self::new();
        session.start();
        session.push_frame(frame);
        session
    }

    pub fn start(&self) {
        self.active.store(true, Ordering::SeqCst);
        debug!("Capture session started");
    }

    pub fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
        if let Ok(mut frame) = self.frame.write() {
            *frame = None;
        }
        debug!("Capture session stopped");
    }

    /// Replace the live frame. Empty frames and frames pushed while the
    /// session is inactive are dropped; returns whether the frame was kept.
    pub fn push_frame(&self, frame: Frame) -> bool {
        if frame.is_empty() || !self.is_active() {
            return false;
        }
        match self.frame.write() {
            Ok(mut current) => {
                *current = Some(frame);
                true
            }
            Err(_) => false,
        }
    }
}

impl CaptureSession for SharedCaptureSession {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn current_frame(&self) -> Option<Frame> {
        self.frame.read().ok().and_then(|frame| frame.clone())
    }
}
