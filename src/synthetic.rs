//! Deterministic in-memory collaborators for tests and the dry-run mode.
//!
//! These stand in for the platform capture stack: the camera session hands
//! out whatever frame was last staged, and the audio source forwards
//! staged chunks to the attached sink, exactly like a push-based capture
//! callback would.

use crate::audio::AudioChunk;
use crate::error::CameraError;
use crate::frame::Frame;
use crate::source::{AudioSink, AudioSource, CameraSession, FrameSource};

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Camera session whose permissions, capture health, and current frame
/// are all controlled by the caller.
pub struct SyntheticCameraSession {
    camera_permission: AtomicBool,
    microphone_permission: AtomicBool,
    capture_failure: AtomicBool,
    capturing: AtomicBool,
    frame: Mutex<Option<Frame>>,
}

impl SyntheticCameraSession {
    pub fn new() -> Self {
        Self {
            camera_permission: AtomicBool::new(true),
            microphone_permission: AtomicBool::new(true),
            capture_failure: AtomicBool::new(false),
            capturing: AtomicBool::new(false),
            frame: Mutex::new(None),
        }
    }

    pub fn set_camera_permission(&self, granted: bool) {
        self.camera_permission.store(granted, Ordering::SeqCst);
    }

    pub fn set_microphone_permission(&self, granted: bool) {
        self.microphone_permission.store(granted, Ordering::SeqCst);
    }

    /// Make the next `start_capture` fail as if the device were busy
    pub fn set_capture_failure(&self, failing: bool) {
        self.capture_failure.store(failing, Ordering::SeqCst);
    }

    /// Stage the frame returned by subsequent `current_frame` calls
    pub fn set_frame(&self, frame: Frame) {
        *self.frame.lock() = Some(frame);
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }
}

impl Default for SyntheticCameraSession {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for SyntheticCameraSession {
    fn current_frame(&self) -> Option<Frame> {
        self.frame.lock().clone()
    }
}

#[async_trait::async_trait]
impl CameraSession for SyntheticCameraSession {
    async fn request_camera_permission(&self) -> bool {
        self.camera_permission.load(Ordering::SeqCst)
    }

    async fn request_microphone_permission(&self) -> bool {
        self.microphone_permission.load(Ordering::SeqCst)
    }

    async fn start_capture(&self) -> Result<(), CameraError> {
        if self.capture_failure.load(Ordering::SeqCst) {
            return Err(CameraError::DeviceUnavailable);
        }
        self.capturing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop_capture(&self) {
        self.capturing.store(false, Ordering::SeqCst);
        *self.frame.lock() = None;
    }
}

/// Push-based audio source that forwards staged chunks to the attached sink
pub struct SyntheticAudioSource {
    sink: Mutex<Option<Arc<dyn AudioSink>>>,
}

impl SyntheticAudioSource {
    pub fn new() -> Self {
        Self {
            sink: Mutex::new(None),
        }
    }

    /// Deliver a chunk to the attached sink, if any
    pub fn push(&self, chunk: &AudioChunk) {
        let sink = self.sink.lock().clone();
        if let Some(sink) = sink {
            sink.on_chunk(chunk);
        }
    }

    pub fn attached(&self) -> bool {
        self.sink.lock().is_some()
    }
}

impl Default for SyntheticAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for SyntheticAudioSource {
    fn attach(&self, sink: Arc<dyn AudioSink>) {
        *self.sink.lock() = Some(sink);
    }

    fn detach(&self) {
        *self.sink.lock() = None;
    }
}
