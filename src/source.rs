use crate::audio::AudioChunk;
use crate::error::CameraError;
use crate::frame::Frame;
use std::sync::Arc;

/// Supplies the most recent camera frame for analysis.
///
/// May return None before the first frame has arrived. Frames are
/// immutable once delivered; detectors only read them.
pub trait FrameSource: Send + Sync {
    fn current_frame(&self) -> Option<Frame>;
}

/// Camera capture collaborator: permissions plus capture lifecycle.
///
/// The coordinator drives this contract the way the app drives a real
/// capture session; the crate ships no device plumbing of its own.
#[async_trait::async_trait]
pub trait CameraSession: FrameSource {
    /// Request camera access. Required for monitoring.
    async fn request_camera_permission(&self) -> bool;

    /// Request microphone access. Optional: crying detection is skipped
    /// when denied.
    async fn request_microphone_permission(&self) -> bool;

    /// Start delivering frames
    async fn start_capture(&self) -> Result<(), CameraError>;

    /// Stop delivering frames
    fn stop_capture(&self);
}

/// Consumer of pushed audio chunks. Implemented by the crying detector;
/// called from the audio callback thread, off the coordinator tick.
pub trait AudioSink: Send + Sync {
    fn on_chunk(&self, chunk: &AudioChunk);
}

/// Push-based audio collaborator. Delivers fixed-size chunks to the
/// attached sink; no back-pressure signaling.
pub trait AudioSource: Send + Sync {
    /// Attach the sink that receives subsequent chunks
    fn attach(&self, sink: Arc<dyn AudioSink>);

    /// Detach the current sink, if any
    fn detach(&self);
}

/// A single recognized body landmark in normalized frame coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

/// The landmarks the position heuristic needs from a pose observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyPose {
    pub nose: Landmark,
    pub left_shoulder: Landmark,
    pub right_shoulder: Landmark,
}

/// Body-pose estimation collaborator backing the heuristic position path.
///
/// Returns None when no body is recognized in the frame.
pub trait PoseEstimator: Send + Sync {
    fn estimate(&self, frame: &Frame) -> Option<BodyPose>;
}

/// Pose estimator that never recognizes a body. Detectors degrade to
/// `Unknown` estimates, which is the correct neutral behavior when no
/// pose backend is wired in.
#[derive(Debug, Default)]
pub struct NullPoseEstimator;

impl PoseEstimator for NullPoseEstimator {
    fn estimate(&self, _frame: &Frame) -> Option<BodyPose> {
        None
    }
}
