pub mod audio;
pub mod classifier;
pub mod config;
pub mod detector;
pub mod error;
pub mod events;
pub mod frame;
pub mod monitor;
pub mod source;
pub mod status;
pub mod synthetic;

pub use audio::AudioChunk;
pub use classifier::{
    Classification, ClassifierProvider, FixedClassifier, ImageClassifier,
    NullClassifierProvider, SoundClassifier, StaticClassifierProvider,
};
pub use config::CribwatchConfig;
pub use detector::{CryingDetector, MovementDetector, PositionDetector};
pub use error::{
    CameraError, ClassifierError, CribwatchError, DetectorError, EventBusError, Result,
};
pub use events::{EventBus, EventFilter, EventReceiver, MonitorEvent};
pub use frame::{Frame, FrameFormat};
pub use monitor::{AlertLogEntry, MonitorMetrics, MonitoringCoordinator};
pub use source::{
    AudioSink, AudioSource, BodyPose, CameraSession, FrameSource, Landmark, NullPoseEstimator,
    PoseEstimator,
};
pub use status::{
    AlertEvent, AlertKind, AlertSeverity, CryingEstimate, CryingSource, DetectionCapabilities,
    DetectionMethod, MonitorState, MovementEstimate, MovementStatus, PausedReason,
    PositionEstimate, PositionStatus,
};
pub use synthetic::{SyntheticAudioSource, SyntheticCameraSession};
