use thiserror::Error;

#[derive(Error, Debug)]
pub enum CribwatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Detector error: {0}")]
    Detector(#[from] DetectorError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl CribwatchError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Camera collaborator failures. Permission and availability problems are
/// surfaced to the UI as monitor states; setup details stay in the logs.
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("Camera device unavailable")]
    DeviceUnavailable,

    #[error("Camera setup failed: {details}")]
    Setup { details: String },
}

/// Optional-model failures. Never surfaced to the user: load failures fall
/// back to the heuristic path, inference failures skip that sample.
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Classifier failed to load: {details}")]
    LoadFailure { details: String },

    #[error("Classifier inference failed: {details}")]
    Inference { details: String },
}

/// Transient per-sample detector failures. Recovered locally by skipping
/// that tick's contribution for the affected detector only.
#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Frame processing failed: {details}")]
    FrameProcessing { details: String },

    #[error("Audio processing failed: {details}")]
    AudioProcessing { details: String },
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, CribwatchError>;
