use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Estimated infant body position for a single frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    OnBack,
    OnSide,
    OnStomach,
    Unknown,
}

impl PositionStatus {
    pub fn display_value(&self) -> &'static str {
        match self {
            PositionStatus::OnBack => "On Back",
            PositionStatus::OnSide => "On Side",
            PositionStatus::OnStomach => "On Stomach",
            PositionStatus::Unknown => "Unknown",
        }
    }

    pub fn subtitle(&self) -> &'static str {
        match self {
            PositionStatus::OnBack => "Recommended sleep position",
            PositionStatus::OnSide => "Side position detected",
            PositionStatus::OnStomach => "Check on baby",
            PositionStatus::Unknown => "Unable to detect",
        }
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, PositionStatus::OnBack | PositionStatus::OnSide)
    }
}

/// Movement classification for a single frame against recent history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementStatus {
    Still,
    Moving,
    Unusual,
}

impl MovementStatus {
    pub fn display_value(&self) -> &'static str {
        match self {
            MovementStatus::Still => "Still",
            MovementStatus::Moving => "Moving",
            MovementStatus::Unusual => "Unusual",
        }
    }

    pub fn subtitle(&self) -> &'static str {
        match self {
            MovementStatus::Still => "Looks normal",
            MovementStatus::Moving => "Active movement",
            MovementStatus::Unusual => "Check on baby",
        }
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, MovementStatus::Still | MovementStatus::Moving)
    }
}

/// Per-frame position detection output. Stateless given the current
/// frame's classifier output or pose landmarks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionEstimate {
    pub position: PositionStatus,
    pub confidence: f32,
    pub face_may_be_covered: bool,
}

impl PositionEstimate {
    /// Neutral estimate returned when detection cannot run
    pub fn unknown() -> Self {
        Self {
            position: PositionStatus::Unknown,
            confidence: 0.0,
            face_may_be_covered: false,
        }
    }
}

/// Movement detection output with stillness tracking
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementEstimate {
    pub status: MovementStatus,
    pub magnitude: f32,
    pub stillness_duration: Duration,
}

impl MovementEstimate {
    /// Neutral estimate for the first frame or a stopped detector
    pub fn still() -> Self {
        Self {
            status: MovementStatus::Still,
            magnitude: 0.0,
            stillness_duration: Duration::ZERO,
        }
    }
}

/// Which strategy produced a crying estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CryingSource {
    Classifier,
    Heuristic,
}

/// Crying detection output published from the audio callback path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CryingEstimate {
    pub is_crying: bool,
    pub confidence: f32,
    pub audio_level: f32,
    pub source: CryingSource,
}

impl CryingEstimate {
    /// Neutral estimate before any audio has been classified
    pub fn quiet(source: CryingSource) -> Self {
        Self {
            is_crying: false,
            confidence: 0.0,
            audio_level: 0.0,
            source,
        }
    }
}

/// Safety alert categories. Copy is observational only - no medical claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    RolledOntoStomach,
    FaceMayBeCovered,
    UnusualStillness,
    CryingDetected,
}

impl AlertKind {
    pub fn title(&self) -> &'static str {
        match self {
            AlertKind::RolledOntoStomach => "Baby rolled onto stomach",
            AlertKind::FaceMayBeCovered => "Baby's face may be covered",
            AlertKind::UnusualStillness => "Unusual Stillness Detected",
            AlertKind::CryingDetected => "Crying Detected",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AlertKind::RolledOntoStomach => "Please check your baby",
            AlertKind::FaceMayBeCovered => {
                "Please check the sleep area to make sure your baby's face is clear."
            }
            AlertKind::UnusualStillness => {
                "We haven't seen normal movement for a while. This can happen during \
                 deep sleep. Please take a moment to check your baby."
            }
            AlertKind::CryingDetected => "Your baby sounds upset and may need you.",
        }
    }

    pub fn severity(&self) -> AlertSeverity {
        match self {
            AlertKind::RolledOntoStomach | AlertKind::FaceMayBeCovered => AlertSeverity::High,
            AlertKind::UnusualStillness | AlertKind::CryingDetected => AlertSeverity::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
}

/// A raised safety alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: Uuid,
    pub kind: AlertKind,
    pub raised_at: SystemTime,
}

impl AlertEvent {
    pub fn new(kind: AlertKind, raised_at: SystemTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            raised_at,
        }
    }
}

/// Why monitoring is paused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PausedReason {
    CameraDisconnected,
    BatteryLow,
    NetworkLost,
    LightingDegraded,
    ThermalThrottling,
}

impl PausedReason {
    pub fn description(&self) -> &'static str {
        match self {
            PausedReason::CameraDisconnected => "The camera is not connected right now.",
            PausedReason::BatteryLow => "Camera device battery is low.",
            PausedReason::NetworkLost => "Network connection lost.",
            PausedReason::LightingDegraded => "Lighting is too low for monitoring.",
            PausedReason::ThermalThrottling => "Device needs to cool down.",
        }
    }
}

/// Monitoring lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorState {
    Idle,
    Active,
    Paused(PausedReason),
    PermissionDenied,
    CameraUnavailable,
}

impl MonitorState {
    pub fn is_active(&self) -> bool {
        matches!(self, MonitorState::Active)
    }
}

/// Which backend each detector resolved at start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMethod {
    CustomModel,
    BuiltInHeuristic,
    Disabled,
}

/// Report of the detection backends in use for the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionCapabilities {
    pub position_detection: DetectionMethod,
    pub crying_detection: DetectionMethod,
    pub face_coverage_detection: DetectionMethod,
}

impl DetectionCapabilities {
    pub fn using_custom_models(&self) -> bool {
        self.position_detection == DetectionMethod::CustomModel
            || self.crying_detection == DetectionMethod::CustomModel
            || self.face_coverage_detection == DetectionMethod::CustomModel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_normality() {
        assert!(PositionStatus::OnBack.is_normal());
        assert!(PositionStatus::OnSide.is_normal());
        assert!(!PositionStatus::OnStomach.is_normal());
        assert!(!PositionStatus::Unknown.is_normal());
    }

    #[test]
    fn test_movement_normality() {
        assert!(MovementStatus::Still.is_normal());
        assert!(MovementStatus::Moving.is_normal());
        assert!(!MovementStatus::Unusual.is_normal());
    }

    #[test]
    fn test_alert_severity() {
        assert_eq!(AlertKind::RolledOntoStomach.severity(), AlertSeverity::High);
        assert_eq!(AlertKind::FaceMayBeCovered.severity(), AlertSeverity::High);
        assert_eq!(AlertKind::UnusualStillness.severity(), AlertSeverity::Medium);
        assert_eq!(AlertKind::CryingDetected.severity(), AlertSeverity::Medium);
        assert!(AlertSeverity::High > AlertSeverity::Medium);
    }

    #[test]
    fn test_neutral_estimates() {
        let p = PositionEstimate::unknown();
        assert_eq!(p.position, PositionStatus::Unknown);
        assert_eq!(p.confidence, 0.0);

        let m = MovementEstimate::still();
        assert_eq!(m.status, MovementStatus::Still);
        assert_eq!(m.stillness_duration, Duration::ZERO);

        let c = CryingEstimate::quiet(CryingSource::Heuristic);
        assert!(!c.is_crying);
    }

    #[test]
    fn test_monitor_state() {
        assert!(MonitorState::Active.is_active());
        assert!(!MonitorState::Idle.is_active());
        assert!(!MonitorState::Paused(PausedReason::CameraDisconnected).is_active());
        assert_eq!(
            MonitorState::Paused(PausedReason::NetworkLost),
            MonitorState::Paused(PausedReason::NetworkLost)
        );
    }

    #[test]
    fn test_capabilities_report() {
        let caps = DetectionCapabilities {
            position_detection: DetectionMethod::BuiltInHeuristic,
            crying_detection: DetectionMethod::CustomModel,
            face_coverage_detection: DetectionMethod::BuiltInHeuristic,
        };
        assert!(caps.using_custom_models());

        let caps = DetectionCapabilities {
            position_detection: DetectionMethod::BuiltInHeuristic,
            crying_detection: DetectionMethod::Disabled,
            face_coverage_detection: DetectionMethod::BuiltInHeuristic,
        };
        assert!(!caps.using_custom_models());
    }
}
