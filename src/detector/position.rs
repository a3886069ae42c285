use crate::classifier::{ClassifierProvider, ImageClassifier};
use crate::config::PositionConfig;
use crate::frame::Frame;
use crate::source::{BodyPose, PoseEstimator};
use crate::status::{DetectionMethod, PositionEstimate, PositionStatus};

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shoulder x-spread above which the pose reads as lying flat
const BACK_SPREAD_THRESHOLD: f32 = 0.15;
/// Shoulder y-difference below which the shoulders count as level
const BACK_LEVEL_DIFF_THRESHOLD: f32 = 0.1;
/// Shoulder x-spread below which the pose reads as lying on the side
const SIDE_SPREAD_THRESHOLD: f32 = 0.08;

/// Per-frame infant position and face-coverage detection.
///
/// Runs a trained image classifier when one is available, otherwise falls
/// back to body-landmark heuristics from the injected pose estimator. Both
/// paths behave identically from the caller's perspective. Detection never
/// panics past this boundary: processing failures degrade to `Unknown`.
pub struct PositionDetector {
    config: PositionConfig,
    pose_estimator: Arc<dyn PoseEstimator>,
    running: AtomicBool,
    position_model: Mutex<Option<Arc<dyn ImageClassifier>>>,
    coverage_model: Mutex<Option<Arc<dyn ImageClassifier>>>,
    latest: Mutex<Option<PositionEstimate>>,
}

impl PositionDetector {
    pub fn new(config: PositionConfig, pose_estimator: Arc<dyn PoseEstimator>) -> Self {
        Self {
            config,
            pose_estimator,
            running: AtomicBool::new(false),
            position_model: Mutex::new(None),
            coverage_model: Mutex::new(None),
            latest: Mutex::new(None),
        }
    }

    /// Start detection, resolving classifier availability once for the
    /// session rather than per call.
    pub fn start(&self, provider: &dyn ClassifierProvider) {
        let position_model = provider.position_model();
        let coverage_model = provider.face_coverage_model();

        info!(
            "Position detector starting (position: {}, face coverage: {})",
            if position_model.is_some() {
                "custom model"
            } else {
                "landmark heuristic"
            },
            if coverage_model.is_some() {
                "custom model"
            } else {
                "landmark heuristic"
            },
        );

        *self.position_model.lock() = position_model;
        *self.coverage_model.lock() = coverage_model;
        *self.latest.lock() = None;
        self.running.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        *self.position_model.lock() = None;
        *self.coverage_model.lock() = None;
        *self.latest.lock() = None;
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Detect the infant's position in a single frame.
    ///
    /// Returns a neutral estimate when the detector is stopped.
    pub fn detect(&self, frame: &Frame) -> PositionEstimate {
        if !self.is_running() {
            return PositionEstimate::unknown();
        }

        let model = self.position_model.lock().clone();
        let estimate = match model {
            Some(model) => self.detect_with_classifier(&*model, frame),
            None => self.detect_with_landmarks(frame),
        };

        debug!(
            "Position: {:?} (confidence {:.2}, face covered: {})",
            estimate.position, estimate.confidence, estimate.face_may_be_covered
        );

        *self.latest.lock() = Some(estimate);
        estimate
    }

    /// Latest estimate published for the coordinator
    pub fn latest_estimate(&self) -> Option<PositionEstimate> {
        *self.latest.lock()
    }

    /// Which backend the position path resolved at start
    pub fn capability(&self) -> DetectionMethod {
        if !self.is_running() {
            return DetectionMethod::Disabled;
        }
        if self.position_model.lock().is_some() {
            DetectionMethod::CustomModel
        } else {
            DetectionMethod::BuiltInHeuristic
        }
    }

    /// Which backend the face-coverage path resolved at start
    pub fn coverage_capability(&self) -> DetectionMethod {
        if !self.is_running() {
            return DetectionMethod::Disabled;
        }
        if self.coverage_model.lock().is_some() {
            DetectionMethod::CustomModel
        } else {
            DetectionMethod::BuiltInHeuristic
        }
    }

    fn detect_with_classifier(
        &self,
        model: &dyn ImageClassifier,
        frame: &Frame,
    ) -> PositionEstimate {
        let results = match model.classify(frame) {
            Ok(results) => results,
            Err(e) => {
                warn!("Position classification failed: {}", e);
                return PositionEstimate::unknown();
            }
        };

        let (position, confidence) = match results.first() {
            Some(top) => match top.label.as_str() {
                "on_back" => (PositionStatus::OnBack, top.score),
                "on_side" => (PositionStatus::OnSide, top.score),
                "on_stomach" => (PositionStatus::OnStomach, top.score),
                "unknown" => (PositionStatus::Unknown, top.score),
                other => {
                    warn!("Unrecognized position label: {}", other);
                    (PositionStatus::Unknown, 0.0)
                }
            },
            None => (PositionStatus::Unknown, 0.0),
        };

        PositionEstimate {
            position,
            confidence,
            face_may_be_covered: self.detect_face_coverage(frame, None),
        }
    }

    fn detect_with_landmarks(&self, frame: &Frame) -> PositionEstimate {
        let pose = match self.pose_estimator.estimate(frame) {
            Some(pose) => pose,
            None => return PositionEstimate::unknown(),
        };

        let min = self.config.min_landmark_confidence;
        if pose.nose.confidence <= min
            || pose.left_shoulder.confidence <= min
            || pose.right_shoulder.confidence <= min
        {
            return PositionEstimate {
                position: PositionStatus::Unknown,
                confidence: 0.3,
                face_may_be_covered: false,
            };
        }

        let shoulder_spread = (pose.left_shoulder.x - pose.right_shoulder.x).abs();
        let shoulder_level_diff = (pose.left_shoulder.y - pose.right_shoulder.y).abs();

        // Shoulders level and spread wide in x: lying flat on the back.
        // Shoulders close in x: on the side. Nose below the shoulder line
        // in a top-down frame: on the stomach.
        let (position, confidence) =
            if shoulder_spread > BACK_SPREAD_THRESHOLD && shoulder_level_diff < BACK_LEVEL_DIFF_THRESHOLD {
                (PositionStatus::OnBack, 0.85)
            } else if shoulder_spread < SIDE_SPREAD_THRESHOLD {
                (PositionStatus::OnSide, 0.75)
            } else if pose.nose.y > pose.left_shoulder.y.max(pose.right_shoulder.y) {
                (PositionStatus::OnStomach, 0.80)
            } else {
                (PositionStatus::OnBack, 0.60)
            };

        PositionEstimate {
            position,
            confidence,
            face_may_be_covered: self.detect_face_coverage(frame, Some(&pose)),
        }
    }

    /// Face coverage: the dedicated classifier takes precedence; the
    /// landmark path falls back to nose visibility.
    fn detect_face_coverage(&self, frame: &Frame, pose: Option<&BodyPose>) -> bool {
        let model = self.coverage_model.lock().clone();
        if let Some(model) = model {
            match model.classify(frame) {
                Ok(results) => {
                    return results.iter().any(|c| {
                        c.label == "covered"
                            && c.score > self.config.coverage_classifier_confidence
                    });
                }
                Err(e) => {
                    warn!("Face coverage classification failed: {}", e);
                }
            }
        }

        match pose {
            Some(pose) => pose.nose.confidence < self.config.covered_nose_confidence,
            None => false,
        }
    }
}
