use crate::audio::AudioChunk;
use crate::error::ClassifierError;
use crate::frame::Frame;
use std::sync::Arc;

/// Expected labels for the position image classifier
pub const POSITION_LABELS: [&str; 4] = ["on_back", "on_side", "on_stomach", "unknown"];

/// Expected labels for the face-coverage image classifier
pub const FACE_COVERAGE_LABELS: [&str; 3] = ["clear", "partially_covered", "covered"];

/// Expected labels for the crying sound classifier
pub const CRYING_LABELS: [&str; 2] = ["crying", "not_crying"];

/// A single classification result
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub label: String,
    pub score: f32,
}

impl Classification {
    pub fn new<S: Into<String>>(label: S, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// A trained image classifier, e.g. a converted position or face-coverage
/// model. Results are sorted descending by score.
pub trait ImageClassifier: Send + Sync {
    fn classify(&self, frame: &Frame) -> Result<Vec<Classification>, ClassifierError>;
}

/// A trained streaming sound classifier. Invoked incrementally as audio
/// chunks arrive; results are sorted descending by score.
pub trait SoundClassifier: Send + Sync {
    fn classify(&self, chunk: &AudioChunk) -> Result<Vec<Classification>, ClassifierError>;
}

/// Supplies optional trained models to the detectors.
///
/// Each model is independently optional; absence is a normal, expected
/// condition and each detector falls back to its built-in heuristic.
/// Injected into detector constructors - there is no global model registry.
pub trait ClassifierProvider: Send + Sync {
    fn position_model(&self) -> Option<Arc<dyn ImageClassifier>>;
    fn crying_model(&self) -> Option<Arc<dyn SoundClassifier>>;
    fn face_coverage_model(&self) -> Option<Arc<dyn ImageClassifier>>;
}

/// Provider with no models: every detector runs its heuristic path.
#[derive(Debug, Default)]
pub struct NullClassifierProvider;

impl ClassifierProvider for NullClassifierProvider {
    fn position_model(&self) -> Option<Arc<dyn ImageClassifier>> {
        None
    }

    fn crying_model(&self) -> Option<Arc<dyn SoundClassifier>> {
        None
    }

    fn face_coverage_model(&self) -> Option<Arc<dyn ImageClassifier>> {
        None
    }
}

/// Classifier that returns a fixed, pre-sorted result regardless of input.
/// Used by tests and the dry-run harness to exercise the classifier path.
#[derive(Debug, Clone)]
pub struct FixedClassifier {
    results: Vec<Classification>,
}

impl FixedClassifier {
    pub fn new(mut results: Vec<Classification>) -> Self {
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        Self { results }
    }
}

impl ImageClassifier for FixedClassifier {
    fn classify(&self, _frame: &Frame) -> Result<Vec<Classification>, ClassifierError> {
        Ok(self.results.clone())
    }
}

impl SoundClassifier for FixedClassifier {
    fn classify(&self, _chunk: &AudioChunk) -> Result<Vec<Classification>, ClassifierError> {
        Ok(self.results.clone())
    }
}

/// Provider assembled from explicit model handles
#[derive(Default)]
pub struct StaticClassifierProvider {
    pub position: Option<Arc<dyn ImageClassifier>>,
    pub crying: Option<Arc<dyn SoundClassifier>>,
    pub face_coverage: Option<Arc<dyn ImageClassifier>>,
}

impl ClassifierProvider for StaticClassifierProvider {
    fn position_model(&self) -> Option<Arc<dyn ImageClassifier>> {
        self.position.clone()
    }

    fn crying_model(&self) -> Option<Arc<dyn SoundClassifier>> {
        self.crying.clone()
    }

    fn face_coverage_model(&self) -> Option<Arc<dyn ImageClassifier>> {
        self.face_coverage.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameFormat;
    use std::time::SystemTime;

    #[test]
    fn test_null_provider_has_no_models() {
        let provider = NullClassifierProvider;
        assert!(provider.position_model().is_none());
        assert!(provider.crying_model().is_none());
        assert!(provider.face_coverage_model().is_none());
    }

    #[test]
    fn test_fixed_classifier_sorts_descending() {
        let classifier = FixedClassifier::new(vec![
            Classification::new("on_side", 0.2),
            Classification::new("on_back", 0.7),
            Classification::new("on_stomach", 0.1),
        ]);

        let frame = Frame::new(
            1,
            SystemTime::now(),
            vec![0u8; 4],
            2,
            2,
            FrameFormat::Gray8,
        );
        let results = ImageClassifier::classify(&classifier, &frame).unwrap();
        assert_eq!(results[0].label, "on_back");
        assert_eq!(results[1].label, "on_side");
        assert_eq!(results[2].label, "on_stomach");
    }

    #[test]
    fn test_static_provider_hands_out_models() {
        let classifier = Arc::new(FixedClassifier::new(vec![Classification::new(
            "on_back", 0.9,
        )]));
        let provider = StaticClassifierProvider {
            position: Some(classifier),
            crying: None,
            face_coverage: None,
        };

        assert!(provider.position_model().is_some());
        assert!(provider.crying_model().is_none());
    }
}
