use crate::audio::AudioChunk;
use crate::classifier::{ClassifierProvider, SoundClassifier};
use crate::config::CryingConfig;
use crate::source::AudioSink;
use crate::status::{CryingEstimate, CryingSource, DetectionMethod};

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Detection strategy, fixed once at start
enum Strategy {
    Classifier(Arc<dyn SoundClassifier>),
    Heuristic,
}

struct CryingState {
    levels: VecDeque<f32>,
    high_since: Option<SystemTime>,
    low_since: Option<SystemTime>,
}

impl CryingState {
    fn new() -> Self {
        Self {
            levels: VecDeque::new(),
            high_since: None,
            low_since: None,
        }
    }
}

/// Continuous crying detection over pushed audio chunks.
///
/// State updates happen on the audio callback thread; the coordinator only
/// reads the latest published estimate, a single-producer/single-consumer
/// handoff guarded by a mutex. The strategy (trained sound classifier vs.
/// level-variance heuristic) is resolved once at `start()`; a classifier
/// failure falls back to the heuristic rather than leaving the detector
/// non-functional.
pub struct CryingDetector {
    config: CryingConfig,
    running: AtomicBool,
    strategy: Mutex<Strategy>,
    state: Mutex<CryingState>,
    latest: Mutex<Option<CryingEstimate>>,
}

impl CryingDetector {
    pub fn new(config: CryingConfig) -> Self {
        Self {
            config,
            running: AtomicBool::new(false),
            strategy: Mutex::new(Strategy::Heuristic),
            state: Mutex::new(CryingState::new()),
            latest: Mutex::new(None),
        }
    }

    /// Start detection, choosing the strategy once based on classifier
    /// availability.
    pub fn start(&self, provider: &dyn ClassifierProvider) {
        let strategy = match provider.crying_model() {
            Some(model) => {
                info!("Crying detector starting with custom sound classifier");
                Strategy::Classifier(model)
            }
            None => {
                info!("Crying detector starting with audio-level heuristic");
                Strategy::Heuristic
            }
        };

        *self.strategy.lock() = strategy;
        *self.state.lock() = CryingState::new();
        *self.latest.lock() = None;
        self.running.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        *self.strategy.lock() = Strategy::Heuristic;
        *self.state.lock() = CryingState::new();
        *self.latest.lock() = None;
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Latest estimate published for the coordinator
    pub fn latest_estimate(&self) -> Option<CryingEstimate> {
        *self.latest.lock()
    }

    /// Which backend the detector resolved at start
    pub fn capability(&self) -> DetectionMethod {
        if !self.is_running() {
            return DetectionMethod::Disabled;
        }
        match *self.strategy.lock() {
            Strategy::Classifier(_) => DetectionMethod::CustomModel,
            Strategy::Heuristic => DetectionMethod::BuiltInHeuristic,
        }
    }

    /// Process one audio chunk. Called from the audio callback thread.
    pub fn process_chunk(&self, chunk: &AudioChunk) {
        if !self.is_running() {
            return;
        }

        let level = chunk.level();

        let classifier = match &*self.strategy.lock() {
            Strategy::Classifier(model) => Some(Arc::clone(model)),
            Strategy::Heuristic => None,
        };

        if let Some(model) = classifier {
            match model.classify(chunk) {
                Ok(results) => {
                    self.publish_classifier_estimate(&results, level);
                    return;
                }
                Err(e) => {
                    // A broken classifier must not leave the detector
                    // non-functional; continue on the heuristic path.
                    warn!("Sound classification failed, falling back to heuristic: {}", e);
                    *self.strategy.lock() = Strategy::Heuristic;
                }
            }
        }

        self.process_heuristic(level, chunk.timestamp);
    }

    fn publish_classifier_estimate(
        &self,
        results: &[crate::classifier::Classification],
        level: f32,
    ) {
        let is_crying = results
            .first()
            .map(|top| {
                top.label.contains("cry") && top.score > self.config.classifier_confidence
            })
            .unwrap_or(false);

        let confidence = if is_crying {
            0.85
        } else if level < self.config.quiet_floor {
            0.9
        } else {
            0.3
        };

        let estimate = CryingEstimate {
            is_crying,
            confidence,
            audio_level: level,
            source: CryingSource::Classifier,
        };

        debug!(
            "Crying (classifier): {} (confidence {:.2}, level {:.2})",
            estimate.is_crying, estimate.confidence, estimate.audio_level
        );
        *self.latest.lock() = Some(estimate);
    }

    fn process_heuristic(&self, level: f32, now: SystemTime) {
        let mut state = self.state.lock();

        state.levels.push_back(level);
        while state.levels.len() > self.config.level_history {
            state.levels.pop_front();
        }

        if level > self.config.volume_threshold {
            state.low_since = None;
            let high_since = *state.high_since.get_or_insert(now);

            let sustained = now.duration_since(high_since).unwrap_or_default();
            if sustained > Duration::from_secs_f64(self.config.sustained_seconds) {
                let is_crying = self.classify_window(&state.levels);
                let estimate = CryingEstimate {
                    is_crying,
                    confidence: if is_crying { 0.70 } else { 0.3 },
                    audio_level: level,
                    source: CryingSource::Heuristic,
                };

                drop(state);
                debug!(
                    "Crying (heuristic): {} after {:.1}s sustained audio",
                    estimate.is_crying,
                    sustained.as_secs_f64()
                );
                *self.latest.lock() = Some(estimate);
            }
            return;
        }

        if level < self.config.quiet_floor {
            // Confidently quiet: reset the sustained timer immediately
            state.high_since = None;
            state.low_since = None;
            drop(state);

            *self.latest.lock() = Some(CryingEstimate {
                is_crying: false,
                confidence: 0.9,
                audio_level: level,
                source: CryingSource::Heuristic,
            });
            return;
        }

        // Between the quiet floor and the volume threshold: tolerate brief
        // dips, reset the sustained timer only after a continuous drop.
        if state.high_since.is_some() {
            let low_since = *state.low_since.get_or_insert(now);
            let dipped = now.duration_since(low_since).unwrap_or_default();
            if dipped >= Duration::from_secs_f64(self.config.dip_grace_seconds) {
                debug!("Sustained-audio timer reset after {:.1}s dip", dipped.as_secs_f64());
                state.high_since = None;
                state.low_since = None;
            }
        }
    }

    /// Crying decision over the most recent levels: moderate variance
    /// (human-like rhythm) at sustained elevated volume, as opposed to
    /// silence or constant noise like a fan.
    fn classify_window(&self, levels: &VecDeque<f32>) -> bool {
        let window = self.config.decision_window;
        if levels.len() < window {
            return false;
        }

        let recent: Vec<f32> = levels.iter().rev().take(window).copied().collect();
        let count = recent.len() as f32;

        let mean = recent.iter().sum::<f32>() / count;
        let variance = recent.iter().map(|l| (l - mean).powi(2)).sum::<f32>() / count;

        let has_rhythm = variance > 0.01 && variance < 0.1;
        let elevated = mean > self.config.volume_threshold;

        has_rhythm && elevated
    }
}

impl AudioSink for CryingDetector {
    fn on_chunk(&self, chunk: &AudioChunk) {
        self.process_chunk(chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Classification, FixedClassifier, NullClassifierProvider, StaticClassifierProvider};

    fn test_config() -> CryingConfig {
        CryingConfig {
            volume_threshold: 0.3,
            quiet_floor: 0.1,
            sustained_seconds: 3.0,
            dip_grace_seconds: 1.0,
            level_history: 50,
            decision_window: 20,
            classifier_confidence: 0.6,
        }
    }

    /// A chunk whose constant amplitude produces the given normalized level
    fn chunk_at_level(level: f32, timestamp: SystemTime) -> AudioChunk {
        AudioChunk::new(timestamp, vec![level / 10.0; 1024], 16000)
    }

    fn heuristic_detector() -> CryingDetector {
        let detector = CryingDetector::new(test_config());
        detector.start(&NullClassifierProvider);
        detector
    }

    #[test]
    fn test_stopped_detector_ignores_audio() {
        let detector = CryingDetector::new(test_config());
        detector.process_chunk(&chunk_at_level(0.9, SystemTime::now()));
        assert!(detector.latest_estimate().is_none());
    }

    #[test]
    fn test_constant_loud_noise_is_not_crying() {
        let detector = heuristic_detector();
        let t0 = SystemTime::now();

        // 5 s of constant level 0.9 every 100 ms: sustained, but with
        // near-zero variance it reads as a fan, not crying
        for i in 0..50 {
            let ts = t0 + Duration::from_millis(i * 100);
            detector.process_chunk(&chunk_at_level(0.9, ts));
        }

        let estimate = detector.latest_estimate().expect("decision expected");
        assert!(!estimate.is_crying);
        assert_eq!(estimate.confidence, 0.3);
        assert_eq!(estimate.source, CryingSource::Heuristic);
    }

    #[test]
    fn test_oscillating_elevated_audio_is_crying() {
        let detector = heuristic_detector();
        let t0 = SystemTime::now();

        // Levels alternating 0.2/0.6 every 100 ms for 5 s: brief dips below
        // the threshold stay inside the grace period, mean 0.4, variance
        // 0.04 - the crying rhythm signature
        for i in 0..50 {
            let level = if i % 2 == 0 { 0.6 } else { 0.2 };
            let ts = t0 + Duration::from_millis(i * 100);
            detector.process_chunk(&chunk_at_level(level, ts));
        }

        let estimate = detector.latest_estimate().expect("decision expected");
        assert!(estimate.is_crying);
        assert_eq!(estimate.confidence, 0.70);
        assert_eq!(estimate.source, CryingSource::Heuristic);
    }

    #[test]
    fn test_no_decision_before_sustained_window() {
        let detector = heuristic_detector();
        let t0 = SystemTime::now();

        for i in 0..25 {
            let ts = t0 + Duration::from_millis(i * 100);
            detector.process_chunk(&chunk_at_level(0.6, ts));
        }

        // 2.4 s of elevation: the sustain gate has not opened yet
        assert!(detector.latest_estimate().is_none());
    }

    #[test]
    fn test_quiet_audio_resets_and_publishes_confident_not_crying() {
        let detector = heuristic_detector();
        let t0 = SystemTime::now();

        for i in 0..20 {
            let ts = t0 + Duration::from_millis(i * 100);
            detector.process_chunk(&chunk_at_level(0.6, ts));
        }

        let ts = t0 + Duration::from_millis(2000);
        detector.process_chunk(&chunk_at_level(0.05, ts));

        let estimate = detector.latest_estimate().expect("quiet estimate expected");
        assert!(!estimate.is_crying);
        assert_eq!(estimate.confidence, 0.9);

        // The timer restarted: another 2.9 s of elevation is not enough
        for i in 0..29 {
            let ts = t0 + Duration::from_millis(2100 + i * 100);
            detector.process_chunk(&chunk_at_level(0.6, ts));
        }
        let estimate = detector.latest_estimate().unwrap();
        assert!(!estimate.is_crying);
        assert_eq!(estimate.confidence, 0.9);
    }

    #[test]
    fn test_long_dip_resets_sustained_timer() {
        let detector = heuristic_detector();
        let t0 = SystemTime::now();

        // 2 s elevated, then 1.2 s dipped to 0.2 (below threshold, above
        // the quiet floor), then 2.9 s elevated again
        for i in 0..20 {
            detector.process_chunk(&chunk_at_level(0.6, t0 + Duration::from_millis(i * 100)));
        }
        for i in 0..12 {
            detector.process_chunk(&chunk_at_level(0.2, t0 + Duration::from_millis(2000 + i * 100)));
        }
        for i in 0..29 {
            detector.process_chunk(&chunk_at_level(0.6, t0 + Duration::from_millis(3200 + i * 100)));
        }

        // The dip exceeded the grace period, so no decision was reached
        assert!(detector.latest_estimate().is_none());
    }

    #[test]
    fn test_brief_dip_does_not_reset_timer() {
        let detector = heuristic_detector();
        let t0 = SystemTime::now();

        for i in 0..20 {
            detector.process_chunk(&chunk_at_level(0.6, t0 + Duration::from_millis(i * 100)));
        }
        // 0.5 s dip, inside the grace period
        for i in 0..5 {
            detector.process_chunk(&chunk_at_level(0.2, t0 + Duration::from_millis(2000 + i * 100)));
        }
        // 1.2 s more elevation pushes the sustained period past 3 s
        for i in 0..12 {
            detector.process_chunk(&chunk_at_level(0.6, t0 + Duration::from_millis(2500 + i * 100)));
        }

        let estimate = detector.latest_estimate().expect("decision expected");
        // The window mixes 0.6 and 0.2 levels: elevated mean with variance
        assert!(estimate.is_crying);
        assert_eq!(estimate.source, CryingSource::Heuristic);
    }

    #[test]
    fn test_classifier_path_detects_crying() {
        let provider = StaticClassifierProvider {
            position: None,
            crying: Some(Arc::new(FixedClassifier::new(vec![
                Classification::new("crying", 0.9),
                Classification::new("not_crying", 0.1),
            ]))),
            face_coverage: None,
        };

        let detector = CryingDetector::new(test_config());
        detector.start(&provider);
        assert_eq!(detector.capability(), DetectionMethod::CustomModel);

        detector.process_chunk(&chunk_at_level(0.5, SystemTime::now()));

        let estimate = detector.latest_estimate().unwrap();
        assert!(estimate.is_crying);
        assert_eq!(estimate.confidence, 0.85);
        assert_eq!(estimate.source, CryingSource::Classifier);
    }

    #[test]
    fn test_classifier_low_score_is_not_crying() {
        let provider = StaticClassifierProvider {
            position: None,
            crying: Some(Arc::new(FixedClassifier::new(vec![
                Classification::new("crying", 0.4),
                Classification::new("not_crying", 0.35),
            ]))),
            face_coverage: None,
        };

        let detector = CryingDetector::new(test_config());
        detector.start(&provider);

        detector.process_chunk(&chunk_at_level(0.05, SystemTime::now()));

        let estimate = detector.latest_estimate().unwrap();
        assert!(!estimate.is_crying);
        assert_eq!(estimate.confidence, 0.9);
    }

    #[test]
    fn test_classifier_failure_falls_back_to_heuristic() {
        struct FailingClassifier;

        impl SoundClassifier for FailingClassifier {
            fn classify(
                &self,
                _chunk: &AudioChunk,
            ) -> Result<Vec<Classification>, crate::error::ClassifierError> {
                Err(crate::error::ClassifierError::Inference {
                    details: "model rejected input".to_string(),
                })
            }
        }

        let provider = StaticClassifierProvider {
            position: None,
            crying: Some(Arc::new(FailingClassifier)),
            face_coverage: None,
        };

        let detector = CryingDetector::new(test_config());
        detector.start(&provider);

        detector.process_chunk(&chunk_at_level(0.5, SystemTime::now()));
        assert_eq!(detector.capability(), DetectionMethod::BuiltInHeuristic);
    }

    #[test]
    fn test_restart_clears_rolling_state() {
        let detector = heuristic_detector();
        let t0 = SystemTime::now();

        for i in 0..25 {
            detector.process_chunk(&chunk_at_level(0.6, t0 + Duration::from_millis(i * 100)));
        }

        detector.stop();
        assert!(detector.latest_estimate().is_none());
        detector.start(&NullClassifierProvider);

        // Only 1 s of elevation after the restart: no decision
        for i in 0..10 {
            detector.process_chunk(&chunk_at_level(0.6, t0 + Duration::from_millis(2500 + i * 100)));
        }
        assert!(detector.latest_estimate().is_none());
    }
}
