use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CribwatchConfig {
    pub camera: CameraConfig,
    pub audio: AudioConfig,
    pub position: PositionConfig,
    pub movement: MovementConfig,
    pub crying: CryingConfig,
    pub monitor: MonitorConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Analysis resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Frames per second requested from the capture collaborator
    #[serde(default = "default_camera_fps")]
    pub fps: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AudioConfig {
    /// Sample rate in Hz expected from the audio collaborator
    #[serde(default = "default_audio_sample_rate")]
    pub sample_rate: u32,

    /// Samples per delivered chunk
    #[serde(default = "default_audio_buffer_size")]
    pub buffer_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PositionConfig {
    /// Minimum per-landmark confidence for the heuristic path
    #[serde(default = "default_min_landmark_confidence")]
    pub min_landmark_confidence: f32,

    /// Nose confidence below which the face is considered possibly covered
    #[serde(default = "default_covered_nose_confidence")]
    pub covered_nose_confidence: f32,

    /// Minimum score for the coverage classifier's "covered" label
    #[serde(default = "default_coverage_classifier_confidence")]
    pub coverage_classifier_confidence: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MovementConfig {
    /// Normalized frame-difference magnitude above which the frame counts
    /// as movement
    #[serde(default = "default_movement_threshold")]
    pub movement_threshold: f32,

    /// Continuous stillness before the detector reports Unusual
    #[serde(default = "default_stillness_alert_seconds")]
    pub stillness_alert_seconds: u64,

    /// Rolling magnitude history window
    #[serde(default = "default_history_window_seconds")]
    pub history_window_seconds: u64,

    /// Side length in pixels of the central patch sampled for differencing
    #[serde(default = "default_sample_region")]
    pub sample_region: u32,

    /// Sample every Nth pixel inside the patch
    #[serde(default = "default_sample_stride")]
    pub sample_stride: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CryingConfig {
    /// Level above which audio counts toward the sustained-high timer
    #[serde(default = "default_volume_threshold")]
    pub volume_threshold: f32,

    /// Level below which the detector is confidently quiet
    #[serde(default = "default_quiet_floor")]
    pub quiet_floor: f32,

    /// Sustained high audio required before a crying decision
    #[serde(default = "default_sustained_seconds")]
    pub sustained_seconds: f64,

    /// Dips below the volume threshold shorter than this do not reset
    /// the sustained timer
    #[serde(default = "default_dip_grace_seconds")]
    pub dip_grace_seconds: f64,

    /// Number of recent levels retained
    #[serde(default = "default_level_history")]
    pub level_history: usize,

    /// Number of most recent levels used for the variance decision
    #[serde(default = "default_decision_window")]
    pub decision_window: usize,

    /// Minimum score for the sound classifier's crying label
    #[serde(default = "default_crying_classifier_confidence")]
    pub classifier_confidence: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MonitorConfig {
    /// Analysis tick period in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Cooldown during which a same-kind alert is not re-raised
    #[serde(default = "default_alert_cooldown_seconds")]
    pub alert_cooldown_seconds: u64,

    /// Stillness duration the coordinator re-checks before alerting,
    /// on top of the detector's own Unusual classification
    #[serde(default = "default_stillness_recheck_seconds")]
    pub stillness_recheck_seconds: u64,

    /// Minimum position confidence for the rolled-onto-stomach alert
    #[serde(default = "default_stomach_alert_confidence")]
    pub stomach_alert_confidence: f32,

    /// Number of recent alerts kept in the in-memory log
    #[serde(default = "default_alert_log_capacity")]
    pub alert_log_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl CribwatchConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("cribwatch.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            // Start with default values
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.fps", default_camera_fps())?
            .set_default("audio.sample_rate", default_audio_sample_rate())?
            .set_default("audio.buffer_size", default_audio_buffer_size() as i64)?
            .set_default(
                "position.min_landmark_confidence",
                default_min_landmark_confidence() as f64,
            )?
            .set_default(
                "position.covered_nose_confidence",
                default_covered_nose_confidence() as f64,
            )?
            .set_default(
                "position.coverage_classifier_confidence",
                default_coverage_classifier_confidence() as f64,
            )?
            .set_default(
                "movement.movement_threshold",
                default_movement_threshold() as f64,
            )?
            .set_default(
                "movement.stillness_alert_seconds",
                default_stillness_alert_seconds(),
            )?
            .set_default(
                "movement.history_window_seconds",
                default_history_window_seconds(),
            )?
            .set_default("movement.sample_region", default_sample_region())?
            .set_default("movement.sample_stride", default_sample_stride())?
            .set_default("crying.volume_threshold", default_volume_threshold() as f64)?
            .set_default("crying.quiet_floor", default_quiet_floor() as f64)?
            .set_default("crying.sustained_seconds", default_sustained_seconds())?
            .set_default("crying.dip_grace_seconds", default_dip_grace_seconds())?
            .set_default("crying.level_history", default_level_history() as i64)?
            .set_default("crying.decision_window", default_decision_window() as i64)?
            .set_default(
                "crying.classifier_confidence",
                default_crying_classifier_confidence() as f64,
            )?
            .set_default("monitor.tick_interval_ms", default_tick_interval_ms())?
            .set_default(
                "monitor.alert_cooldown_seconds",
                default_alert_cooldown_seconds(),
            )?
            .set_default(
                "monitor.stillness_recheck_seconds",
                default_stillness_recheck_seconds(),
            )?
            .set_default(
                "monitor.stomach_alert_confidence",
                default_stomach_alert_confidence() as f64,
            )?
            .set_default(
                "monitor.alert_log_capacity",
                default_alert_log_capacity() as i64,
            )?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with CRIBWATCH_ prefix
            .add_source(Environment::with_prefix("CRIBWATCH").separator("_"))
            .build()?;

        let config: CribwatchConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if self.audio.sample_rate == 0 {
            return Err(ConfigError::Message(
                "Audio sample rate must be greater than 0".to_string(),
            ));
        }

        if self.audio.buffer_size == 0 {
            return Err(ConfigError::Message(
                "Audio buffer size must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.movement.movement_threshold)
            || self.movement.movement_threshold == 0.0
        {
            return Err(ConfigError::Message(
                "Movement threshold must be in (0, 1]".to_string(),
            ));
        }

        if self.movement.sample_stride == 0 {
            return Err(ConfigError::Message(
                "Movement sample stride must be greater than 0".to_string(),
            ));
        }

        if self.crying.quiet_floor >= self.crying.volume_threshold {
            return Err(ConfigError::Message(
                "Crying quiet floor must be below the volume threshold".to_string(),
            ));
        }

        if self.crying.decision_window == 0
            || self.crying.decision_window > self.crying.level_history
        {
            return Err(ConfigError::Message(
                "Crying decision window must be nonzero and within the level history".to_string(),
            ));
        }

        if self.monitor.tick_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Monitor tick interval must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for CribwatchConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                resolution: default_camera_resolution(),
                fps: default_camera_fps(),
            },
            audio: AudioConfig {
                sample_rate: default_audio_sample_rate(),
                buffer_size: default_audio_buffer_size(),
            },
            position: PositionConfig {
                min_landmark_confidence: default_min_landmark_confidence(),
                covered_nose_confidence: default_covered_nose_confidence(),
                coverage_classifier_confidence: default_coverage_classifier_confidence(),
            },
            movement: MovementConfig {
                movement_threshold: default_movement_threshold(),
                stillness_alert_seconds: default_stillness_alert_seconds(),
                history_window_seconds: default_history_window_seconds(),
                sample_region: default_sample_region(),
                sample_stride: default_sample_stride(),
            },
            crying: CryingConfig {
                volume_threshold: default_volume_threshold(),
                quiet_floor: default_quiet_floor(),
                sustained_seconds: default_sustained_seconds(),
                dip_grace_seconds: default_dip_grace_seconds(),
                level_history: default_level_history(),
                decision_window: default_decision_window(),
                classifier_confidence: default_crying_classifier_confidence(),
            },
            monitor: MonitorConfig {
                tick_interval_ms: default_tick_interval_ms(),
                alert_cooldown_seconds: default_alert_cooldown_seconds(),
                stillness_recheck_seconds: default_stillness_recheck_seconds(),
                stomach_alert_confidence: default_stomach_alert_confidence(),
                alert_log_capacity: default_alert_log_capacity(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_camera_fps() -> u32 {
    5
}

fn default_audio_sample_rate() -> u32 {
    16000
}
fn default_audio_buffer_size() -> usize {
    1024
}

fn default_min_landmark_confidence() -> f32 {
    0.3
}
fn default_covered_nose_confidence() -> f32 {
    0.4
}
fn default_coverage_classifier_confidence() -> f32 {
    0.7
}

fn default_movement_threshold() -> f32 {
    0.02
}
fn default_stillness_alert_seconds() -> u64 {
    120
}
fn default_history_window_seconds() -> u64 {
    30
}
fn default_sample_region() -> u32 {
    100
}
fn default_sample_stride() -> u32 {
    4
}

fn default_volume_threshold() -> f32 {
    0.3
}
fn default_quiet_floor() -> f32 {
    0.1
}
fn default_sustained_seconds() -> f64 {
    3.0
}
fn default_dip_grace_seconds() -> f64 {
    1.0
}
fn default_level_history() -> usize {
    50
}
fn default_decision_window() -> usize {
    20
}
fn default_crying_classifier_confidence() -> f32 {
    0.6
}

fn default_tick_interval_ms() -> u64 {
    500
}
fn default_alert_cooldown_seconds() -> u64 {
    30
}
fn default_stillness_recheck_seconds() -> u64 {
    30
}
fn default_stomach_alert_confidence() -> f32 {
    0.8
}
fn default_alert_log_capacity() -> usize {
    50
}

fn default_event_bus_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = CribwatchConfig::default();
        assert!(config.validate().is_ok());

        assert_eq!(config.monitor.tick_interval_ms, 500);
        assert_eq!(config.movement.movement_threshold, 0.02);
        assert_eq!(config.movement.stillness_alert_seconds, 120);
        assert_eq!(config.crying.volume_threshold, 0.3);
        assert_eq!(config.monitor.alert_cooldown_seconds, 30);
    }

    #[test]
    fn test_config_validation() {
        let mut config = CribwatchConfig::default();

        config.camera.resolution = (0, 0);
        assert!(config.validate().is_err());
        config.camera.resolution = (640, 480);
        assert!(config.validate().is_ok());

        config.crying.quiet_floor = 0.5;
        assert!(config.validate().is_err());
        config.crying.quiet_floor = 0.1;

        config.crying.decision_window = 200;
        assert!(config.validate().is_err());
        config.crying.decision_window = 20;

        config.movement.movement_threshold = 0.0;
        assert!(config.validate().is_err());
        config.movement.movement_threshold = 0.02;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[camera]
fps = 10

[movement]
movement_threshold = 0.05

[monitor]
tick_interval_ms = 250
"#
        )
        .unwrap();

        let config = CribwatchConfig::load_from_file(file.path()).unwrap();

        // Overridden values
        assert_eq!(config.camera.fps, 10);
        assert_eq!(config.movement.movement_threshold, 0.05);
        assert_eq!(config.monitor.tick_interval_ms, 250);

        // Untouched values keep their defaults
        assert_eq!(config.camera.resolution, (640, 480));
        assert_eq!(config.crying.level_history, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config =
            CribwatchConfig::load_from_file("/nonexistent/cribwatch.toml").unwrap();
        assert_eq!(config.monitor.tick_interval_ms, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let config = CribwatchConfig::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        let back: CribwatchConfig = toml::from_str(&toml).unwrap();
        assert_eq!(back.monitor.tick_interval_ms, config.monitor.tick_interval_ms);
        assert_eq!(back.crying.decision_window, config.crying.decision_window);
    }
}
