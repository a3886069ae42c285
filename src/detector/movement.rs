use crate::config::MovementConfig;
use crate::error::DetectorError;
use crate::frame::{Frame, FrameFormat};
use crate::status::{MovementEstimate, MovementStatus};

use image::{GrayImage, Luma, RgbImage};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

struct MovementState {
    previous: Option<Frame>,
    stillness_start: Option<SystemTime>,
    history: VecDeque<(f32, SystemTime)>,
}

impl MovementState {
    fn new() -> Self {
        Self {
            previous: None,
            stillness_start: None,
            history: VecDeque::new(),
        }
    }
}

/// Frame-to-frame movement detection with stillness-duration tracking.
///
/// Magnitude is the mean absolute luminance difference over a central
/// patch, sampled at reduced density, normalized to [0, 1]. All temporal
/// decisions use frame timestamps, so a simulated clock is just a frame
/// stream with synthetic timestamps.
pub struct MovementDetector {
    config: MovementConfig,
    running: AtomicBool,
    state: Mutex<MovementState>,
    latest: Mutex<Option<MovementEstimate>>,
}

impl MovementDetector {
    pub fn new(config: MovementConfig) -> Self {
        Self {
            config,
            running: AtomicBool::new(false),
            state: Mutex::new(MovementState::new()),
            latest: Mutex::new(None),
        }
    }

    /// Start detection with fresh rolling state
    pub fn start(&self) {
        *self.state.lock() = MovementState::new();
        *self.latest.lock() = None;
        self.running.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        *self.state.lock() = MovementState::new();
        *self.latest.lock() = None;
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Quantify motion between this frame and the previous one.
    ///
    /// Returns a neutral estimate when stopped or on the first frame.
    pub fn detect(&self, frame: &Frame) -> MovementEstimate {
        if !self.is_running() {
            return MovementEstimate::still();
        }

        let mut state = self.state.lock();

        // The current frame always becomes "previous", including on the
        // early-return paths.
        let previous = state.previous.replace(frame.clone());

        let previous = match previous {
            Some(previous) => previous,
            None => {
                let estimate = MovementEstimate::still();
                drop(state);
                *self.latest.lock() = Some(estimate);
                return estimate;
            }
        };

        let magnitude = match self.frame_difference(&previous, frame) {
            Ok(magnitude) => magnitude,
            Err(e) => {
                warn!("Movement analysis skipped for frame {}: {}", frame.id, e);
                drop(state);
                return (*self.latest.lock()).unwrap_or_else(MovementEstimate::still);
            }
        };

        let now = frame.timestamp;

        state.history.push_back((magnitude, now));
        let window = Duration::from_secs(self.config.history_window_seconds);
        while let Some((_, ts)) = state.history.front() {
            let expired = now
                .duration_since(*ts)
                .map(|age| age > window)
                .unwrap_or(false);
            if expired {
                state.history.pop_front();
            } else {
                break;
            }
        }

        let estimate = if magnitude > self.config.movement_threshold {
            state.stillness_start = None;
            MovementEstimate {
                status: MovementStatus::Moving,
                magnitude,
                stillness_duration: Duration::ZERO,
            }
        } else {
            let start = *state.stillness_start.get_or_insert(now);
            let stillness_duration = now.duration_since(start).unwrap_or_default();

            let status = if stillness_duration
                > Duration::from_secs(self.config.stillness_alert_seconds)
            {
                MovementStatus::Unusual
            } else {
                MovementStatus::Still
            };

            MovementEstimate {
                status,
                magnitude,
                stillness_duration,
            }
        };

        drop(state);

        debug!(
            "Movement: {:?} (magnitude {:.4}, still for {:?})",
            estimate.status, estimate.magnitude, estimate.stillness_duration
        );

        *self.latest.lock() = Some(estimate);
        estimate
    }

    /// Latest estimate published for the coordinator
    pub fn latest_estimate(&self) -> Option<MovementEstimate> {
        *self.latest.lock()
    }

    #[cfg(test)]
    pub(crate) fn history_len(&self) -> usize {
        self.state.lock().history.len()
    }

    /// Mean absolute luminance difference over the central sample patch
    fn frame_difference(&self, previous: &Frame, current: &Frame) -> Result<f32, DetectorError> {
        if previous.width != current.width || previous.height != current.height {
            return Err(DetectorError::FrameProcessing {
                details: format!(
                    "frame dimensions changed: {}x{} -> {}x{}",
                    previous.width, previous.height, current.width, current.height
                ),
            });
        }

        let prev_gray = to_gray_image(previous)?;
        let curr_gray = to_gray_image(current)?;

        let width = current.width;
        let height = current.height;
        let region = self.config.sample_region.min(width).min(height);
        let x0 = (width - region) / 2;
        let y0 = (height - region) / 2;
        let stride = self.config.sample_stride.max(1);

        let mut total = 0u64;
        let mut count = 0u64;

        let mut y = y0;
        while y < y0 + region {
            let mut x = x0;
            while x < x0 + region {
                let a = prev_gray.get_pixel(x, y)[0] as i16;
                let b = curr_gray.get_pixel(x, y)[0] as i16;
                total += (a - b).unsigned_abs() as u64;
                count += 1;
                x += stride;
            }
            y += stride;
        }

        if count == 0 {
            return Ok(0.0);
        }

        Ok(total as f32 / count as f32 / 255.0)
    }
}

/// Convert a frame into a grayscale image for differencing
fn to_gray_image(frame: &Frame) -> Result<GrayImage, DetectorError> {
    match frame.format {
        FrameFormat::Gray8 => {
            GrayImage::from_raw(frame.width, frame.height, frame.data.to_vec()).ok_or_else(|| {
                DetectorError::FrameProcessing {
                    details: "grayscale buffer does not match frame dimensions".to_string(),
                }
            })
        }
        FrameFormat::Rgb24 => {
            let rgb = RgbImage::from_raw(frame.width, frame.height, frame.data.to_vec())
                .ok_or_else(|| DetectorError::FrameProcessing {
                    details: "RGB buffer does not match frame dimensions".to_string(),
                })?;

            let mut gray = GrayImage::new(frame.width, frame.height);
            for (x, y, rgb) in rgb.enumerate_pixels() {
                let value =
                    (0.299 * rgb[0] as f32 + 0.587 * rgb[1] as f32 + 0.114 * rgb[2] as f32) as u8;
                gray.put_pixel(x, y, Luma([value]));
            }
            Ok(gray)
        }
    }
}
