use std::sync::Arc;
use std::time::SystemTime;

/// A fixed-length buffer of audio amplitude samples.
///
/// Chunks are consumed by the crying detector immediately after level
/// computation and never persisted. Samples are normalized f32 amplitudes
/// as delivered by the capture collaborator.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Timestamp when the chunk was captured
    pub timestamp: SystemTime,
    /// Amplitude samples (shared ownership, read-only)
    pub samples: Arc<Vec<f32>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioChunk {
    pub fn new(timestamp: SystemTime, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            timestamp,
            samples: Arc::new(samples),
            sample_rate,
        }
    }

    /// Root-mean-square amplitude of the chunk
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }

        let sum_squares: f32 = self.samples.iter().map(|&s| s * s).sum();
        (sum_squares / self.samples.len() as f32).sqrt()
    }

    /// Normalized audio level in [0, 1]
    pub fn level(&self) -> f32 {
        (self.rms() * 10.0).min(1.0)
    }

    /// Chunk duration derived from sample count and rate
    pub fn duration(&self) -> std::time::Duration {
        if self.sample_rate == 0 {
            return std::time::Duration::ZERO;
        }
        std::time::Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_of_silence() {
        let chunk = AudioChunk::new(SystemTime::now(), vec![0.0; 1024], 16000);
        assert_eq!(chunk.rms(), 0.0);
        assert_eq!(chunk.level(), 0.0);
    }

    #[test]
    fn test_rms_of_constant_amplitude() {
        let chunk = AudioChunk::new(SystemTime::now(), vec![0.05; 1024], 16000);
        assert!((chunk.rms() - 0.05).abs() < 1e-6);
        assert!((chunk.level() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_level_saturates_at_one() {
        let chunk = AudioChunk::new(SystemTime::now(), vec![0.5; 1024], 16000);
        assert_eq!(chunk.level(), 1.0);
    }

    #[test]
    fn test_empty_chunk() {
        let chunk = AudioChunk::new(SystemTime::now(), vec![], 16000);
        assert_eq!(chunk.rms(), 0.0);
        assert_eq!(chunk.duration(), std::time::Duration::ZERO);
    }

    #[test]
    fn test_chunk_duration() {
        let chunk = AudioChunk::new(SystemTime::now(), vec![0.0; 1600], 16000);
        assert_eq!(chunk.duration(), std::time::Duration::from_millis(100));
    }
}
