//! Interleaved sample buffer

use crate::error::AnalysisError;

/// Audio samples with their format.
///
/// Multi-channel data is interleaved; the length is always a whole number
/// of sample frames.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Interleaved samples
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
}

impl AudioBuffer {
    /// Create a buffer, checking that `samples.len()` divides evenly into channels
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self, AnalysisError> {
        if channels == 0 {
            return Err(AnalysisError::NoChannels);
        }
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidSampleRate(sample_rate));
        }
        if samples.len() % channels as usize != 0 {
            return Err(AnalysisError::RaggedBuffer {
                len: samples.len(),
                channels,
            });
        }
        Ok(Self {
            samples,
            sample_rate,
            channels,
        })
    }

    /// Mono buffer
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self, AnalysisError> {
        Self::new(samples, sample_rate, 1)
    }

    /// Number of sample frames (samples per channel)
    #[inline]
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Extract one channel as a mono signal
    pub fn channel(&self, index: u16) -> Vec<f32> {
        if index >= self.channels {
            return Vec::new();
        }
        self.samples
            .iter()
            .skip(index as usize)
            .step_by(self.channels as usize)
            .copied()
            .collect()
    }
}
