//! Time-varying pitch by windowed constant-pitch shifting.
//!
//! The signal is cut into overlapping windows (100 ms, 50% overlap by
//! default). Each window is shifted by the curve value at its midpoint and
//! the results are cross-faded back together with a Hann weight,
//! normalized by the accumulated weight. Pitch can therefore change once
//! per window hop: shorter windows follow the curve more closely but give
//! the shifter less frequency resolution to work with.

use std::sync::Arc;

use vox_analysis::{hann_window, Frame};

use crate::curve::PitchCurve;
use crate::error::{ensure_finite, DspError, DspResult};
use crate::ola::{normalize, WEIGHT_FLOOR};
use crate::pool::BufferPool;
use crate::processor::{flatten_frames, reslice_frames, FrameProcessor};
use crate::vocoder::PitchShifter;

/// Shifts a whole segment by a constant amount without changing its length
pub trait SegmentShifter: Send {
    /// Shift `segment` by `semitones`; the result has `segment.len()` samples
    fn shift_segment(&mut self, segment: &[f32], semitones: f32) -> DspResult<Vec<f32>>;

    /// Sample rate the shifter was built for
    fn sample_rate(&self) -> u32;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

impl SegmentShifter for PitchShifter {
    fn shift_segment(&mut self, segment: &[f32], semitones: f32) -> DspResult<Vec<f32>> {
        self.shift(segment, semitones)
    }

    fn sample_rate(&self) -> u32 {
        PitchShifter::sample_rate(self)
    }

    fn name(&self) -> &'static str {
        "phase_vocoder"
    }
}

/// Window settings for variable-pitch processing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariablePitchConfig {
    /// Analysis window length in milliseconds
    pub window_ms: f32,
    /// Fraction of each window shared with the next (0.0 - 0.9)
    pub overlap: f32,
    /// Windows whose shift is within this many semitones of zero are copied unchanged
    pub bypass_tolerance: f32,
}

impl Default for VariablePitchConfig {
    fn default() -> Self {
        Self {
            window_ms: 100.0,
            overlap: 0.5,
            bypass_tolerance: 1e-3,
        }
    }
}

/// Applies a [`PitchCurve`] by driving a [`SegmentShifter`] window by window
pub struct VariablePitchProcessor<S: SegmentShifter> {
    shifter: S,
    config: VariablePitchConfig,
    window_len: usize,
    hop_len: usize,
    window: Vec<f32>,
    pool: Option<Arc<BufferPool>>,
}

impl<S: SegmentShifter> VariablePitchProcessor<S> {
    /// Wrap `shifter` with the given window settings
    pub fn new(shifter: S, config: VariablePitchConfig) -> DspResult<Self> {
        if !(config.window_ms.is_finite() && config.window_ms > 0.0) {
            return Err(DspError::InvalidParameter {
                name: "window_ms",
                value: config.window_ms,
            });
        }
        if !(0.0..=0.9).contains(&config.overlap) {
            return Err(DspError::InvalidParameter {
                name: "overlap",
                value: config.overlap,
            });
        }

        let sample_rate = shifter.sample_rate() as f32;
        let window_len = ((config.window_ms / 1000.0 * sample_rate).round() as usize).max(2);
        let hop_len = ((window_len as f32 * (1.0 - config.overlap)).round() as usize).max(1);

        Ok(Self {
            shifter,
            config,
            window_len,
            hop_len,
            window: hann_window(window_len),
            pool: None,
        })
    }

    /// Draw accumulation buffers from a shared pool
    pub fn with_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    #[inline]
    pub fn config(&self) -> &VariablePitchConfig {
        &self.config
    }

    /// Window length in samples
    #[inline]
    pub fn window_len(&self) -> usize {
        self.window_len
    }

    /// Distance between window starts in samples
    #[inline]
    pub fn hop_len(&self) -> usize {
        self.hop_len
    }

    #[inline]
    pub fn shifter(&self) -> &S {
        &self.shifter
    }

    /// Apply `curve` (seconds from the start of `signal`) to `signal`
    pub fn process_signal(&mut self, signal: &[f32], curve: &PitchCurve) -> DspResult<Vec<f32>> {
        ensure_finite(signal)?;
        if signal.is_empty() || curve.is_flat(self.config.bypass_tolerance) {
            return Ok(signal.to_vec());
        }

        let sample_rate = self.shifter.sample_rate() as f64;
        let win = self.window_len;
        // Half a window of lead-in so the first samples get a full cross-fade
        let pad = win / 2;
        let mut padded = vec![0.0f32; pad + signal.len() + pad + win];
        padded[pad..pad + signal.len()].copy_from_slice(signal);

        let len = padded.len();
        let (mut output, mut weight, mut fallback) = match &self.pool {
            Some(pool) => (pool.acquire(len), pool.acquire(len), pool.acquire(len)),
            None => (vec![0.0; len], vec![0.0; len], vec![0.0; len]),
        };

        let mut windows = 0usize;
        let mut shifted_windows = 0usize;
        let mut start = 0;
        while start < pad + signal.len() {
            let segment = &padded[start..start + win];
            // Window midpoint relative to the unpadded signal
            let midpoint = start as f64 / sample_rate;
            let semitones = curve.semitones_at(midpoint);

            let silent = segment.iter().all(|&s| s == 0.0);
            if !silent {
                let shifted;
                let source = if semitones.abs() <= self.config.bypass_tolerance {
                    segment
                } else {
                    shifted = self.shifter.shift_segment(segment, semitones)?;
                    shifted_windows += 1;
                    &shifted[..]
                };
                for (i, (&s, &w)) in source.iter().zip(&self.window).enumerate() {
                    output[start + i] += s * w;
                    // Window zeros with no overlapping window keep the raw sample
                    if w <= WEIGHT_FLOOR {
                        fallback[start + i] = s;
                    }
                }
            }
            for (acc, &w) in weight[start..start + win].iter_mut().zip(&self.window) {
                *acc += w;
            }

            windows += 1;
            start += self.hop_len;
        }

        normalize(&mut output, &weight, &fallback);

        let result = output[pad..pad + signal.len()].to_vec();
        if let Some(pool) = &self.pool {
            pool.release(output);
            pool.release(weight);
            pool.release(fallback);
        }

        tracing::debug!(
            shifter = self.shifter.name(),
            windows,
            shifted_windows,
            window_len = win,
            "variable pitch pass"
        );
        Ok(result)
    }
}

impl<S: SegmentShifter> FrameProcessor for VariablePitchProcessor<S> {
    fn name(&self) -> &'static str {
        self.shifter.name()
    }

    fn process(&mut self, frames: &[Frame], sample_rate: u32) -> DspResult<Vec<Frame>> {
        if sample_rate != self.shifter.sample_rate() {
            return Err(DspError::InvalidSampleRate(sample_rate));
        }
        if frames.is_empty() {
            return Ok(Vec::new());
        }
        let signal = flatten_frames(frames, sample_rate, self.pool.as_deref())?;
        let curve = PitchCurve::from_frames(frames).shifted(-frames[0].time);
        let processed = self.process_signal(&signal, &curve)?;
        Ok(reslice_frames(frames, &processed, sample_rate))
    }

    fn supports_variable_pitch(&self) -> bool {
        // One pitch per window, not per frame
        false
    }

    fn supports_variable_duration(&self) -> bool {
        false
    }
}
