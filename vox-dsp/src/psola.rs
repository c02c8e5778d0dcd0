//! TD-PSOLA (Time-Domain Pitch Synchronous Overlap-Add) pitch processing.
//!
//! Analysis pitch marks come from [`PeriodDetector`]. Output grains are
//! laid down one local period apart divided by the local pitch ratio, and
//! each takes the two-period Hann grain around the analysis mark nearest
//! in time. The time axis maps one-to-one, so the duration is unchanged
//! while the pitch can change from period to period.

use std::sync::Arc;

use vox_analysis::{hann_window, Frame, PeriodDetector, PitchMark, MAX_VOICE_HZ, MIN_VOICE_HZ};

use crate::curve::PitchCurve;
use crate::error::{ensure_finite, DspError, DspResult};
use crate::pool::BufferPool;
use crate::processor::{flatten_frames, reslice_frames, FrameProcessor};

/// PSOLA settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PsolaConfig {
    /// Lowest fundamental searched (Hz)
    pub min_hz: f32,
    /// Highest fundamental searched (Hz)
    pub max_hz: f32,
    /// Minimum normalized autocorrelation for a voiced period
    pub voicing_threshold: f32,
    /// Grain length in periods
    pub periods_per_grain: usize,
}

impl Default for PsolaConfig {
    fn default() -> Self {
        Self {
            min_hz: MIN_VOICE_HZ,
            max_hz: MAX_VOICE_HZ,
            voicing_threshold: 0.5,
            periods_per_grain: 2,
        }
    }
}

/// Pitch-synchronous pitch processor with per-period pitch changes
pub struct PsolaProcessor {
    config: PsolaConfig,
    sample_rate: u32,
    detector: PeriodDetector,
    window_cache: Vec<f32>,
    pool: Option<Arc<BufferPool>>,
}

impl PsolaProcessor {
    pub fn new(sample_rate: u32, config: PsolaConfig) -> DspResult<Self> {
        if sample_rate == 0 {
            return Err(DspError::InvalidSampleRate(sample_rate));
        }
        if !(config.min_hz > 0.0 && config.max_hz > config.min_hz) {
            return Err(DspError::InvalidParameter {
                name: "min_hz",
                value: config.min_hz,
            });
        }
        if config.periods_per_grain == 0 {
            return Err(DspError::InvalidParameter {
                name: "periods_per_grain",
                value: 0.0,
            });
        }

        let mut detector = PeriodDetector::with_range(sample_rate, config.min_hz, config.max_hz);
        detector.set_voicing_threshold(config.voicing_threshold);
        Ok(Self {
            config,
            sample_rate,
            detector,
            window_cache: Vec::new(),
            pool: None,
        })
    }

    pub fn with_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    #[inline]
    pub fn config(&self) -> &PsolaConfig {
        &self.config
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Window for a grain of `size` samples, rebuilt only when the size changes
    fn window(&mut self, size: usize) -> &[f32] {
        if self.window_cache.len() != size {
            self.window_cache = hann_window(size);
        }
        &self.window_cache
    }

    /// Apply `curve` (seconds from the start of `signal`) to `signal`
    pub fn process_signal(&mut self, signal: &[f32], curve: &PitchCurve) -> DspResult<Vec<f32>> {
        ensure_finite(signal)?;
        let marks = self.detector.pitch_marks(signal);
        if marks.is_empty() || curve.is_flat(1e-4) {
            return Ok(signal.to_vec());
        }

        let len = signal.len();
        let sr = self.sample_rate as f64;
        let (mut output, mut weight) = match &self.pool {
            Some(pool) => (pool.acquire(len), pool.acquire(len)),
            None => (vec![0.0; len], vec![0.0; len]),
        };

        let mut grains = 0usize;
        let mut voiced_grains = 0usize;
        let mut t_out = marks[0].position;
        while t_out < len as f64 {
            let source = nearest_mark(&marks, t_out);
            let mark = marks[source];
            let scale = if mark.voiced {
                local_scale(&marks, t_out, curve, sr)
            } else {
                1.0
            };

            let half = (mark.period * self.config.periods_per_grain as f32 / 2.0).round().max(1.0) as usize;
            let grain_len = 2 * half;
            let center_in = mark.position.round() as i64;
            let center_out = t_out.round() as i64;
            let window = self.window(grain_len);

            for (i, &w) in window.iter().enumerate() {
                let offset = i as i64 - half as i64;
                let src = center_in + offset;
                let dst = center_out + offset;
                if src < 0 || dst < 0 || src as usize >= len || dst as usize >= len {
                    continue;
                }
                output[dst as usize] += signal[src as usize] * w;
                weight[dst as usize] += w;
            }

            grains += 1;
            if mark.voiced {
                voiced_grains += 1;
            }
            t_out += (mark.period / scale).max(1.0) as f64;
        }

        // Only crowded regions are scaled down; sparse grains keep their envelope
        for (o, &w) in output.iter_mut().zip(weight.iter()) {
            if w > 1.0 {
                *o /= w;
            }
        }

        if let Some(pool) = &self.pool {
            pool.release(weight);
        }

        tracing::debug!(marks = marks.len(), grains, voiced_grains, "psola pass");
        Ok(output)
    }
}

/// Index of the analysis mark closest to `position`
fn nearest_mark(marks: &[PitchMark], position: f64) -> usize {
    let upper = marks.partition_point(|m| m.position <= position);
    if upper == 0 {
        return 0;
    }
    if upper >= marks.len() {
        return marks.len() - 1;
    }
    let before = position - marks[upper - 1].position;
    let after = marks[upper].position - position;
    if after < before {
        upper
    } else {
        upper - 1
    }
}

/// Pitch ratio at `position`, interpolated between the ratios at the two
/// surrounding analysis marks
fn local_scale(marks: &[PitchMark], position: f64, curve: &PitchCurve, sample_rate: f64) -> f32 {
    let upper = marks.partition_point(|m| m.position <= position);
    if upper == 0 || upper >= marks.len() {
        return curve.ratio_at(position / sample_rate);
    }
    let a = marks[upper - 1].position;
    let b = marks[upper].position;
    let scale_a = curve.ratio_at(a / sample_rate);
    let scale_b = curve.ratio_at(b / sample_rate);
    let frac = if b > a { ((position - a) / (b - a)) as f32 } else { 0.0 };
    scale_a + (scale_b - scale_a) * frac
}

impl FrameProcessor for PsolaProcessor {
    fn name(&self) -> &'static str {
        "psola"
    }

    fn process(&mut self, frames: &[Frame], sample_rate: u32) -> DspResult<Vec<Frame>> {
        if sample_rate != self.sample_rate {
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
        true
    }

    fn supports_variable_duration(&self) -> bool {
        false
    }
}
