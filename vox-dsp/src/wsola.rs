//! WSOLA (Waveform Similarity Overlap-Add) time stretching, and a pitch
//! shifter built from it by resampling the stretched signal back to the
//! original length.

use vox_analysis::hann_window;

use crate::error::{ensure_finite, DspError, DspResult};
use crate::ola::WEIGHT_FLOOR;
use crate::variable::SegmentShifter;

/// Minimum energy for a correlation to be normalized
const ENERGY_EPSILON: f64 = 1e-12;

/// WSOLA settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WsolaConfig {
    /// Grain length in milliseconds
    pub segment_ms: f32,
    /// Search radius around the nominal read position, in milliseconds
    pub search_ms: f32,
}

impl Default for WsolaConfig {
    fn default() -> Self {
        Self {
            segment_ms: 20.0,
            search_ms: 5.0,
        }
    }
}

/// Time-domain stretcher.
///
/// Grains are written at a fixed half-grain hop; each grain is read from
/// the input position, within the search radius of its nominal position,
/// that best continues the waveform of the previously copied grain.
#[derive(Debug, Clone)]
pub struct Wsola {
    segment_size: usize,
    search_range: usize,
    window: Vec<f32>,
}

impl Wsola {
    /// Stretcher with explicit sizes in samples
    pub fn new(segment_size: usize, search_range: usize) -> DspResult<Self> {
        if segment_size < 4 {
            return Err(DspError::InvalidParameter {
                name: "segment_size",
                value: segment_size as f32,
            });
        }
        Ok(Self {
            segment_size,
            search_range,
            window: hann_window(segment_size),
        })
    }

    /// Stretcher sized from millisecond settings
    pub fn from_config(sample_rate: u32, config: WsolaConfig) -> DspResult<Self> {
        if sample_rate == 0 {
            return Err(DspError::InvalidSampleRate(sample_rate));
        }
        if !(config.segment_ms.is_finite() && config.segment_ms > 0.0) {
            return Err(DspError::InvalidParameter {
                name: "segment_ms",
                value: config.segment_ms,
            });
        }
        if !(config.search_ms.is_finite() && config.search_ms >= 0.0) {
            return Err(DspError::InvalidParameter {
                name: "search_ms",
                value: config.search_ms,
            });
        }
        let sr = sample_rate as f32;
        let segment = (config.segment_ms / 1000.0 * sr).round() as usize;
        let search = (config.search_ms / 1000.0 * sr).round() as usize;
        Self::new(segment, search)
    }

    #[inline]
    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    #[inline]
    pub fn search_range(&self) -> usize {
        self.search_range
    }

    /// Stretch `input` so it lasts `ratio` times as long (2.0 = twice as long).
    ///
    /// The output has `round(len * ratio)` samples. Inputs shorter than one
    /// grain are resampled instead.
    pub fn stretch(&self, input: &[f32], ratio: f32) -> DspResult<Vec<f32>> {
        if !(ratio.is_finite() && ratio > 0.0) {
            return Err(DspError::InvalidParameter {
                name: "stretch_ratio",
                value: ratio,
            });
        }
        ensure_finite(input)?;

        let target_len = (input.len() as f64 * ratio as f64).round() as usize;
        if input.len() < self.segment_size {
            return Ok(resample_linear(input, target_len));
        }

        let seg = self.segment_size;
        let hop = seg / 2;
        let last_start = input.len() - seg;

        let mut output = vec![0.0f32; target_len + seg];
        let mut weight = vec![0.0f32; target_len + seg];

        let mut read = 0usize;
        let mut write = 0usize;
        let mut grains = 0usize;
        while write < target_len {
            if grains > 0 {
                let nominal = ((write as f64 / ratio as f64).round() as usize).min(last_start);
                // Where the previous grain would naturally continue
                let natural = (read + hop).min(last_start);
                read = self.best_match(input, natural, nominal, hop);
            }

            for (i, &w) in self.window.iter().enumerate() {
                output[write + i] += input[read + i] * w;
                weight[write + i] += w;
            }
            write += hop;
            grains += 1;
        }

        for (o, &w) in output.iter_mut().zip(&weight) {
            if w > WEIGHT_FLOOR {
                *o /= w;
            }
        }
        output.truncate(target_len);

        tracing::trace!(grains, ratio, "wsola stretch");
        Ok(output)
    }

    /// Search positions around `nominal` for the best continuation of the
    /// waveform starting at `natural`
    fn best_match(&self, input: &[f32], natural: usize, nominal: usize, len: usize) -> usize {
        let last_start = input.len() - self.segment_size;
        let lo = nominal.saturating_sub(self.search_range);
        let hi = (nominal + self.search_range).min(last_start);
        if lo >= hi {
            return nominal;
        }

        let template = &input[natural..natural + len];
        let mut best = nominal;
        let mut best_corr = f64::NEG_INFINITY;
        for pos in lo..=hi {
            let corr = normalized_cross_correlation(template, &input[pos..pos + len]);
            if corr > best_corr {
                best_corr = corr;
                best = pos;
            }
        }
        best
    }
}

/// Pitch shifter: stretch by the pitch ratio, then resample back to the input length
#[derive(Debug, Clone)]
pub struct WsolaShifter {
    wsola: Wsola,
    sample_rate: u32,
}

impl WsolaShifter {
    pub fn new(sample_rate: u32, config: WsolaConfig) -> DspResult<Self> {
        Ok(Self {
            wsola: Wsola::from_config(sample_rate, config)?,
            sample_rate,
        })
    }

    #[inline]
    pub fn wsola(&self) -> &Wsola {
        &self.wsola
    }

    /// Shift by a frequency ratio, keeping the length
    pub fn shift_by_ratio(&self, input: &[f32], ratio: f32) -> DspResult<Vec<f32>> {
        let stretched = self.wsola.stretch(input, ratio)?;
        Ok(resample_linear(&stretched, input.len()))
    }
}

impl SegmentShifter for WsolaShifter {
    fn shift_segment(&mut self, segment: &[f32], semitones: f32) -> DspResult<Vec<f32>> {
        if !semitones.is_finite() {
            return Err(DspError::InvalidParameter {
                name: "semitones",
                value: semitones,
            });
        }
        self.shift_by_ratio(segment, 2.0f32.powf(semitones / 12.0))
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn name(&self) -> &'static str {
        "wsola"
    }
}

/// Linear-interpolation resample of `input` to exactly `len` samples
pub fn resample_linear(input: &[f32], len: usize) -> Vec<f32> {
    match (input.len(), len) {
        (_, 0) => return Vec::new(),
        (0, _) => return vec![0.0; len],
        (1, _) => return vec![input[0]; len],
        _ => {}
    }
    if len == 1 {
        return vec![input[0]];
    }

    let step = (input.len() - 1) as f64 / (len - 1) as f64;
    (0..len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = (pos.floor() as usize).min(input.len() - 2);
            let frac = (pos - idx as f64) as f32;
            input[idx] + (input[idx + 1] - input[idx]) * frac
        })
        .collect()
}

/// Normalized cross-correlation of two equal-length slices
fn normalized_cross_correlation(a: &[f32], b: &[f32]) -> f64 {
    let mut cross = 0.0f64;
    let mut energy_a = 0.0f64;
    let mut energy_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        cross += x as f64 * y as f64;
        energy_a += x as f64 * x as f64;
        energy_b += y as f64 * y as f64;
    }
    let denom = (energy_a * energy_b).sqrt();
    if denom < ENERGY_EPSILON {
        0.0
    } else {
        cross / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;
    use vox_analysis::dominant_frequency;

    const SR: u32 = 44100;

    fn sine(freq: f32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / SR as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn test_stretch_output_length() {
        let wsola = Wsola::from_config(SR, WsolaConfig::default()).unwrap();
        let input = sine(440.0, 22050);
        for ratio in [0.5f32, 1.0, 1.5, 2.0] {
            let out = wsola.stretch(&input, ratio).unwrap();
            assert_eq!(out.len(), (22050.0 * ratio).round() as usize);
        }
    }

    #[test]
    fn test_stretch_keeps_pitch() {
        let wsola = Wsola::from_config(SR, WsolaConfig::default()).unwrap();
        let out = wsola.stretch(&sine(440.0, 22050), 1.5).unwrap();
        let freq = dominant_frequency(&out[4410..28000], SR).unwrap();
        assert!((freq - 440.0).abs() < 15.0, "freq = {}", freq);
    }

    #[test]
    fn test_shifter_moves_pitch_and_keeps_length() {
        let mut shifter = WsolaShifter::new(SR, WsolaConfig::default()).unwrap();
        let input = sine(220.0, 22050);
        let out = shifter.shift_segment(&input, 7.0).unwrap();
        assert_eq!(out.len(), input.len());
        let freq = dominant_frequency(&out[2205..19845], SR).unwrap();
        assert!((freq - 329.6).abs() < 20.0, "freq = {}", freq);
    }

    #[test]
    fn test_short_input_is_resampled() {
        let wsola = Wsola::new(64, 8).unwrap();
        let out = wsola.stretch(&[0.0, 1.0], 2.0).unwrap();
        assert_eq!(out, vec![0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0]);
    }

    #[test]
    fn test_resample_endpoints() {
        let out = resample_linear(&[1.0, 2.0, 3.0], 5);
        assert_eq!(out, vec![1.0, 1.5, 2.0, 2.5, 3.0]);
        assert!(resample_linear(&[1.0], 0).is_empty());
    }

    #[test]
    fn test_rejects_invalid_ratio() {
        let wsola = Wsola::new(64, 8).unwrap();
        assert!(wsola.stretch(&[0.0; 128], 0.0).is_err());
        assert!(wsola.stretch(&[0.0; 128], f32::NAN).is_err());
    }
}
