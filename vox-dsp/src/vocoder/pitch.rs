//! Phase-coherent pitch shifting by frequency-bin remapping.
//!
//! Every output bin `k` reads the analysis spectrum at `k / ratio`, linearly
//! interpolating magnitude and phase between the two nearest bins. The first
//! frame takes the interpolated (unwrapped) analysis phase. Later frames
//! advance each spectral peak by its interpolated instantaneous frequency
//! scaled by the ratio, and lock the surrounding bins to that peak with
//! their analysis phase offsets, which keeps partials coherent from hop to
//! hop and across neighbouring bins. Analysis and synthesis share one hop,
//! so the duration is unchanged.

use std::f32::consts::PI;
use std::sync::Arc;

use vox_analysis::Complex;

use super::formant::{envelope_correction, spectral_envelope, DEFAULT_SMOOTHING_BINS};
use super::stft::{PhaseVocoder, Spectrum};
use crate::error::{ensure_finite, DspError, DspResult};
use crate::filter::OnePoleLowPass;
use crate::pool::BufferPool;

const TWO_PI: f32 = 2.0 * PI;
/// Magnitudes at or below this are never treated as spectral peaks
const PEAK_FLOOR: f32 = 1e-9;

/// Pitch shifter settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchShifterConfig {
    /// FFT size (power of two)
    pub fft_size: usize,
    /// Analysis and synthesis hop
    pub hop_size: usize,
    /// Keep the spectral envelope in place while harmonics move
    pub preserve_formants: bool,
    /// Low-pass before raising / after lowering pitch
    pub anti_aliasing: bool,
    /// Moving-average width of the formant envelope, in bins
    pub envelope_smoothing_bins: usize,
}

impl Default for PitchShifterConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            hop_size: 512,
            preserve_formants: false,
            anti_aliasing: true,
            envelope_smoothing_bins: DEFAULT_SMOOTHING_BINS,
        }
    }
}

/// Duration-preserving pitch shifter built on [`PhaseVocoder`].
///
/// Phase history is owned by the instance and reset at the start of every
/// [`shift`](Self::shift) call, so one buffer transform never leaks state
/// into the next.
pub struct PitchShifter {
    config: PitchShifterConfig,
    sample_rate: u32,
    vocoder: PhaseVocoder,
    num_bins: usize,
    /// Expected phase advance per hop for each bin: 2*pi*k*hop/N
    omega: Vec<f32>,
    /// Analysis phases of the previous frame
    prev_phase: Vec<f32>,
    /// Running synthesis phases
    synth_phase: Vec<f32>,
    // Per-frame scratch
    magnitudes: Vec<f32>,
    phases: Vec<f32>,
    advance: Vec<f32>,
    out_magnitude: Vec<f32>,
    out_phase: Vec<f32>,
    out_advance: Vec<f32>,
    peaks: Vec<usize>,
    shifted: Vec<Complex<f32>>,
}

impl PitchShifter {
    /// Create a pitch shifter for `sample_rate` Hz audio
    pub fn new(sample_rate: u32, config: PitchShifterConfig) -> DspResult<Self> {
        if sample_rate == 0 {
            return Err(DspError::InvalidSampleRate(sample_rate));
        }
        let vocoder = PhaseVocoder::new(config.fft_size, config.hop_size)?;
        let num_bins = vocoder.num_bins();
        let omega = (0..num_bins)
            .map(|k| TWO_PI * k as f32 * config.hop_size as f32 / config.fft_size as f32)
            .collect();

        Ok(Self {
            config,
            sample_rate,
            vocoder,
            num_bins,
            omega,
            prev_phase: vec![0.0; num_bins],
            synth_phase: vec![0.0; num_bins],
            magnitudes: vec![0.0; num_bins],
            phases: vec![0.0; num_bins],
            advance: vec![0.0; num_bins],
            out_magnitude: vec![0.0; num_bins],
            out_phase: vec![0.0; num_bins],
            out_advance: vec![0.0; num_bins],
            peaks: Vec::with_capacity(num_bins / 4),
            shifted: vec![Complex::new(0.0, 0.0); num_bins],
        })
    }

    /// Share scratch buffers with other stages
    pub fn with_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.vocoder = self.vocoder.with_pool(pool);
        self
    }

    #[inline]
    pub fn config(&self) -> &PitchShifterConfig {
        &self.config
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Clear phase history
    pub fn reset(&mut self) {
        self.prev_phase.fill(0.0);
        self.synth_phase.fill(0.0);
    }

    /// Shift `input` by `semitones`, returning exactly `input.len()` samples
    pub fn shift(&mut self, input: &[f32], semitones: f32) -> DspResult<Vec<f32>> {
        if !semitones.is_finite() {
            return Err(DspError::InvalidParameter {
                name: "semitones",
                value: semitones,
            });
        }
        self.shift_by_ratio(input, 2.0f32.powf(semitones / 12.0))
    }

    /// Shift `input` by a frequency ratio (2.0 = one octave up)
    pub fn shift_by_ratio(&mut self, input: &[f32], ratio: f32) -> DspResult<Vec<f32>> {
        if !(ratio.is_finite() && ratio > 0.0) {
            return Err(DspError::InvalidParameter {
                name: "pitch_ratio",
                value: ratio,
            });
        }
        ensure_finite(input)?;
        if input.is_empty() {
            return Ok(Vec::new());
        }

        self.reset();
        let n = self.config.fft_size;
        let sr = self.sample_rate as f32;

        // Pad a full window on each side so every input sample sees complete overlap
        let mut padded = vec![0.0f32; n + input.len() + n];
        padded[n..n + input.len()].copy_from_slice(input);

        if self.config.anti_aliasing && ratio > 1.0 {
            OnePoleLowPass::new(sr / (2.0 * ratio), sr).process(&mut padded);
        }

        let mut spectra = self.vocoder.analyze(&padded);
        for (index, spectrum) in spectra.iter_mut().enumerate() {
            self.remap_frame(spectrum, ratio, index == 0);
        }
        let mut output = self.vocoder.synthesize(&spectra, padded.len());

        if self.config.anti_aliasing && ratio < 1.0 {
            OnePoleLowPass::new(sr * ratio / 2.0, sr).process(&mut output);
        }

        output.truncate(n + input.len());
        output.drain(..n);
        Ok(output)
    }

    /// Replace one full spectrum by its pitch-shifted counterpart
    fn remap_frame(&mut self, spectrum: &mut Spectrum, ratio: f32, first: bool) {
        let num_bins = self.num_bins;
        let n = spectrum.len();

        for k in 0..num_bins {
            let bin = spectrum[k];
            let phase = bin.im.atan2(bin.re);
            self.magnitudes[k] = bin.norm();
            self.phases[k] = phase;
            self.advance[k] = if first {
                self.omega[k]
            } else {
                self.omega[k] + wrap_phase(phase - self.prev_phase[k] - self.omega[k])
            };
            self.prev_phase[k] = phase;
        }

        let gain = if self.config.preserve_formants {
            let envelope = spectral_envelope(&self.magnitudes, self.config.envelope_smoothing_bins);
            Some(envelope_correction(&envelope, ratio))
        } else {
            None
        };

        // Remap magnitude, phase and phase advance of every output bin
        let last = (num_bins - 1) as f32;
        for k in 0..num_bins {
            let src = k as f32 / ratio;
            if src >= last {
                self.out_magnitude[k] = 0.0;
                self.out_phase[k] = 0.0;
                self.out_advance[k] = self.omega[k];
                continue;
            }

            let i0 = src as usize;
            let i1 = i0 + 1;
            let frac = src - i0 as f32;

            let mut magnitude = lerp(self.magnitudes[i0], self.magnitudes[i1], frac);
            if let Some(gain) = &gain {
                magnitude *= gain[k];
            }
            self.out_magnitude[k] = magnitude;

            // Unwrap the upper neighbour against the lower before blending
            let p0 = self.phases[i0];
            let p1 = p0 + wrap_phase(self.phases[i1] - p0);
            self.out_phase[k] = lerp(p0, p1, frac);
            self.out_advance[k] = lerp(self.advance[i0], self.advance[i1], frac) * ratio;
        }

        if first {
            self.synth_phase.copy_from_slice(&self.out_phase);
        } else {
            self.propagate_phases();
        }

        for k in 0..num_bins {
            self.shifted[k] = Complex::from_polar(self.out_magnitude[k], self.synth_phase[k]);
        }

        // Rebuild the full spectrum with Hermitian symmetry
        spectrum[..num_bins].copy_from_slice(&self.shifted);
        for k in 1..n / 2 {
            spectrum[n - k] = self.shifted[k].conj();
        }
    }

    /// Advance peak bins by their instantaneous frequency and lock the bins
    /// around each peak to it, keeping the analysis phase offsets between them
    fn propagate_phases(&mut self) {
        self.find_peaks();

        if self.peaks.is_empty() {
            for k in 0..self.num_bins {
                self.synth_phase[k] = wrap_phase(self.synth_phase[k] + self.out_advance[k]);
            }
            return;
        }

        for &p in &self.peaks {
            self.synth_phase[p] = wrap_phase(self.synth_phase[p] + self.out_advance[p]);
        }

        let mut region = 0;
        for k in 0..self.num_bins {
            // Move to the peak whose region (bounded by midpoints) contains k
            while region + 1 < self.peaks.len() && k * 2 > self.peaks[region] + self.peaks[region + 1] {
                region += 1;
            }
            let p = self.peaks[region];
            if k != p {
                self.synth_phase[k] =
                    wrap_phase(self.synth_phase[p] + self.out_phase[k] - self.out_phase[p]);
            }
        }
    }

    /// Local magnitude maxima over +-2 bins
    fn find_peaks(&mut self) {
        self.peaks.clear();
        let mags = &self.out_magnitude;
        let n = mags.len();
        for k in 0..n {
            let m = mags[k];
            if m <= PEAK_FLOOR {
                continue;
            }
            let lo = k.saturating_sub(2);
            let hi = (k + 2).min(n - 1);
            let is_peak = (lo..=hi).all(|j| j == k || (j < k && m > mags[j]) || (j > k && m >= mags[j]));
            if is_peak {
                self.peaks.push(k);
            }
        }
    }
}

/// Wrap phase to [-pi, pi]
#[inline(always)]
fn wrap_phase(phase: f32) -> f32 {
    phase - TWO_PI * (phase / TWO_PI).round()
}

#[inline(always)]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use vox_analysis::{dominant_frequency, magnitude_spectrum};

    const SR: u32 = 48000;

    fn sine(freq: f32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / SR as f32).sin() * 0.5)
            .collect()
    }

    fn tones(parts: &[(f32, f32)], n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| {
                let t = i as f32 / SR as f32;
                parts.iter().map(|&(f, a)| a * (2.0 * PI * f * t).sin()).sum()
            })
            .collect()
    }

    /// Power spectrum of `samples` as `(hz, power)` pairs
    fn power_bins(samples: &[f32]) -> Vec<(f32, f32)> {
        let mags = magnitude_spectrum(samples);
        let bin_hz = SR as f32 / ((mags.len() - 1) * 2) as f32;
        mags.iter().enumerate().map(|(k, m)| (k as f32 * bin_hz, m * m)).collect()
    }

    fn band_energy(samples: &[f32], lo: f32, hi: f32) -> f32 {
        power_bins(samples)
            .into_iter()
            .filter(|&(hz, _)| hz >= lo && hz < hi)
            .map(|(_, p)| p)
            .sum()
    }

    fn spectral_centroid(samples: &[f32], lo: f32, hi: f32) -> f32 {
        let (weighted, total) = power_bins(samples)
            .into_iter()
            .filter(|&(hz, _)| hz >= lo && hz < hi)
            .fold((0.0f64, 0.0f64), |(w, t), (hz, p)| (w + (hz * p) as f64, t + p as f64));
        (weighted / total) as f32
    }

    fn shifter_with(preserve_formants: bool, anti_aliasing: bool) -> PitchShifter {
        let config = PitchShifterConfig {
            preserve_formants,
            anti_aliasing,
            ..Default::default()
        };
        PitchShifter::new(SR, config).unwrap()
    }

    fn rms_diff(a: &[f32], b: &[f32]) -> f32 {
        let sum: f32 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
        (sum / a.len() as f32).sqrt()
    }

    #[test]
    fn test_zero_shift_is_identity() {
        let mut shifter = PitchShifter::new(SR, PitchShifterConfig::default()).unwrap();
        let input = sine(220.0, 24000);
        let output = shifter.shift(&input, 0.0).unwrap();
        assert_eq!(output.len(), input.len());
        let err = rms_diff(&input, &output);
        assert!(err < 1e-3, "rms error {}", err);
    }

    #[test]
    fn test_duration_preserved() {
        let mut shifter = PitchShifter::new(SR, PitchShifterConfig::default()).unwrap();
        for semitones in [-12.0, -5.0, 3.0, 7.0, 12.0] {
            let input = sine(330.0, 10_007);
            let output = shifter.shift(&input, semitones).unwrap();
            assert_eq!(output.len(), input.len());
        }
    }

    #[test]
    fn test_octave_up_doubles_frequency() {
        let mut shifter = PitchShifter::new(SR, PitchShifterConfig::default()).unwrap();
        let output = shifter.shift(&sine(220.0, 24000), 12.0).unwrap();
        let freq = dominant_frequency(&output[4000..20000], SR).unwrap();
        assert!((freq - 440.0).abs() < 15.0, "freq = {}", freq);
    }

    #[test]
    fn test_octave_down_halves_frequency() {
        let mut shifter = PitchShifter::new(SR, PitchShifterConfig::default()).unwrap();
        let output = shifter.shift(&sine(440.0, 24000), -12.0).unwrap();
        let freq = dominant_frequency(&output[4000..20000], SR).unwrap();
        assert!((freq - 220.0).abs() < 15.0, "freq = {}", freq);
    }

    #[test]
    fn test_formant_mode_still_moves_pitch() {
        let config = PitchShifterConfig {
            preserve_formants: true,
            ..Default::default()
        };
        let mut shifter = PitchShifter::new(SR, config).unwrap();
        let output = shifter.shift(&sine(220.0, 24000), 7.0).unwrap();
        assert_eq!(output.len(), 24000);
        assert!(output.iter().all(|s| s.is_finite()));
        let freq = dominant_frequency(&output[4000..20000], SR).unwrap();
        assert!((freq - 329.6).abs() < 20.0, "freq = {}", freq);
    }

    #[test]
    fn test_formant_envelope_stays_in_place() {
        // 100 Hz harmonics under a resonance at 1.5 kHz
        let parts: Vec<(f32, f32)> = (1..=60)
            .map(|h| {
                let f = 100.0 * h as f32;
                let d = (f - 1500.0) / 400.0;
                (f, 0.1 * (-0.5 * d * d).exp())
            })
            .collect();
        let input = tones(&parts, 24000);
        let source = spectral_centroid(&input[4000..20000], 100.0, 4500.0);
        assert!((source - 1500.0).abs() < 100.0, "source = {}", source);

        let moved = shifter_with(false, false).shift(&input, 7.0).unwrap();
        let kept = shifter_with(true, false).shift(&input, 7.0).unwrap();
        let moved = spectral_centroid(&moved[4000..20000], 100.0, 4500.0);
        let kept = spectral_centroid(&kept[4000..20000], 100.0, 4500.0);

        // Without preservation the resonance moves with the harmonics (x1.498)
        assert!((moved - 2247.0).abs() < 250.0, "moved = {}", moved);
        assert!((kept - 1500.0).abs() < 250.0, "kept = {}", kept);
    }

    #[test]
    fn test_pre_filter_damps_content_shifted_toward_nyquist() {
        // 11 kHz lands at 22 kHz after an octave up; 1 kHz lands at 2 kHz
        let input = tones(&[(1000.0, 0.25), (11000.0, 0.25)], 24000);
        let plain = shifter_with(false, false).shift(&input, 12.0).unwrap();
        let filtered = shifter_with(false, true).shift(&input, 12.0).unwrap();

        let high_plain = band_energy(&plain[4000..20000], 16000.0, 24000.0);
        let high_filtered = band_energy(&filtered[4000..20000], 16000.0, 24000.0);
        let low_plain = band_energy(&plain[4000..20000], 0.0, 8000.0);
        let low_filtered = band_energy(&filtered[4000..20000], 0.0, 8000.0);

        assert!(high_plain > 0.0);
        assert!(high_filtered < 0.8 * high_plain, "{} vs {}", high_filtered, high_plain);
        assert!(low_filtered > 0.95 * low_plain, "{} vs {}", low_filtered, low_plain);
    }

    #[test]
    fn test_post_filter_damps_top_of_lowered_band() {
        // After an octave down the band ends at 12 kHz and the filter sits at 6 kHz
        let input = tones(&[(1000.0, 0.25), (16000.0, 0.25)], 24000);
        let plain = shifter_with(false, false).shift(&input, -12.0).unwrap();
        let filtered = shifter_with(false, true).shift(&input, -12.0).unwrap();

        let high_plain = band_energy(&plain[4000..20000], 6000.0, 12000.0);
        let high_filtered = band_energy(&filtered[4000..20000], 6000.0, 12000.0);
        let low_plain = band_energy(&plain[4000..20000], 0.0, 2000.0);
        let low_filtered = band_energy(&filtered[4000..20000], 0.0, 2000.0);

        assert!(high_plain > 0.0);
        assert!(high_filtered < 0.6 * high_plain, "{} vs {}", high_filtered, high_plain);
        assert!(low_filtered > 0.95 * low_plain, "{} vs {}", low_filtered, low_plain);
    }

    #[test]
    fn test_state_reset_between_calls() {
        let mut shifter = PitchShifter::new(SR, PitchShifterConfig::default()).unwrap();
        let input = sine(300.0, 8192);
        let first = shifter.shift(&input, 4.0).unwrap();
        let second = shifter.shift(&input, 4.0).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rejects_invalid_input() {
        let mut shifter = PitchShifter::new(SR, PitchShifterConfig::default()).unwrap();
        assert_eq!(
            shifter.shift(&[0.0, f32::NAN], 1.0).unwrap_err(),
            DspError::NonFiniteInput
        );
        assert!(shifter.shift_by_ratio(&[0.0], 0.0).is_err());
        assert!(shifter.shift(&[], 3.0).unwrap().is_empty());
        assert!(PitchShifter::new(0, PitchShifterConfig::default()).is_err());
    }

    #[test]
    fn test_wrap_phase_range() {
        assert!(wrap_phase(0.0).abs() < 1e-6);
        assert!((wrap_phase(PI + 0.1) - (-PI + 0.1)).abs() < 1e-5);
        assert!((wrap_phase(-PI - 0.1) - (PI - 0.1)).abs() < 1e-5);
        assert!((wrap_phase(5.0 * TWO_PI + 0.3) - 0.3).abs() < 1e-4);
    }
}
