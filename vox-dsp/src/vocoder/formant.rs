//! Spectral envelope estimation for formant preservation.
//!
//! The envelope is a centered moving average of the magnitude spectrum.
//! This is a coarse estimator: it smears narrow formants and leaves some
//! harmonic ripple when the smoothing width is smaller than the harmonic
//! spacing. Cepstral or LPC envelopes would track formants more closely.

/// Default moving-average width in bins
pub const DEFAULT_SMOOTHING_BINS: usize = 11;

/// Floor applied to envelope values before dividing by them
const ENVELOPE_FLOOR: f32 = 1e-9;

/// Moving-average spectral envelope of `magnitudes` using an odd window of `width` bins.
///
/// Bins near the edges average over the part of the window that exists.
pub fn spectral_envelope(magnitudes: &[f32], width: usize) -> Vec<f32> {
    let n = magnitudes.len();
    if n == 0 {
        return Vec::new();
    }
    let half = width.max(1) / 2;

    // Prefix sums make each window O(1)
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0f64);
    for &m in magnitudes {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + m as f64);
    }

    (0..n)
        .map(|k| {
            let lo = k.saturating_sub(half);
            let hi = (k + half + 1).min(n);
            ((prefix[hi] - prefix[lo]) / (hi - lo) as f64) as f32
        })
        .collect()
}

/// Sample `values` at fractional index `pos` by linear interpolation.
///
/// Positions outside `[0, len - 1]` yield `None`.
pub fn sample_linear(values: &[f32], pos: f32) -> Option<f32> {
    if values.is_empty() || pos < 0.0 || pos > (values.len() - 1) as f32 {
        return None;
    }
    let i0 = pos.floor() as usize;
    let frac = pos - i0 as f32;
    if i0 + 1 >= values.len() {
        return Some(values[i0]);
    }
    Some(values[i0] + (values[i0 + 1] - values[i0]) * frac)
}

/// Gain per output bin that restores the original envelope after bins were
/// remapped by `pitch_ratio` (output bin `k` reads source bin `k / pitch_ratio`).
///
/// `gain[k] = envelope[k] / envelope[k / pitch_ratio]`; the remapped
/// envelope is divided out of the shifted spectrum and the original one is
/// imposed in its place.
pub fn envelope_correction(envelope: &[f32], pitch_ratio: f32) -> Vec<f32> {
    (0..envelope.len())
        .map(|k| {
            let src = k as f32 / pitch_ratio;
            match sample_linear(envelope, src) {
                Some(shifted) if shifted > ENVELOPE_FLOOR => envelope[k] / shifted,
                _ => 0.0,
            }
        })
        .collect()
}
