//! Spectral peak estimation

use crate::fft::Fft;
use crate::window::hann_window;

/// Hann-windowed magnitude spectrum (positive frequencies, `n/2 + 1` bins).
///
/// The block is zero-padded to the next power of two.
pub fn magnitude_spectrum(samples: &[f32]) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }
    let n = samples.len().next_power_of_two().max(2);
    let window = hann_window(samples.len());
    let windowed: Vec<f32> = samples
        .iter()
        .zip(window.iter())
        .map(|(&s, &w)| s * w)
        .collect();

    let mut fft = Fft::new(n);
    let spectrum = fft.forward(&windowed);
    spectrum[..=n / 2].iter().map(|c| c.norm()).collect()
}

/// Frequency in Hz of the strongest spectral peak, refined by parabolic interpolation.
///
/// Returns `None` for empty or silent input.
pub fn dominant_frequency(samples: &[f32], sample_rate: u32) -> Option<f32> {
    let mags = magnitude_spectrum(samples);
    if mags.len() < 3 {
        return None;
    }
    let n = (mags.len() - 1) * 2;

    let (peak, &peak_mag) = mags[1..mags.len() - 1]
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, m)| (i + 1, m))?;
    if peak_mag <= 1e-9 {
        return None;
    }

    let left = mags[peak - 1];
    let right = mags[peak + 1];
    let denom = left - 2.0 * peak_mag + right;
    let offset = if denom.abs() > 1e-12 {
        (0.5 * (left - right) / denom).clamp(-0.5, 0.5)
    } else {
        0.0
    };

    Some((peak as f32 + offset) * sample_rate as f32 / n as f32)
}
