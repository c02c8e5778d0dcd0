//! Fixed-size complex FFT built on rustfft plans

use rustfft::{Fft as FftPlan, FftPlanner};
use std::sync::Arc;

pub use rustfft::num_complex::Complex;

/// Forward/inverse FFT over a fixed block size.
///
/// Plans and scratch space are created once at construction. The inverse
/// transform applies the `1/N` normalization, so `inverse(forward(x)) == x`.
pub struct Fft {
    size: usize,
    forward: Arc<dyn FftPlan<f32>>,
    inverse: Arc<dyn FftPlan<f32>>,
    scratch: Vec<Complex<f32>>,
    norm: f32,
}

impl Fft {
    /// Plan transforms for blocks of `size` samples
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        Self {
            size,
            forward,
            inverse,
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            norm: 1.0 / size as f32,
        }
    }

    /// Block size
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Transform real samples. Shorter input is zero-padded, longer input truncated.
    pub fn forward(&mut self, samples: &[f32]) -> Vec<Complex<f32>> {
        let mut buffer = vec![Complex::new(0.0, 0.0); self.size];
        for (slot, &s) in buffer.iter_mut().zip(samples.iter()) {
            slot.re = s;
        }
        self.forward_in_place(&mut buffer);
        buffer
    }

    /// Unnormalized forward transform of a full block, in place
    pub fn forward_in_place(&mut self, buffer: &mut [Complex<f32>]) {
        debug_assert_eq!(buffer.len(), self.size);
        self.forward.process_with_scratch(buffer, &mut self.scratch);
    }

    /// Transform a spectrum back to real samples (real part of the normalized IFFT)
    pub fn inverse(&mut self, spectrum: &[Complex<f32>]) -> Vec<f32> {
        let mut buffer = vec![Complex::new(0.0, 0.0); self.size];
        let n = spectrum.len().min(self.size);
        buffer[..n].copy_from_slice(&spectrum[..n]);
        self.inverse_in_place(&mut buffer);
        buffer.iter().map(|c| c.re).collect()
    }

    /// Normalized inverse transform of a full block, in place
    pub fn inverse_in_place(&mut self, buffer: &mut [Complex<f32>]) {
        debug_assert_eq!(buffer.len(), self.size);
        self.inverse.process_with_scratch(buffer, &mut self.scratch);
        for c in buffer.iter_mut() {
            *c *= self.norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_impulse_has_flat_spectrum() {
        let mut fft = Fft::new(16);
        let spectrum = fft.forward(&[1.0]);
        assert_eq!(spectrum.len(), 16);
        for bin in &spectrum {
            assert!((bin.re - 1.0).abs() < 1e-6);
            assert!(bin.im.abs() < 1e-6);
        }
    }

    #[test]
    fn test_inverse_restores_input() {
        let mut fft = Fft::new(64);
        let input: Vec<f32> = (0..64)
            .map(|i| (2.0 * PI * 5.0 * i as f32 / 64.0).sin() + 0.25)
            .collect();
        let spectrum = fft.forward(&input);
        let output = fft.inverse(&spectrum);
        for (a, b) in input.iter().zip(output.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_sine_peaks_in_expected_bin() {
        let mut fft = Fft::new(128);
        let input: Vec<f32> = (0..128)
            .map(|i| (2.0 * PI * 8.0 * i as f32 / 128.0).cos())
            .collect();
        let spectrum = fft.forward(&input);
        let peak = (0..64)
            .max_by(|&a, &b| spectrum[a].norm().total_cmp(&spectrum[b].norm()))
            .unwrap();
        assert_eq!(peak, 8);
    }

    #[test]
    fn test_long_input_is_truncated() {
        let mut fft = Fft::new(8);
        let spectrum = fft.forward(&[1.0; 32]);
        assert_eq!(spectrum.len(), 8);
        assert!((spectrum[0].re - 8.0).abs() < 1e-5);
    }
}
