//! Short-Time Fourier Transform analysis and overlap-add synthesis.
//!
//! Analysis slides a Hann window across the signal at a fixed hop and keeps
//! the full FFT-sized spectrum of every frame. Synthesis inverts each
//! spectrum, applies the same window again, places it at
//! `frame_index * hop` and finally divides by the accumulated window
//! energy, which makes `synthesize(analyze(x))` reproduce `x` wherever at
//! least one frame covers a sample.

use std::sync::Arc;

use vox_analysis::{hann_window, Complex, Fft};

use crate::error::{DspError, DspResult};
use crate::pool::BufferPool;

/// One analysis frame: `fft_size` complex bins
pub type Spectrum = Vec<Complex<f32>>;

/// Window energy below which a sample is left unnormalized
const WINDOW_SUM_FLOOR: f32 = 1e-6;

/// STFT/ISTFT engine with a fixed FFT size and analysis hop
pub struct PhaseVocoder {
    fft_size: usize,
    hop_size: usize,
    window: Vec<f32>,
    fft: Fft,
    /// Working buffer for FFT (avoid per-frame allocation)
    work: Vec<Complex<f32>>,
    pool: Option<Arc<BufferPool>>,
}

impl PhaseVocoder {
    /// Create a vocoder. `fft_size` must be a power of two of at least 16
    /// and `hop_size` must lie in `1..=fft_size`.
    pub fn new(fft_size: usize, hop_size: usize) -> DspResult<Self> {
        if fft_size < 16 || !fft_size.is_power_of_two() {
            return Err(DspError::InvalidFftSize(fft_size));
        }
        if hop_size == 0 || hop_size > fft_size {
            return Err(DspError::InvalidHopSize { hop_size, fft_size });
        }

        Ok(Self {
            fft_size,
            hop_size,
            window: hann_window(fft_size),
            fft: Fft::new(fft_size),
            work: vec![Complex::new(0.0, 0.0); fft_size],
            pool: None,
        })
    }

    /// Draw window-sum scratch buffers from a shared pool
    pub fn with_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    #[inline]
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    #[inline]
    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Number of non-negative frequency bins (fft_size/2 + 1)
    #[inline]
    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    #[inline]
    pub fn window(&self) -> &[f32] {
        &self.window
    }

    /// Number of whole frames that fit in `len` samples
    pub fn frame_count(&self, len: usize) -> usize {
        if len < self.fft_size {
            0
        } else {
            (len - self.fft_size) / self.hop_size + 1
        }
    }

    /// Windowed FFT of every full frame. Trailing samples that do not fill a
    /// whole window are not analyzed.
    pub fn analyze(&mut self, signal: &[f32]) -> Vec<Spectrum> {
        let count = self.frame_count(signal.len());
        let mut spectra = Vec::with_capacity(count);

        for frame in 0..count {
            let start = frame * self.hop_size;
            let chunk = &signal[start..start + self.fft_size];
            for ((slot, &s), &w) in self.work.iter_mut().zip(chunk).zip(&self.window) {
                *slot = Complex::new(s * w, 0.0);
            }
            self.fft.forward_in_place(&mut self.work);
            spectra.push(self.work.clone());
        }

        spectra
    }

    /// Overlap-add synthesis at the analysis hop
    pub fn synthesize(&mut self, spectra: &[Spectrum], output_len: usize) -> Vec<f32> {
        self.synthesize_with_hop(spectra, self.hop_size, output_len)
    }

    /// Overlap-add synthesis placing frame `i` at `i * hop`.
    ///
    /// A synthesis hop different from the analysis hop changes the duration.
    pub fn synthesize_with_hop(&mut self, spectra: &[Spectrum], hop: usize, output_len: usize) -> Vec<f32> {
        let hop = hop.max(1);
        let mut output = vec![0.0f32; output_len];
        let mut window_sum = match &self.pool {
            Some(pool) => pool.acquire(output_len),
            None => vec![0.0f32; output_len],
        };

        for (frame, spectrum) in spectra.iter().enumerate() {
            let start = frame * hop;
            if start >= output_len {
                break;
            }

            let n = spectrum.len().min(self.fft_size);
            self.work[..n].copy_from_slice(&spectrum[..n]);
            self.work[n..].fill(Complex::new(0.0, 0.0));
            self.fft.inverse_in_place(&mut self.work);

            let end = (start + self.fft_size).min(output_len);
            for (i, pos) in (start..end).enumerate() {
                let w = self.window[i];
                output[pos] += self.work[i].re * w;
                // The analysis window was applied too, so the frame carries w^2
                window_sum[pos] += w * w;
            }
        }

        for (out, &sum) in output.iter_mut().zip(window_sum.iter()) {
            if sum > WINDOW_SUM_FLOOR {
                *out /= sum;
            }
        }

        if let Some(pool) = &self.pool {
            pool.release(window_sum);
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, sr: f32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / sr).sin() * 0.5)
            .collect()
    }

    #[test]
    fn test_rejects_bad_sizes() {
        assert_eq!(
            PhaseVocoder::new(1000, 250).err(),
            Some(DspError::InvalidFftSize(1000))
        );
        assert!(PhaseVocoder::new(1024, 0).is_err());
        assert!(PhaseVocoder::new(1024, 2048).is_err());
    }

    #[test]
    fn test_partial_frames_are_dropped() {
        let mut pv = PhaseVocoder::new(256, 64).unwrap();
        let spectra = pv.analyze(&vec![0.0; 256 + 64 + 10]);
        assert_eq!(spectra.len(), 2);
        assert!(spectra.iter().all(|s| s.len() == 256));
        assert!(pv.analyze(&vec![0.0; 100]).is_empty());
    }

    #[test]
    fn test_roundtrip_reconstructs_covered_region() {
        let mut pv = PhaseVocoder::new(512, 128).unwrap();
        let input = sine(440.0, 48000.0, 4096);
        let spectra = pv.analyze(&input);
        let output = pv.synthesize(&spectra, input.len());

        // Fully overlapped interior
        for i in 512..3584 {
            assert!(
                (output[i] - input[i]).abs() < 1e-4,
                "sample {}: {} vs {}",
                i,
                output[i],
                input[i]
            );
        }
    }

    #[test]
    fn test_roundtrip_at_arbitrary_hop() {
        let mut pv = PhaseVocoder::new(256, 100).unwrap();
        let input = sine(1000.0, 48000.0, 2048);
        let spectra = pv.analyze(&input);
        let output = pv.synthesize(&spectra, input.len());
        for i in 256..1700 {
            assert!((output[i] - input[i]).abs() < 1e-4);
        }
    }

    #[test]
    fn test_synthesis_hop_scales_duration() {
        let mut pv = PhaseVocoder::new(256, 64).unwrap();
        let spectra = pv.analyze(&sine(440.0, 48000.0, 2048));
        let frames = spectra.len();
        let len = (frames - 1) * 128 + 256;
        let output = pv.synthesize_with_hop(&spectra, 128, len);
        assert_eq!(output.len(), len);
        assert!(output[len / 2].abs() > 0.0);
    }

    #[test]
    fn test_pooled_synthesis_returns_scratch() {
        let pool = Arc::new(BufferPool::new(2));
        let mut pv = PhaseVocoder::new(128, 32).unwrap().with_pool(Arc::clone(&pool));
        let input = sine(440.0, 48000.0, 1024);
        let spectra = pv.analyze(&input);
        let _ = pv.synthesize(&spectra, input.len());
        assert_eq!(pool.available(), 1);
    }
}
