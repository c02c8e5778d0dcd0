//! Error types for signal processing

use thiserror::Error;

/// Errors raised by processors and their constructors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DspError {
    #[error("FFT size must be a power of two >= 16, got {0}")]
    InvalidFftSize(usize),
    #[error("Hop size {hop_size} must be between 1 and the FFT size {fft_size}")]
    InvalidHopSize { hop_size: usize, fft_size: usize },
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),
    #[error("Invalid parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f32 },
    #[error("Input contains NaN or infinite samples")]
    NonFiniteInput,
    #[error("Frames have inconsistent lengths: expected {expected}, found {found}")]
    RaggedFrames { expected: usize, found: usize },
}

/// Result alias for processing operations
pub type DspResult<T> = Result<T, DspError>;

/// Rejects signals containing NaN/Inf
pub(crate) fn ensure_finite(signal: &[f32]) -> DspResult<()> {
    if signal.iter().all(|s| s.is_finite()) {
        Ok(())
    } else {
        Err(DspError::NonFiniteInput)
    }
}
