//! Audio analysis module for VOX
//!
//! Provides the FFT primitive, the audio/frame data model, framing,
//! pitch-period detection and spectral peak estimation.

mod buffer;
mod error;
mod fft;
mod frame;
mod period;
mod spectrum;
mod window;

pub use buffer::AudioBuffer;
pub use error::AnalysisError;
pub use fft::{Complex, Fft};
pub use frame::{Frame, FramePreprocessor};
pub use period::{PeriodDetector, PitchMark, MAX_VOICE_HZ, MIN_VOICE_HZ};
pub use spectrum::{dominant_frequency, magnitude_spectrum};
pub use window::hann_window;
