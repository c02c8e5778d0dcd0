//! Phase vocoder: STFT analysis/synthesis and the pitch shifter built on it.
//!
//! - [`PhaseVocoder`]: Hann-windowed STFT and overlap-add ISTFT with
//!   window-energy normalization
//! - [`PitchShifter`]: phase-coherent bin remapping with optional formant
//!   preservation and anti-alias filtering
//! - [`formant`]: moving-average spectral envelope helpers

pub mod formant;
mod pitch;
mod stft;

pub use pitch::{PitchShifter, PitchShifterConfig};
pub use stft::{PhaseVocoder, Spectrum};
