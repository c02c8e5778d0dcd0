//! Signal processing for VOX - pitch shifting and frame processors
//!
//! This crate provides the pitch engines used by the edit pipeline:
//! - Vocoder: STFT phase vocoder and the duration-preserving pitch shifter
//! - Variable: windowed application of a time-varying pitch curve
//! - PSOLA: pitch-synchronous overlap-add with per-period pitch changes
//! - WSOLA: waveform-similarity time stretching and a resampling pitch shifter
//! - Processor: the strategy-neutral frame processor interface
//! - Pool: shared scratch buffers

mod curve;
mod error;
mod filter;
mod ola;
mod pool;
mod processor;
mod psola;
mod variable;
mod wsola;
pub mod vocoder;

pub use curve::PitchCurve;
pub use error::{DspError, DspResult};
pub use filter::OnePoleLowPass;
pub use ola::{overlap_add, WEIGHT_FLOOR};
pub use pool::BufferPool;
pub use processor::{
    create_processor, flatten_frames, reslice_frames, FrameProcessor, ProcessorKind, ProcessorSettings,
};
pub use psola::{PsolaConfig, PsolaProcessor};
pub use variable::{SegmentShifter, VariablePitchConfig, VariablePitchProcessor};
pub use vocoder::{PhaseVocoder, PitchShifter, PitchShifterConfig, Spectrum};
pub use wsola::{resample_linear, Wsola, WsolaConfig, WsolaShifter};
