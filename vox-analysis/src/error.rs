//! Error types for analysis

use thiserror::Error;

/// Errors raised while building analysis data
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Channel count must be at least 1")]
    NoChannels,
    #[error("Buffer length {len} is not a multiple of {channels} channels")]
    RaggedBuffer { len: usize, channels: u16 },
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),
    #[error("Invalid framing: frame size {frame_size}, hop size {hop_size}")]
    InvalidFraming { frame_size: usize, hop_size: usize },
}
