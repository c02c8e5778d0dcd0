//! Error types for the editing pipeline

use thiserror::Error;
use vox_analysis::AnalysisError;
use vox_dsp::DspError;

/// Structured failures from spline fitting
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SplineError {
    #[error("Need at least 2 points to fit a spline, got {0}")]
    TooFewPoints(usize),
    #[error("Knot times must be strictly increasing (index {index})")]
    NonIncreasingTimes { index: usize },
    #[error("Knot arrays differ in length: {times} times, {values} values")]
    LengthMismatch { times: usize, values: usize },
    #[error("Knot {index} is not finite")]
    NonFinite { index: usize },
}

/// Errors that can occur while loading or parsing configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

/// Errors that can occur while running the editing pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Processing error: {0}")]
    Dsp(#[from] DspError),
    #[error("Framing error: {0}")]
    Analysis(#[from] AnalysisError),
    #[error("Invalid duration ratio: {0}")]
    InvalidDuration(f32),
}
