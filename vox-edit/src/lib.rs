//! Frame editing pipeline for VOX
//!
//! Turns sparse user edit points into a processed audio buffer:
//! - Outlier: gradient-based spike correction
//! - Spline: natural cubic spline expansion to one value per frame
//! - Reconstruct: overlap-add synthesis with per-frame duration placement
//! - Pipeline: orchestration over a configurable frame processor
//! - Config: persistent engine settings

mod config;
mod error;
mod outlier;
mod pipeline;
mod reconstruct;
mod spline;

pub use config::EngineConfig;
pub use error::{ConfigError, PipelineError, SplineError};
pub use outlier::{Correction, OutlierConfig, OutlierCorrector};
pub use pipeline::{EditPipeline, PipelineOutput};
pub use reconstruct::FrameReconstructor;
pub use spline::{EditPoint, NaturalCubicSpline, SplineConfig, SplineInterpolator};
