//! The editing pipeline: sparse edits to a finished buffer.
//!
//! edits -> sort/merge -> outlier correction -> spline expansion ->
//! frame processor -> overlap-add reconstruction

use std::sync::Arc;

use vox_analysis::{AudioBuffer, Frame, FramePreprocessor};
use vox_dsp::{create_processor, BufferPool, DspError, FrameProcessor};

use crate::config::EngineConfig;
use crate::error::PipelineError;
use crate::outlier::OutlierCorrector;
use crate::reconstruct::FrameReconstructor;
use crate::spline::{EditPoint, SplineInterpolator};

/// A duration change over a time span
#[derive(Debug, Clone, Copy, PartialEq)]
struct DurationSpan {
    start: f64,
    end: f64,
    ratio: f32,
}

/// Frames and samples produced by one pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    /// Processed frames, same count and timing as the input
    pub frames: Vec<Frame>,
    /// Reconstructed buffer
    pub samples: Vec<f32>,
    /// Edit points replaced by outlier correction
    pub outliers: usize,
}

/// One configured pipeline instance.
///
/// Instances share nothing, so independent pipelines can run on separate
/// threads. The buffer pool is owned by the instance and handed to every
/// stage that wants scratch space.
pub struct EditPipeline {
    config: EngineConfig,
    sample_rate: u32,
    corrector: OutlierCorrector,
    interpolator: SplineInterpolator,
    processor: Box<dyn FrameProcessor>,
    reconstructor: FrameReconstructor,
    pool: Arc<BufferPool>,
    durations: Vec<DurationSpan>,
}

impl EditPipeline {
    /// Build a pipeline for `sample_rate` Hz audio
    pub fn new(sample_rate: u32, config: EngineConfig) -> Result<Self, PipelineError> {
        if sample_rate == 0 {
            return Err(DspError::InvalidSampleRate(sample_rate).into());
        }
        let pool = Arc::new(BufferPool::new(config.pool_capacity));
        let processor = create_processor(
            config.strategy,
            sample_rate,
            &config.processor_settings(),
            Some(Arc::clone(&pool)),
        )?;

        tracing::debug!(
            strategy = %config.strategy,
            sample_rate,
            variable_pitch = processor.supports_variable_pitch(),
            "created edit pipeline"
        );

        Ok(Self {
            corrector: OutlierCorrector::new(config.outlier_config()),
            interpolator: SplineInterpolator::new(config.spline_config()),
            reconstructor: FrameReconstructor::new().with_pool(Arc::clone(&pool)),
            processor,
            pool,
            sample_rate,
            config,
            durations: Vec::new(),
        })
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn processor(&self) -> &dyn FrameProcessor {
        self.processor.as_ref()
    }

    #[inline]
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Stretch frames starting in `[start, end)` seconds by `ratio` (2.0 = twice as long).
    ///
    /// Later spans override earlier ones where they overlap.
    pub fn set_duration(&mut self, start: f64, end: f64, ratio: f32) -> Result<(), PipelineError> {
        if !(ratio.is_finite() && ratio > 0.0) {
            return Err(PipelineError::InvalidDuration(ratio));
        }
        if start.is_finite() && end.is_finite() && end > start {
            self.durations.push(DurationSpan { start, end, ratio });
        }
        Ok(())
    }

    /// Remove every duration span
    pub fn clear_durations(&mut self) {
        self.durations.clear();
    }

    /// Turn sparse edits into per-frame pitch and duration values
    pub fn prepare_frames(&self, frames: &[Frame], edits: &[EditPoint]) -> (Vec<Frame>, usize) {
        let interval = Frame::interval(frames).unwrap_or(f64::INFINITY);
        let mut points = self.interpolator.prepare_points(edits, interval);
        let outliers = self.corrector.correct_points(&mut points);

        let mut prepared = self.interpolator.interpolate(frames, &points);
        for frame in &mut prepared {
            if let Some(span) = self
                .durations
                .iter()
                .rev()
                .find(|s| frame.time >= s.start && frame.time < s.end)
            {
                frame.duration_ratio = span.ratio;
            }
        }
        (prepared, outliers)
    }

    /// Apply `edits` to `frames` and reconstruct the result
    pub fn run(&mut self, frames: &[Frame], edits: &[EditPoint]) -> Result<PipelineOutput, PipelineError> {
        if frames.is_empty() {
            return Ok(PipelineOutput::default());
        }

        let (prepared, outliers) = self.prepare_frames(frames, edits);
        let processed = self.processor.process(&prepared, self.sample_rate)?;

        let base_hop = match Frame::interval(frames) {
            Some(interval) => ((interval * self.sample_rate as f64).round() as usize).max(1),
            None => frames[0].len().max(1),
        };
        let samples = self.reconstructor.reconstruct(&processed, base_hop);

        tracing::debug!(
            frames = processed.len(),
            edits = edits.len(),
            outliers,
            samples = samples.len(),
            processor = self.processor.name(),
            "pipeline run complete"
        );

        Ok(PipelineOutput {
            frames: processed,
            samples,
            outliers,
        })
    }

    /// Frame a mono buffer, apply `edits` and return the reconstructed samples.
    ///
    /// When no frame changes duration the result has exactly the input length.
    pub fn run_buffer(&mut self, buffer: &AudioBuffer, edits: &[EditPoint]) -> Result<Vec<f32>, PipelineError> {
        if buffer.sample_rate != self.sample_rate {
            return Err(DspError::InvalidSampleRate(buffer.sample_rate).into());
        }
        if buffer.is_empty() {
            return Ok(Vec::new());
        }

        let preprocessor =
            FramePreprocessor::new(self.config.frame_size, self.config.frame_hop, self.config.vad_threshold)?;
        let frames = preprocessor.process(buffer);
        let output = self.run(&frames, edits)?;

        let mut samples = output.samples;
        if output.frames.iter().all(|f| f.duration_ratio == 1.0) {
            samples.resize(buffer.frames(), 0.0);
        }
        Ok(samples)
    }
}
