//! Frame processors: strategy-neutral pitch processing over frame sequences

use std::fmt;
use std::sync::Arc;

use vox_analysis::Frame;

use crate::error::{DspError, DspResult};
use crate::ola::overlap_add;
use crate::pool::BufferPool;
use crate::psola::{PsolaConfig, PsolaProcessor};
use crate::variable::{VariablePitchConfig, VariablePitchProcessor};
use crate::vocoder::{PitchShifter, PitchShifterConfig};
use crate::wsola::{WsolaConfig, WsolaShifter};

/// Pitch processing strategy - selects which engine a pipeline uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessorKind {
    /// Windowed phase vocoder (cleanest on sustained tones)
    #[default]
    PhaseVocoder,
    /// Pitch-synchronous overlap-add (voice, per-period pitch)
    Psola,
    /// Waveform-similarity overlap-add plus resampling
    Wsola,
}

impl ProcessorKind {
    /// Every strategy, in declaration order
    pub const ALL: [ProcessorKind; 3] = [Self::PhaseVocoder, Self::Psola, Self::Wsola];

    /// Stable lowercase name, used in config files
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PhaseVocoder => "phase_vocoder",
            Self::Psola => "psola",
            Self::Wsola => "wsola",
        }
    }

    /// Parse a name produced by [`as_str`](Self::as_str)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "phase_vocoder" | "vocoder" => Some(Self::PhaseVocoder),
            "psola" => Some(Self::Psola),
            "wsola" => Some(Self::Wsola),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for pitch processors working on frame sequences
pub trait FrameProcessor: Send {
    /// Get processor name
    fn name(&self) -> &'static str;

    /// Apply each frame's `pitch_shift`, returning frames with the same count,
    /// lengths and timing
    fn process(&mut self, frames: &[Frame], sample_rate: u32) -> DspResult<Vec<Frame>>;

    /// Pitch can change from one frame to the next
    fn supports_variable_pitch(&self) -> bool;

    /// Frame durations are changed by the processor itself
    fn supports_variable_duration(&self) -> bool;
}

/// Settings for every strategy, so a pipeline can switch between them
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProcessorSettings {
    pub pitch_shifter: PitchShifterConfig,
    pub variable: VariablePitchConfig,
    pub psola: PsolaConfig,
    pub wsola: WsolaConfig,
}

/// Build the processor for `kind`
pub fn create_processor(
    kind: ProcessorKind,
    sample_rate: u32,
    settings: &ProcessorSettings,
    pool: Option<Arc<BufferPool>>,
) -> DspResult<Box<dyn FrameProcessor>> {
    let processor: Box<dyn FrameProcessor> = match kind {
        ProcessorKind::PhaseVocoder => {
            let mut shifter = PitchShifter::new(sample_rate, settings.pitch_shifter)?;
            let mut variable_pool = None;
            if let Some(pool) = pool {
                shifter = shifter.with_pool(Arc::clone(&pool));
                variable_pool = Some(pool);
            }
            let mut processor = VariablePitchProcessor::new(shifter, settings.variable)?;
            if let Some(pool) = variable_pool {
                processor = processor.with_pool(pool);
            }
            Box::new(processor)
        }
        ProcessorKind::Psola => {
            let mut processor = PsolaProcessor::new(sample_rate, settings.psola)?;
            if let Some(pool) = pool {
                processor = processor.with_pool(pool);
            }
            Box::new(processor)
        }
        ProcessorKind::Wsola => {
            let shifter = WsolaShifter::new(sample_rate, settings.wsola)?;
            let mut processor = VariablePitchProcessor::new(shifter, settings.variable)?;
            if let Some(pool) = pool {
                processor = processor.with_pool(pool);
            }
            Box::new(processor)
        }
    };

    tracing::debug!(processor = processor.name(), sample_rate, "created frame processor");
    Ok(processor)
}

/// Sample offset of each frame from the first frame's start
fn frame_offsets(frames: &[Frame], sample_rate: u32) -> Vec<usize> {
    let origin = frames.first().map(|f| f.time).unwrap_or(0.0);
    frames
        .iter()
        .map(|f| ((f.time - origin) * sample_rate as f64).round().max(0.0) as usize)
        .collect()
}

/// Turn a frame sequence back into one continuous signal.
///
/// Frames are overlap-added at their own start times (relative to the
/// first frame), which for preprocessor output is the original hop. All
/// frames must have the same length.
pub fn flatten_frames(frames: &[Frame], sample_rate: u32, pool: Option<&BufferPool>) -> DspResult<Vec<f32>> {
    if sample_rate == 0 {
        return Err(DspError::InvalidSampleRate(sample_rate));
    }
    let Some(first) = frames.first() else {
        return Ok(Vec::new());
    };
    if let Some(bad) = frames.iter().find(|f| f.len() != first.len()) {
        return Err(DspError::RaggedFrames {
            expected: first.len(),
            found: bad.len(),
        });
    }

    let offsets = frame_offsets(frames, sample_rate);
    Ok(overlap_add(frames, &offsets, pool))
}

/// Cut `signal` back into frames shaped like `template`.
///
/// Each output frame keeps its template's time and metadata and takes the
/// samples at the same offset; anything past the end of `signal` is zero.
pub fn reslice_frames(template: &[Frame], signal: &[f32], sample_rate: u32) -> Vec<Frame> {
    let offsets = frame_offsets(template, sample_rate);
    template
        .iter()
        .zip(offsets)
        .map(|(frame, start)| {
            let mut samples = vec![0.0; frame.len()];
            if start < signal.len() {
                let end = (start + frame.len()).min(signal.len());
                samples[..end - start].copy_from_slice(&signal[start..end]);
            }
            Frame {
                samples,
                ..frame.clone()
            }
        })
        .collect()
}
