//! Overlap-add synthesis of edited frames into one flat buffer

use std::sync::Arc;

use vox_analysis::Frame;
use vox_dsp::{overlap_add, BufferPool};

/// Places frames by their duration ratios and overlap-adds them.
///
/// Frame `i` starts at `round(sum(base_hop * duration_ratio[j]) for j < i)`,
/// so duration changes come purely from spacing; the frames themselves are
/// never resampled. Ratios that are not finite and positive count as 1.0.
#[derive(Debug, Clone, Default)]
pub struct FrameReconstructor {
    pool: Option<Arc<BufferPool>>,
}

impl FrameReconstructor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Output start position of every frame
    pub fn positions(frames: &[Frame], base_hop: usize) -> Vec<usize> {
        let mut cursor = 0.0f64;
        frames
            .iter()
            .map(|frame| {
                let position = cursor.round() as usize;
                let ratio = if frame.duration_ratio.is_finite() && frame.duration_ratio > 0.0 {
                    frame.duration_ratio as f64
                } else {
                    1.0
                };
                cursor += base_hop as f64 * ratio;
                position
            })
            .collect()
    }

    /// Synthesize the flat buffer
    pub fn reconstruct(&self, frames: &[Frame], base_hop: usize) -> Vec<f32> {
        if frames.is_empty() {
            return Vec::new();
        }
        let positions = Self::positions(frames, base_hop);
        let output = overlap_add(frames, &positions, self.pool.as_deref());
        tracing::debug!(frames = frames.len(), samples = output.len(), base_hop, "reconstructed buffer");
        output
    }
}
