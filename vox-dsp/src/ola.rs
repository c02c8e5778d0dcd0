//! Weighted overlap-add of frame sequences

use vox_analysis::{hann_window, Frame};

use crate::pool::BufferPool;

/// Accumulated weight at or below which a sample takes its unweighted value
pub const WEIGHT_FLOOR: f32 = 1e-6;

/// Divide `output` by `weight` in place.
///
/// Samples whose accumulated weight is at or below [`WEIGHT_FLOOR`] take the
/// unweighted sample recorded in `fallback` instead.
pub(crate) fn normalize(output: &mut [f32], weight: &[f32], fallback: &[f32]) {
    for ((o, &w), &raw) in output.iter_mut().zip(weight).zip(fallback) {
        if w > WEIGHT_FLOOR {
            *o /= w;
        } else {
            *o = raw;
        }
    }
}

/// Overlap-add frames at the given sample positions.
///
/// Each frame is Hann-weighted and the sum is divided by the accumulated
/// weight, so a constant signal framed at any overlap comes back constant.
/// Where only window zeros cover a sample (the first sample of the first
/// frame), the raw frame sample is kept. The output ends where the
/// last-reaching frame ends. `positions` must have one entry per frame.
pub fn overlap_add(frames: &[Frame], positions: &[usize], pool: Option<&BufferPool>) -> Vec<f32> {
    debug_assert_eq!(frames.len(), positions.len());

    let output_len = frames
        .iter()
        .zip(positions)
        .map(|(f, &p)| p + f.len())
        .max()
        .unwrap_or(0);
    if output_len == 0 {
        return Vec::new();
    }

    let (mut output, mut weight, mut fallback) = match pool {
        Some(pool) => (
            pool.acquire(output_len),
            pool.acquire(output_len),
            pool.acquire(output_len),
        ),
        None => (vec![0.0; output_len], vec![0.0; output_len], vec![0.0; output_len]),
    };

    // Frames usually share one length; rebuild the window only when it changes
    let mut window: Vec<f32> = Vec::new();
    for (frame, &position) in frames.iter().zip(positions) {
        if window.len() != frame.len() {
            window = hann_window(frame.len());
        }
        let span = position..position + frame.len();
        let out = &mut output[span.clone()];
        let acc = &mut weight[span.clone()];
        let raw = &mut fallback[span];
        for ((((o, a), r), &s), &w) in out
            .iter_mut()
            .zip(acc.iter_mut())
            .zip(raw.iter_mut())
            .zip(&frame.samples)
            .zip(&window)
        {
            *o += s * w;
            *a += w;
            if w <= WEIGHT_FLOOR {
                *r = s;
            }
        }
    }

    normalize(&mut output, &weight, &fallback);

    if let Some(pool) = pool {
        pool.release(weight);
        pool.release(fallback);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_frames_sum_to_constant() {
        let frames: Vec<Frame> = (0..6).map(|i| Frame::new(i as f64, vec![1.0; 64])).collect();
        let positions: Vec<usize> = (0..6).map(|i| i * 16).collect();
        let out = overlap_add(&frames, &positions, None);
        assert_eq!(out.len(), 5 * 16 + 64);
        for &s in &out {
            assert!((s - 1.0).abs() < 1e-5, "sample = {}", s);
        }
    }

    #[test]
    fn test_pool_buffers_are_returned() {
        let pool = BufferPool::new(4);
        let frames = vec![Frame::new(0.0, vec![0.5; 32]), Frame::new(0.1, vec![0.5; 32])];
        let out = overlap_add(&frames, &[0, 16], Some(&pool));
        assert_eq!(out.len(), 48);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn test_zero_weight_samples_keep_raw_value() {
        // Back-to-back frames: each window zero is covered by nothing else
        let frames = vec![
            Frame::new(0.0, vec![0.25, 0.5, 0.75, 1.0]),
            Frame::new(0.1, vec![-0.5, -0.25, 0.0, 0.25]),
        ];
        let out = overlap_add(&frames, &[0, 4], None);
        let expected = [0.25, 0.5, 0.75, 1.0, -0.5, -0.25, 0.0, 0.25];
        for (o, e) in out.iter().zip(expected) {
            assert!((o - e).abs() < 1e-6, "{} != {}", o, e);
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(overlap_add(&[], &[], None).is_empty());
    }
}
