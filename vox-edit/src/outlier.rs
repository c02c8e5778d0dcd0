//! Gradient-based outlier correction.
//!
//! A value is suspicious when it differs from some neighbour within
//! `window_size` positions by more than `gradient_threshold` semitones.
//! Because a spike also makes its neighbours look suspicious, a candidate
//! is only replaced when it also sits more than the threshold away from its
//! neighbourhood average and deviates more than any nearby candidate; the
//! replacement is the inverse-distance-weighted mean of its
//! `±window_size` neighbours. Passes repeat until one finds nothing, up to
//! `max_iterations`, so runs of consecutive spikes are worn down one layer
//! at a time. Smooth slides of any size pass untouched as long as each
//! step stays under the threshold.

use vox_analysis::Frame;

use crate::spline::EditPoint;

/// Outlier detection settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierConfig {
    /// Largest allowed difference to any neighbour in the window, in semitones
    pub gradient_threshold: f32,
    /// Neighbours considered on each side; also the untouched margin at both ends
    pub window_size: usize,
    /// Maximum correction passes
    pub max_iterations: usize,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            gradient_threshold: 3.0,
            window_size: 3,
            max_iterations: 5,
        }
    }
}

/// Result of correcting a value sequence
#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    /// Corrected values, same length as the input
    pub values: Vec<f32>,
    /// `true` where a value was replaced in any pass
    pub outliers: Vec<bool>,
    /// Passes that found at least one outlier
    pub passes: usize,
}

impl Correction {
    /// Number of replaced values
    pub fn count(&self) -> usize {
        self.outliers.iter().filter(|&&o| o).count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct OutlierCorrector {
    config: OutlierConfig,
}

impl OutlierCorrector {
    pub fn new(config: OutlierConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &OutlierConfig {
        &self.config
    }

    /// Correct a plain value sequence
    pub fn correct_values(&self, values: &[f32]) -> Correction {
        let mut current = values.to_vec();
        let mut outliers = vec![false; values.len()];
        let w = self.config.window_size;

        // Needs at least one interior value with a full window on each side
        if w == 0 || values.len() < 3 || values.len() < 2 * w + 1 {
            return Correction {
                values: current,
                outliers,
                passes: 0,
            };
        }

        let mut passes = 0;
        for _ in 0..self.config.max_iterations {
            let fixes = self.pass(&current);
            if fixes.is_empty() {
                break;
            }
            passes += 1;
            for (i, value) in fixes {
                current[i] = value;
                outliers[i] = true;
            }
        }

        Correction {
            values: current,
            outliers,
            passes,
        }
    }

    /// One detection pass over `values`; returns `(index, replacement)` pairs
    fn pass(&self, values: &[f32]) -> Vec<(usize, f32)> {
        let w = self.config.window_size;
        let n = values.len();

        // (index, deviation from neighbourhood mean, neighbourhood mean)
        let mut candidates: Vec<(usize, f32, f32)> = Vec::new();
        for i in w..n - w {
            let max_diff = (i - w..=i + w)
                .filter(|&j| j != i)
                .map(|j| (values[i] - values[j]).abs())
                .fold(0.0f32, f32::max);
            if max_diff > self.config.gradient_threshold {
                let mean = weighted_neighbour_mean(values, i, w);
                candidates.push((i, (values[i] - mean).abs(), mean));
            }
        }

        candidates
            .iter()
            .filter(|&&(i, deviation, _)| {
                deviation > self.config.gradient_threshold
                    && candidates
                        .iter()
                        .filter(|&&(j, _, _)| j != i && j.abs_diff(i) <= w)
                        .all(|&(_, other, _)| deviation >= other)
            })
            .map(|&(i, _, mean)| (i, mean))
            .collect()
    }

    /// Correct frame pitch values, flagging replaced frames
    pub fn correct(&self, frames: &[Frame]) -> Vec<Frame> {
        let values: Vec<f32> = frames.iter().map(|f| f.pitch_shift).collect();
        let correction = self.correct_values(&values);
        if correction.count() > 0 {
            tracing::debug!(
                outliers = correction.count(),
                passes = correction.passes,
                "corrected frame outliers"
            );
        }

        frames
            .iter()
            .zip(correction.values.iter().zip(&correction.outliers))
            .map(|(frame, (&value, &outlier))| Frame {
                pitch_shift: value,
                is_outlier: frame.is_outlier || outlier,
                samples: frame.samples.clone(),
                ..*frame
            })
            .collect()
    }

    /// Correct time-sorted edit points in place, flagging replaced points
    pub fn correct_points(&self, points: &mut [EditPoint]) -> usize {
        let values: Vec<f32> = points.iter().map(|p| p.semitones).collect();
        let correction = self.correct_values(&values);
        for (point, (&value, &outlier)) in points
            .iter_mut()
            .zip(correction.values.iter().zip(&correction.outliers))
        {
            point.semitones = value;
            point.is_outlier |= outlier;
        }

        let count = correction.count();
        if count > 0 {
            tracing::debug!(outliers = count, passes = correction.passes, "corrected edit outliers");
        }
        count
    }
}

/// Inverse-distance-weighted mean of the `±window` neighbours of `index`
fn weighted_neighbour_mean(values: &[f32], index: usize, window: usize) -> f32 {
    let mut sum = 0.0f32;
    let mut weight = 0.0f32;
    for d in 1..=window {
        let w = 1.0 / d as f32;
        for j in [index - d, index + d] {
            sum += values[j] * w;
            weight += w;
        }
    }
    sum / weight
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corrector() -> OutlierCorrector {
        OutlierCorrector::new(OutlierConfig::default())
    }

    #[test]
    fn test_single_spike_is_replaced() {
        let mut values = vec![1.0f32; 12];
        values[6] = 9.0;
        let c = corrector().correct_values(&values);
        assert_eq!(c.count(), 1);
        assert!(c.outliers[6]);
        assert!((c.values[6] - 1.0).abs() < 1e-6);
        assert_eq!(c.passes, 1);
    }

    #[test]
    fn test_smooth_glide_untouched() {
        // One octave over 12 steps: 1 semitone per step
        let values: Vec<f32> = (0..13).map(|i| i as f32).collect();
        let c = corrector().correct_values(&values);
        assert_eq!(c.count(), 0);
        assert_eq!(c.values, values);
    }

    #[test]
    fn test_idempotent_after_convergence() {
        let mut values = vec![0.0f32; 20];
        values[7] = 8.0;
        values[8] = 7.5;
        values[14] = -6.0;
        let once = corrector().correct_values(&values);
        let twice = corrector().correct_values(&once.values);
        assert_eq!(twice.count(), 0);
        assert_eq!(twice.values, once.values);
    }

    #[test]
    fn test_short_sequences_unchanged() {
        let values = vec![0.0, 10.0, 0.0];
        let c = corrector().correct_values(&values);
        assert_eq!(c.values, values);
        assert_eq!(c.passes, 0);
        assert!(corrector().correct_values(&[]).values.is_empty());
    }

    #[test]
    fn test_margin_is_never_modified() {
        let mut values = vec![0.0f32; 10];
        values[1] = 10.0;
        let c = corrector().correct_values(&values);
        assert_eq!(c.values[1], 10.0);
        assert!(!c.outliers[1]);
    }

    #[test]
    fn test_frames_keep_timing_and_flag_outliers() {
        let frames: Vec<Frame> = (0..10)
            .map(|i| Frame::new(i as f64 * 0.01, vec![0.0; 4]).with_pitch_shift(if i == 5 { 6.0 } else { 2.0 }))
            .collect();
        let out = corrector().correct(&frames);
        assert_eq!(out.len(), frames.len());
        assert!(out[5].is_outlier);
        assert!((out[5].pitch_shift - 2.0).abs() < 1e-6);
        assert_eq!(out.iter().filter(|f| f.is_outlier).count(), 1);
        assert_eq!(out[3].time, frames[3].time);
    }
}
