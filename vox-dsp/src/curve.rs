//! Time-varying pitch shift curve

use vox_analysis::Frame;

/// Piecewise-linear `(seconds, semitones)` curve.
///
/// Points are kept sorted by time. Lookups outside the covered range clamp
/// to the nearest end value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PitchCurve {
    points: Vec<(f64, f32)>,
}

impl PitchCurve {
    /// Build a curve from unordered points
    pub fn new(mut points: Vec<(f64, f32)>) -> Self {
        points.retain(|(t, s)| t.is_finite() && s.is_finite());
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { points }
    }

    /// A curve with one value everywhere
    pub fn constant(semitones: f32) -> Self {
        Self {
            points: vec![(0.0, semitones)],
        }
    }

    /// One point per frame, keyed by frame start time.
    ///
    /// Start times are the times the spline evaluates and snaps edits at, so
    /// an edit at `t` reads back as its own value at `t`.
    pub fn from_frames(frames: &[Frame]) -> Self {
        Self::new(frames.iter().map(|f| (f.time, f.pitch_shift)).collect())
    }

    #[inline]
    pub fn points(&self) -> &[(f64, f32)] {
        &self.points
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Semitone value at `time`, linearly interpolated
    pub fn semitones_at(&self, time: f64) -> f32 {
        let points = &self.points;
        match points.len() {
            0 => return 0.0,
            1 => return points[0].1,
            _ => {}
        }
        if time <= points[0].0 {
            return points[0].1;
        }
        let last = points[points.len() - 1];
        if time >= last.0 {
            return last.1;
        }

        // First point strictly after `time`
        let upper = points.partition_point(|p| p.0 <= time);
        let (t0, s0) = points[upper - 1];
        let (t1, s1) = points[upper];
        let span = t1 - t0;
        if span <= 0.0 {
            return s1;
        }
        let frac = ((time - t0) / span) as f32;
        s0 + (s1 - s0) * frac
    }

    /// Frequency ratio at `time`
    #[inline]
    pub fn ratio_at(&self, time: f64) -> f32 {
        2.0f32.powf(self.semitones_at(time) / 12.0)
    }

    /// The same curve moved by `offset` seconds
    pub fn shifted(mut self, offset: f64) -> Self {
        for point in &mut self.points {
            point.0 += offset;
        }
        self
    }

    /// True when every point is within `tolerance` semitones of zero
    pub fn is_flat(&self, tolerance: f32) -> bool {
        self.points.iter().all(|(_, s)| s.abs() <= tolerance)
    }
}
