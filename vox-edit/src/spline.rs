//! Natural cubic splines and the interpolator that expands sparse edit
//! points into one pitch value per frame

use vox_analysis::Frame;

use crate::error::SplineError;

/// A user-authored key point on the pitch curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditPoint {
    /// Time in seconds
    pub time: f64,
    /// Pitch shift in semitones
    pub semitones: f32,
    /// Value was replaced by outlier correction
    pub is_outlier: bool,
}

impl EditPoint {
    pub fn new(time: f64, semitones: f32) -> Self {
        Self {
            time,
            semitones,
            is_outlier: false,
        }
    }
}

/// Piecewise cubic through `n` knots with zero second derivative at both ends.
///
/// Segment `j` covers `[times[j], times[j + 1]]` and evaluates
/// `a[j] + b[j]*dx + c[j]*dx^2 + d[j]*dx^3` with `dx = t - times[j]`.
#[derive(Debug, Clone, PartialEq)]
pub struct NaturalCubicSpline {
    times: Vec<f64>,
    a: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
    d: Vec<f64>,
}

impl NaturalCubicSpline {
    /// Fit the spline through `(times[i], values[i])`.
    ///
    /// Times must be finite and strictly increasing. The tridiagonal system
    /// for the second-derivative terms is solved with the Thomas algorithm.
    pub fn fit(times: &[f64], values: &[f64]) -> Result<Self, SplineError> {
        if times.len() != values.len() {
            return Err(SplineError::LengthMismatch {
                times: times.len(),
                values: values.len(),
            });
        }
        let n = times.len();
        if n < 2 {
            return Err(SplineError::TooFewPoints(n));
        }
        if let Some(index) = (0..n).find(|&i| !times[i].is_finite() || !values[i].is_finite()) {
            return Err(SplineError::NonFinite { index });
        }

        let mut h = Vec::with_capacity(n - 1);
        for i in 0..n - 1 {
            let step = times[i + 1] - times[i];
            if step <= 0.0 {
                return Err(SplineError::NonIncreasingTimes { index: i + 1 });
            }
            h.push(step);
        }

        let a = values.to_vec();
        let mut alpha = vec![0.0; n];
        for i in 1..n - 1 {
            alpha[i] = 3.0 / h[i] * (a[i + 1] - a[i]) - 3.0 / h[i - 1] * (a[i] - a[i - 1]);
        }

        // Forward sweep; l[0] = l[n-1] = 1 and z = 0 at both ends give c = 0 there
        let mut l = vec![1.0; n];
        let mut mu = vec![0.0; n];
        let mut z = vec![0.0; n];
        for i in 1..n - 1 {
            l[i] = 2.0 * (times[i + 1] - times[i - 1]) - h[i - 1] * mu[i - 1];
            mu[i] = h[i] / l[i];
            z[i] = (alpha[i] - h[i - 1] * z[i - 1]) / l[i];
        }

        // Back substitution
        let mut b = vec![0.0; n - 1];
        let mut c = vec![0.0; n];
        let mut d = vec![0.0; n - 1];
        for j in (0..n - 1).rev() {
            c[j] = z[j] - mu[j] * c[j + 1];
            b[j] = (a[j + 1] - a[j]) / h[j] - h[j] * (c[j + 1] + 2.0 * c[j]) / 3.0;
            d[j] = (c[j + 1] - c[j]) / (3.0 * h[j]);
        }

        let mut a = a;
        a.truncate(n - 1);
        c.truncate(n - 1);
        Ok(Self {
            times: times.to_vec(),
            a,
            b,
            c,
            d,
        })
    }

    /// Number of cubic segments
    #[inline]
    pub fn segments(&self) -> usize {
        self.a.len()
    }

    /// Knot times
    #[inline]
    pub fn knots(&self) -> &[f64] {
        &self.times
    }

    /// Per-segment coefficients `(a, b, c, d)`
    pub fn coefficients(&self) -> (&[f64], &[f64], &[f64], &[f64]) {
        (&self.a, &self.b, &self.c, &self.d)
    }

    /// Value at `t`; times outside the knot range are clamped to it
    pub fn evaluate(&self, t: f64) -> f64 {
        let first = self.times[0];
        let last = self.times[self.times.len() - 1];
        let t = t.clamp(first, last);

        let segments = self.segments();
        let j = self.times[..segments]
            .partition_point(|&x| x <= t)
            .saturating_sub(1)
            .min(segments - 1);
        let dx = t - self.times[j];
        self.a[j] + dx * (self.b[j] + dx * (self.c[j] + dx * self.d[j]))
    }
}

/// Spline interpolator settings, in multiples of the frame interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplineConfig {
    /// Edit points closer than this collapse to the later one
    pub merge_distance: f64,
    /// Frames this close to an edit take its exact value and count as edited
    pub snap_distance: f64,
    /// Reach of a lone edit point
    pub single_point_reach: f64,
}

impl Default for SplineConfig {
    fn default() -> Self {
        Self {
            merge_distance: 1.0,
            snap_distance: 0.5,
            single_point_reach: 1.0,
        }
    }
}

/// Expands sparse edit points into per-frame pitch values
#[derive(Debug, Clone, Default)]
pub struct SplineInterpolator {
    config: SplineConfig,
}

impl SplineInterpolator {
    pub fn new(config: SplineConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &SplineConfig {
        &self.config
    }

    /// Sort edits by time and collapse near-duplicates.
    ///
    /// Points within `merge_distance` frame intervals of the previously kept
    /// point replace it when they were supplied later. Non-finite points are
    /// dropped.
    pub fn prepare_points(&self, edits: &[EditPoint], frame_interval: f64) -> Vec<EditPoint> {
        let mut indexed: Vec<(usize, EditPoint)> = edits
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, p)| p.time.is_finite() && p.semitones.is_finite())
            .collect();
        indexed.sort_by(|a, b| a.1.time.total_cmp(&b.1.time));

        let merge = frame_interval * self.config.merge_distance;
        let mut kept: Vec<(usize, EditPoint)> = Vec::with_capacity(indexed.len());
        for (index, point) in indexed {
            match kept.last_mut() {
                Some(last) if point.time - last.1.time < merge => {
                    if index > last.0 {
                        *last = (index, point);
                    }
                }
                _ => kept.push((index, point)),
            }
        }
        kept.into_iter().map(|(_, p)| p).collect()
    }

    /// Assign every frame a pitch from `edits`.
    ///
    /// Frames before the first or after the last edit get 0. Every output
    /// frame is tagged either `is_edited` (within the snap distance of an
    /// edit, taking its exact value and outlier flag) or `is_interpolated`.
    /// With no edits the frames are returned unchanged; with one distinct
    /// edit only frames within reach of it are shifted. If the spline cannot
    /// be fitted (edits sharing a time survive a `merge_distance` of 0) the
    /// frames are returned unchanged.
    pub fn interpolate(&self, frames: &[Frame], edits: &[EditPoint]) -> Vec<Frame> {
        if frames.is_empty() || edits.is_empty() {
            return frames.to_vec();
        }

        let interval = Frame::interval(frames).unwrap_or(f64::INFINITY);
        let points = self.prepare_points(edits, interval);
        if points.is_empty() {
            return frames.to_vec();
        }

        if points.len() < 2 {
            let point = points[0];
            let reach = interval * self.config.single_point_reach;
            return self.tag_frames(frames, &points, interval, |t| {
                if (t - point.time).abs() <= reach {
                    point.semitones
                } else {
                    0.0
                }
            });
        }

        let times: Vec<f64> = points.iter().map(|p| p.time).collect();
        let values: Vec<f64> = points.iter().map(|p| p.semitones as f64).collect();
        let spline = match NaturalCubicSpline::fit(&times, &values) {
            Ok(spline) => spline,
            Err(e) => {
                tracing::warn!("Spline fit failed, keeping frames unchanged: {}", e);
                return frames.to_vec();
            }
        };

        let first = times[0];
        let last = times[times.len() - 1];
        let result = self.tag_frames(frames, &points, interval, |t| {
            if t > first && t < last {
                spline.evaluate(t) as f32
            } else {
                0.0
            }
        });

        tracing::debug!(
            edits = points.len(),
            frames = frames.len(),
            segments = spline.segments(),
            "interpolated pitch curve"
        );
        result
    }

    /// Apply `curve` to every frame that is not snapped to an edit point
    fn tag_frames(
        &self,
        frames: &[Frame],
        points: &[EditPoint],
        interval: f64,
        curve: impl Fn(f64) -> f32,
    ) -> Vec<Frame> {
        let snap = interval * self.config.snap_distance;
        frames
            .iter()
            .map(|frame| {
                let mut out = frame.clone();
                match nearest_point(points, frame.time).filter(|p| (p.time - frame.time).abs() <= snap) {
                    Some(point) => {
                        out.pitch_shift = point.semitones;
                        out.is_edited = true;
                        out.is_interpolated = false;
                        out.is_outlier = point.is_outlier;
                    }
                    None => {
                        out.pitch_shift = curve(frame.time);
                        out.is_edited = false;
                        out.is_interpolated = true;
                    }
                }
                out
            })
            .collect()
    }
}

/// Sorted-point lookup of the point closest to `time`
fn nearest_point(points: &[EditPoint], time: f64) -> Option<EditPoint> {
    let upper = points.partition_point(|p| p.time <= time);
    let before = upper.checked_sub(1).map(|i| points[i]);
    let after = points.get(upper).copied();
    match (before, after) {
        (Some(b), Some(a)) => {
            if a.time - time < time - b.time {
                Some(a)
            } else {
                Some(b)
            }
        }
        (b, a) => b.or(a),
    }
}
