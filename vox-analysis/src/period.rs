//! Pitch-period estimation using normalized autocorrelation

/// Lowest fundamental considered voiced
pub const MIN_VOICE_HZ: f32 = 80.0;
/// Highest fundamental considered voiced
pub const MAX_VOICE_HZ: f32 = 800.0;

/// Period assumed for unvoiced stretches, in seconds
const UNVOICED_PERIOD_SECS: f32 = 0.01;
/// Candidate peaks within this fraction of the best correlation win (prefers the shortest lag)
const OCTAVE_TOLERANCE: f32 = 0.9;
/// Below this energy a block is treated as silence
const SILENCE_ENERGY: f64 = 1e-8;

/// A pitch mark: one analysis position per detected period
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchMark {
    /// Position in samples
    pub position: f64,
    /// Local period in samples
    pub period: f32,
    /// Whether the period came from a voiced detection
    pub voiced: bool,
}

/// Autocorrelation period detector bounded to a voice fundamental range
#[derive(Debug, Clone)]
pub struct PeriodDetector {
    sample_rate: f32,
    min_lag: usize,
    max_lag: usize,
    voicing_threshold: f32,
}

impl PeriodDetector {
    /// Detector for the default 80-800 Hz voice range
    pub fn new(sample_rate: u32) -> Self {
        Self::with_range(sample_rate, MIN_VOICE_HZ, MAX_VOICE_HZ)
    }

    /// Detector for a custom fundamental range
    pub fn with_range(sample_rate: u32, min_hz: f32, max_hz: f32) -> Self {
        let sample_rate = sample_rate.max(1) as f32;
        let (lo, hi) = if min_hz <= max_hz {
            (min_hz, max_hz)
        } else {
            (max_hz, min_hz)
        };
        let min_lag = ((sample_rate / hi.max(1.0)).floor() as usize).max(2);
        let max_lag = ((sample_rate / lo.max(1.0)).ceil() as usize).max(min_lag + 1);
        Self {
            sample_rate,
            min_lag,
            max_lag,
            voicing_threshold: 0.5,
        }
    }

    /// Minimum normalized correlation for a block to count as voiced (0..1)
    pub fn set_voicing_threshold(&mut self, threshold: f32) {
        self.voicing_threshold = threshold.clamp(0.0, 1.0);
    }

    /// Analysis block length: two of the longest periods
    #[inline]
    pub fn window_len(&self) -> usize {
        self.max_lag * 2
    }

    /// Period used where nothing voiced is found
    #[inline]
    pub fn unvoiced_period(&self) -> f32 {
        (self.sample_rate * UNVOICED_PERIOD_SECS).max(self.min_lag as f32)
    }

    /// Estimate the period of `block` in samples, or `None` if unvoiced
    pub fn detect(&self, block: &[f32]) -> Option<f32> {
        let n = block.len();
        let max_lag = self.max_lag.min(n / 2);
        if max_lag <= self.min_lag + 1 {
            return None;
        }

        let energy: f64 = block.iter().map(|&s| (s as f64) * (s as f64)).sum();
        if energy < SILENCE_ENERGY {
            return None;
        }

        // r[lag - min_lag + 1], with one guard slot on each side for peak picking
        let first = self.min_lag - 1;
        let corr: Vec<f32> = (first..=max_lag + 1)
            .map(|lag| normalized_correlation(block, lag))
            .collect();

        let best = corr[1..corr.len() - 1]
            .iter()
            .cloned()
            .fold(f32::MIN, f32::max);
        if best < self.voicing_threshold {
            return None;
        }

        for i in 1..corr.len() - 1 {
            if corr[i] >= corr[i - 1] && corr[i] >= corr[i + 1] && corr[i] >= best * OCTAVE_TOLERANCE {
                let lag = (first + i) as f32;
                return Some(lag + parabolic_offset(corr[i - 1], corr[i], corr[i + 1]));
            }
        }

        let (i, _) = corr[1..corr.len() - 1]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))?;
        Some((first + i + 1) as f32)
    }

    /// Per-block period estimates: `(block_center, period)` at half-window hops
    pub fn period_track(&self, signal: &[f32]) -> Vec<(usize, Option<f32>)> {
        let window = self.window_len();
        let hop = (window / 2).max(1);
        if signal.is_empty() {
            return Vec::new();
        }
        if signal.len() <= window {
            return vec![(signal.len() / 2, self.detect(signal))];
        }

        let mut track = Vec::with_capacity(signal.len() / hop + 1);
        let mut start = 0;
        while start + window <= signal.len() {
            track.push((start + window / 2, self.detect(&signal[start..start + window])));
            start += hop;
        }
        track
    }

    /// Place pitch marks across the signal, one per local period
    pub fn pitch_marks(&self, signal: &[f32]) -> Vec<PitchMark> {
        let track = self.period_track(signal);
        if track.is_empty() {
            return Vec::new();
        }

        let mut marks = Vec::new();
        let mut position = 0.0f64;
        while position < signal.len() as f64 {
            let nearest = track
                .iter()
                .min_by_key(|(center, _)| (*center as f64 - position).abs() as usize)
                .and_then(|(_, period)| *period);
            let (period, voiced) = match nearest {
                Some(p) => (p, true),
                None => (self.unvoiced_period(), false),
            };
            marks.push(PitchMark {
                position,
                period,
                voiced,
            });
            position += period.max(1.0) as f64;
        }
        marks
    }

    /// Fundamental frequency in Hz for a period in samples
    #[inline]
    pub fn frequency(&self, period: f32) -> f32 {
        if period > 0.0 {
            self.sample_rate / period
        } else {
            0.0
        }
    }
}

fn normalized_correlation(block: &[f32], lag: usize) -> f32 {
    if lag >= block.len() {
        return 0.0;
    }
    let mut cross = 0.0f64;
    let mut e0 = 0.0f64;
    let mut e1 = 0.0f64;
    for i in 0..block.len() - lag {
        let a = block[i] as f64;
        let b = block[i + lag] as f64;
        cross += a * b;
        e0 += a * a;
        e1 += b * b;
    }
    let denom = (e0 * e1).sqrt();
    if denom <= 0.0 {
        0.0
    } else {
        (cross / denom) as f32
    }
}

/// Vertex offset of the parabola through three equally spaced points
fn parabolic_offset(left: f32, center: f32, right: f32) -> f32 {
    let denom = left - 2.0 * center + right;
    if denom.abs() < 1e-12 {
        0.0
    } else {
        (0.5 * (left - right) / denom).clamp(-0.5, 0.5)
    }
}
