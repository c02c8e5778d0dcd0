//! Analysis frames and the preprocessor that cuts them from a buffer

use crate::buffer::AudioBuffer;
use crate::error::AnalysisError;

/// A fixed-length slice of audio plus its editing metadata.
///
/// Every pipeline stage takes a frame sequence and returns a new one with
/// the same count and timing; only the metadata and samples change.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Start time in seconds
    pub time: f64,
    /// Raw (unwindowed) samples
    pub samples: Vec<f32>,
    /// RMS energy of `samples`
    pub rms: f32,
    /// Voice activity flag
    pub is_voice: bool,
    /// Pitch shift in semitones
    pub pitch_shift: f32,
    /// Output/input duration ratio (1.0 = unchanged)
    pub duration_ratio: f32,
    /// Carries a user-authored edit
    pub is_edited: bool,
    /// Value was replaced by outlier correction
    pub is_outlier: bool,
    /// Value was computed by interpolation
    pub is_interpolated: bool,
}

impl Frame {
    /// Create an unedited frame, computing its RMS
    pub fn new(time: f64, samples: Vec<f32>) -> Self {
        let rms = rms(&samples);
        Self {
            time,
            samples,
            rms,
            is_voice: false,
            pitch_shift: 0.0,
            duration_ratio: 1.0,
            is_edited: false,
            is_outlier: false,
            is_interpolated: false,
        }
    }

    /// Builder-style pitch assignment
    pub fn with_pitch_shift(mut self, semitones: f32) -> Self {
        self.pitch_shift = semitones;
        self
    }

    /// Number of samples in the frame
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Frequency ratio for this frame's pitch shift: 2^(semitones/12)
    #[inline]
    pub fn pitch_ratio(&self) -> f32 {
        2.0f32.powf(self.pitch_shift / 12.0)
    }

    /// Spacing between consecutive frame start times, if there are at least two frames
    pub fn interval(frames: &[Frame]) -> Option<f64> {
        match frames {
            [first, second, ..] if second.time > first.time => Some(second.time - first.time),
            _ => None,
        }
    }
}

/// Computes the RMS (root mean square) of a signal
pub(crate) fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}

/// Cuts a buffer into fixed-size frames at a fixed hop with energy-based voice detection
#[derive(Debug, Clone, Copy)]
pub struct FramePreprocessor {
    frame_size: usize,
    hop_size: usize,
    vad_threshold: f32,
}

impl FramePreprocessor {
    /// Create a preprocessor. `hop_size` must lie in `1..=frame_size`.
    pub fn new(frame_size: usize, hop_size: usize, vad_threshold: f32) -> Result<Self, AnalysisError> {
        if frame_size == 0 || hop_size == 0 || hop_size > frame_size {
            return Err(AnalysisError::InvalidFraming {
                frame_size,
                hop_size,
            });
        }
        Ok(Self {
            frame_size,
            hop_size,
            vad_threshold,
        })
    }

    #[inline]
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    #[inline]
    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Frame the first channel of `buffer`.
    ///
    /// The last frame is zero-padded so the frames cover every input sample.
    pub fn process(&self, buffer: &AudioBuffer) -> Vec<Frame> {
        let signal = if buffer.channels == 1 {
            buffer.samples.clone()
        } else {
            buffer.channel(0)
        };
        self.process_signal(&signal, buffer.sample_rate)
    }

    /// Frame a mono signal
    pub fn process_signal(&self, signal: &[f32], sample_rate: u32) -> Vec<Frame> {
        let mut frames = Vec::new();
        if signal.is_empty() || sample_rate == 0 {
            return frames;
        }

        let mut start = 0;
        loop {
            let end = (start + self.frame_size).min(signal.len());
            let mut samples = signal[start..end].to_vec();
            samples.resize(self.frame_size, 0.0);

            let mut frame = Frame::new(start as f64 / sample_rate as f64, samples);
            frame.is_voice = frame.rms >= self.vad_threshold;
            frames.push(frame);

            if start + self.frame_size >= signal.len() {
                break;
            }
            start += self.hop_size;
        }

        tracing::debug!(
            frames = frames.len(),
            frame_size = self.frame_size,
            hop_size = self.hop_size,
            "framed signal"
        );
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rms_and_ratio() {
        let frame = Frame::new(0.0, vec![1.0, -1.0, 1.0, -1.0]).with_pitch_shift(12.0);
        assert!((frame.rms - 1.0).abs() < 1e-6);
        assert!((frame.pitch_ratio() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_hop_larger_than_frame() {
        assert!(FramePreprocessor::new(256, 512, 0.01).is_err());
        assert!(FramePreprocessor::new(0, 0, 0.01).is_err());
    }

    #[test]
    fn test_frames_cover_whole_signal() {
        let pre = FramePreprocessor::new(4, 2, 0.5).unwrap();
        let signal = vec![1.0; 9];
        let frames = pre.process_signal(&signal, 2);
        // starts at 0, 2, 4, 6 (last one padded past sample 8)
        assert_eq!(frames.len(), 4);
        assert!((frames[1].time - 1.0).abs() < 1e-12);
        assert_eq!(frames[3].samples, vec![1.0, 1.0, 1.0, 0.0]);
        assert!(frames.iter().all(|f| f.len() == 4));
        assert_eq!(Frame::interval(&frames), Some(1.0));
    }

    #[test]
    fn test_voice_flag_follows_threshold() {
        let pre = FramePreprocessor::new(4, 4, 0.1).unwrap();
        let mut signal = vec![0.0; 4];
        signal.extend_from_slice(&[0.5; 4]);
        let frames = pre.process_signal(&signal, 8);
        assert_eq!(frames.len(), 2);
        assert!(!frames[0].is_voice);
        assert!(frames[1].is_voice);
    }

    #[test]
    fn test_empty_signal_yields_no_frames() {
        let pre = FramePreprocessor::new(4, 2, 0.0).unwrap();
        assert!(pre.process_signal(&[], 48000).is_empty());
    }
}
