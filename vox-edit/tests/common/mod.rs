#![allow(dead_code)]

use std::f32::consts::PI;

use vox_analysis::{dominant_frequency, Frame, FramePreprocessor};

pub const SR: u32 = 48000;

pub fn gen_sine(freq_hz: f32, sr: u32, n: usize, amp: f32) -> Vec<f32> {
    (0..n)
        .map(|i| amp * (2.0 * PI * freq_hz * i as f32 / sr as f32).sin())
        .collect()
}

pub fn windowed_rms(signal: &[f32], start: usize, len: usize) -> f64 {
    let start = start.min(signal.len());
    let end = (start + len).min(signal.len());
    if end <= start {
        return 0.0;
    }
    let sum_sq: f64 = signal[start..end].iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / (end - start) as f64).sqrt()
}

pub fn rms_difference(a: &[f32], b: &[f32]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let sum_sq: f64 = a[..n]
        .iter()
        .zip(&b[..n])
        .map(|(&x, &y)| {
            let d = (x - y) as f64;
            d * d
        })
        .sum();
    (sum_sq / n as f64).sqrt()
}

/// Dominant frequency of `signal[start..start + len]`
pub fn peak_frequency(signal: &[f32], sr: u32, start: usize, len: usize) -> f32 {
    let end = (start + len).min(signal.len());
    dominant_frequency(&signal[start..end], sr).unwrap_or(0.0)
}

pub fn frames_for(signal: &[f32], sr: u32, size: usize, hop: usize) -> Vec<Frame> {
    FramePreprocessor::new(size, hop, 0.01)
        .unwrap()
        .process_signal(signal, sr)
}
