//! Window functions

use std::f32::consts::PI;

/// Periodic Hann window (raised cosine, sums to a constant under 50%/75% overlap)
pub fn hann_window(size: usize) -> Vec<f32> {
    if size == 0 {
        return Vec::new();
    }
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_endpoints_and_peak() {
        let w = hann_window(8);
        assert_eq!(w.len(), 8);
        assert!(w[0].abs() < 1e-7);
        assert!((w[4] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_hann_half_overlap_sums_to_one() {
        let n = 64;
        let w = hann_window(n);
        for i in 0..n / 2 {
            let sum = w[i] + w[i + n / 2];
            assert!((sum - 1.0).abs() < 1e-5, "sum at {} = {}", i, sum);
        }
    }
}
