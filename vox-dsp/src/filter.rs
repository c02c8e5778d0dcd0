//! One-pole low-pass used for anti-aliasing around pitch shifts

use std::f32::consts::PI;

/// First-order IIR low-pass: `y += a * (x - y)`
#[derive(Debug, Clone, Copy)]
pub struct OnePoleLowPass {
    coeff: f32,
    state: f32,
}

impl OnePoleLowPass {
    /// Create a filter with `cutoff` Hz at `sample_rate` Hz
    pub fn new(cutoff: f32, sample_rate: f32) -> Self {
        let mut filter = Self {
            coeff: 1.0,
            state: 0.0,
        };
        filter.set_cutoff(cutoff, sample_rate);
        filter
    }

    /// Recompute the coefficient. Cutoffs at or above Nyquist pass everything.
    pub fn set_cutoff(&mut self, cutoff: f32, sample_rate: f32) {
        if sample_rate <= 0.0 || cutoff >= sample_rate * 0.5 {
            self.coeff = 1.0;
            return;
        }
        let cutoff = cutoff.max(1.0);
        self.coeff = 1.0 - (-2.0 * PI * cutoff / sample_rate).exp();
    }

    #[inline]
    pub fn coeff(&self) -> f32 {
        self.coeff
    }

    #[inline]
    pub fn process_sample(&mut self, x: f32) -> f32 {
        self.state += self.coeff * (x - self.state);
        self.state
    }

    /// Filter a block in place
    pub fn process(&mut self, samples: &mut [f32]) {
        for s in samples.iter_mut() {
            *s = self.process_sample(*s);
        }
    }

    pub fn reset(&mut self) {
        self.state = 0.0;
    }
}
