//! Reusable scratch buffers shared between stages of one pipeline

use parking_lot::Mutex;

/// Bounded free list of `f32` buffers.
///
/// A pool is an ordinary value: each pipeline owns (or shares via `Arc`)
/// its own instance, so independent pipelines never contend. Buffers are
/// zeroed on acquire; at most `capacity` buffers are retained on release.
#[derive(Debug)]
pub struct BufferPool {
    free: Mutex<Vec<Vec<f32>>>,
    capacity: usize,
}

impl BufferPool {
    /// Create a pool retaining up to `capacity` buffers
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    /// Maximum retained buffers
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of buffers currently held
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }

    /// Take a zeroed buffer of `len` samples, reusing a pooled allocation when possible
    pub fn acquire(&self, len: usize) -> Vec<f32> {
        let reused = {
            let mut free = self.free.lock();
            // Prefer a buffer that already has room
            match free.iter().position(|b| b.capacity() >= len) {
                Some(idx) => Some(free.swap_remove(idx)),
                None => free.pop(),
            }
        };

        match reused {
            Some(mut buf) => {
                buf.clear();
                buf.resize(len, 0.0);
                buf
            }
            None => vec![0.0; len],
        }
    }

    /// Return a buffer; dropped if the pool is full
    pub fn release(&self, buf: Vec<f32>) {
        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(buf);
        }
    }

    /// Drop every pooled buffer
    pub fn clear(&self) {
        self.free.lock().clear();
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(8)
    }
}
