//! Fixed-capacity circular (ring) buffer for captured PCM samples.
//!
//! The cpal callback writes into it; [`CpalAudioDevice::read`] pulls the
//! oldest samples out in slices of whatever size the runner asks for.  When
//! the reader falls behind, new samples **overwrite** the oldest data so the
//! decoder always sees the most recent audio.
//!
//! [`CpalAudioDevice::read`]: crate::audio::CpalAudioDevice
//!
//! # Example
//!
//! ```rust
//! use kws_runner::audio::RingBuffer;
//!
//! let mut buf = RingBuffer::new(4);
//! let overwritten = buf.push_slice(&[1i16, 2, 3, 4, 5]);
//! assert_eq!(overwritten, 1);
//!
//! let mut out = [0i16; 3];
//! assert_eq!(buf.pop_into(&mut out), 3);
//! assert_eq!(out, [2, 3, 4]);
//! assert_eq!(buf.len(), 1);
//! ```

// ---------------------------------------------------------------------------
// RingBuffer
// ---------------------------------------------------------------------------

/// A fixed-capacity circular buffer.
///
/// Generic over `T: Copy + Default`; the capture path uses `RingBuffer<i16>`.
pub struct RingBuffer<T> {
    buf: Vec<T>,
    capacity: usize,
    /// Index of the *next* write position (wraps around `capacity`).
    write_pos: usize,
    /// Number of valid samples currently stored (≤ `capacity`).
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a new ring buffer with the given `capacity`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            buf: vec![T::default(); capacity],
            capacity,
            write_pos: 0,
            len: 0,
        }
    }

    /// Append `data`, overwriting the oldest samples once full.
    ///
    /// Returns how many previously stored samples were overwritten.
    pub fn push_slice(&mut self, data: &[T]) -> usize {
        let mut overwritten = 0;
        for &item in data {
            self.buf[self.write_pos] = item;
            self.write_pos = (self.write_pos + 1) % self.capacity;
            if self.len < self.capacity {
                self.len += 1;
            } else {
                overwritten += 1;
            }
        }
        overwritten
    }

    /// Move up to `out.len()` of the oldest samples into `out`.
    ///
    /// Returns the number of samples written.
    pub fn pop_into(&mut self, out: &mut [T]) -> usize {
        let n = self.len.min(out.len());
        // The oldest sample sits `len` positions behind the write cursor.
        let read_pos = (self.write_pos + self.capacity - self.len) % self.capacity;

        for (i, slot) in out.iter_mut().take(n).enumerate() {
            *slot = self.buf[(read_pos + i) % self.capacity];
        }

        self.len -= n;
        n
    }

    /// Discard all samples and reset the write position.
    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.len = 0;
    }

    /// Number of valid samples currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of samples the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
