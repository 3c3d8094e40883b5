//! Bounded byte FIFO between UART writers and report-sized transmission.

use std::collections::VecDeque;

/// Fixed-capacity circular byte buffer.
///
/// Writes accept at most the free space and report how much was taken;
/// nothing ever grows past the capacity chosen at construction.
#[derive(Debug)]
pub struct TxFifo {
    buf: VecDeque<u8>,
    capacity: usize,
}

impl TxFifo {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn free(&self) -> usize {
        self.capacity - self.buf.len()
    }

    /// Appends as much of `data` as fits. Returns the number of bytes taken.
    pub fn push(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.free());
        self.buf.extend(&data[..n]);
        n
    }

    /// Copies up to `out.len()` bytes from the front into `out` without
    /// removing them. Returns the number copied.
    pub fn peek_into(&self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.buf.len());
        for (dst, src) in out.iter_mut().zip(self.buf.iter()) {
            *dst = *src;
        }
        n
    }

    /// Drops up to `n` bytes from the front. Returns the number dropped.
    pub fn consume(&mut self, n: usize) -> usize {
        let n = n.min(self.buf.len());
        self.buf.drain(..n);
        n
    }

    /// Drops all pending bytes without releasing storage.
    pub fn reset(&mut self) {
        self.buf.clear();
    }
}
