//! Fixed-size frame assembly.
//!
//! ## Algorithm
//!
//! The accumulator owns one frame-sized buffer and a fill cursor. For each
//! incoming chunk:
//!
//! 1. Copy `min(remaining capacity, remaining chunk)` samples into the buffer.
//! 2. If the buffer is full, yield it as a `Frame` and reset the cursor.
//! 3. Repeat until the chunk is exhausted; a short tail stays buffered.
//!
//! Frame contents depend only on the sample sequence, never on where the
//! chunk boundaries fell.

use crate::config::FrameSize;

/// One classifier input window.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    samples: Vec<f32>,
}

impl Frame {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Reassembles arbitrary-length chunks into fixed-length frames.
#[derive(Debug, Clone)]
pub struct FrameAccumulator {
    buf: Vec<f32>,
    /// Number of valid samples at the front of `buf`. Always `< buf.len()`
    /// between calls.
    fill: usize,
}

impl FrameAccumulator {
    pub fn new(frame_size: FrameSize) -> Self {
        Self {
            buf: vec![0.0; frame_size.samples()],
            fill: 0,
        }
    }

    /// Fold `samples` into the buffer, lazily yielding every completed frame
    /// in arrival order.
    ///
    /// Samples are consumed only as the iterator advances: dropping it early
    /// discards whatever has not been pulled yet.
    pub fn accumulate<'a>(&'a mut self, samples: &'a [f32]) -> Frames<'a> {
        Frames {
            acc: self,
            remaining: samples,
        }
    }

    /// Frame length in samples.
    pub fn frame_size(&self) -> usize {
        self.buf.len()
    }

    /// Samples buffered towards the next frame.
    pub fn pending(&self) -> usize {
        self.fill
    }

    /// Drop the partial tail.
    pub fn clear(&mut self) {
        self.fill = 0;
    }
}

/// Iterator returned by [`FrameAccumulator::accumulate`].
pub struct Frames<'a> {
    acc: &'a mut FrameAccumulator,
    remaining: &'a [f32],
}

impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        while !self.remaining.is_empty() {
            let acc = &mut *self.acc;
            let space = acc.buf.len() - acc.fill;
            let (head, tail) = self.remaining.split_at(space.min(self.remaining.len()));

            acc.buf[acc.fill..acc.fill + head.len()].copy_from_slice(head);
            acc.fill += head.len();
            self.remaining = tail;

            if acc.fill == acc.buf.len() {
                acc.fill = 0;
                return Some(Frame::new(acc.buf.clone()));
            }
        }
        None
    }
}
