//! Audio buffering: caller-supplied chunks and fixed-size analysis frames.
//!
//! Chunks arrive with arbitrary lengths; the classifier only accepts
//! fixed-length frames. `FrameAccumulator` bridges the two without losing or
//! duplicating samples across chunk boundaries.

pub mod accumulator;
pub mod chunk;

pub use accumulator::{Frame, FrameAccumulator, Frames};
pub use chunk::AudioChunk;
