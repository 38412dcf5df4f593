//! Caller-supplied block of audio, queued for the session worker.

/// A contiguous block of mono PCM samples at a known sample rate.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Mono f32 samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate in Hz (e.g. 16000, 44100, 48000).
    pub sample_rate: u32,
}

impl AudioChunk {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Returns the duration of this chunk in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Returns true if the chunk contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Split into consecutive chunks of at most `len` samples.
    ///
    /// Used by drivers that replay a recording as a live stream.
    pub fn split_into(&self, len: usize) -> impl Iterator<Item = AudioChunk> + '_ {
        self.samples
            .chunks(len.max(1))
            .map(move |part| AudioChunk::new(part.to_vec(), self.sample_rate))
    }
}
