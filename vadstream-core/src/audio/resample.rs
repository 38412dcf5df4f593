//! Sample-rate conversion to the classifier's 16 kHz input rate.
//!
//! Built on rubato's `FastFixedIn`, which consumes fixed-size input blocks.
//! `RateConverter` keeps the odd tail between pushes and zero-pads it on
//! `finish`, so a whole recording can be converted without losing samples.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

use crate::buffering::AudioChunk;
use crate::error::{Result, VadError};

/// Input block size used by [`convert`].
pub const DEFAULT_BLOCK: usize = 960;

/// Streaming mono converter between two fixed rates.
pub struct RateConverter {
    /// `None` when both rates are equal.
    inner: Option<FastFixedIn<f32>>,
    block: usize,
    ratio: f64,
    tail: Vec<f32>,
    scratch: Vec<Vec<f32>>,
}

impl RateConverter {
    /// `block` is the number of input samples rubato consumes per call.
    pub fn new(from_rate: u32, to_rate: u32, block: usize) -> Result<Self> {
        if from_rate == 0 || to_rate == 0 || block == 0 {
            return Err(VadError::Resample(format!(
                "invalid conversion {from_rate} Hz -> {to_rate} Hz (block {block})"
            )));
        }

        let ratio = to_rate as f64 / from_rate as f64;
        if from_rate == to_rate {
            return Ok(Self {
                inner: None,
                block,
                ratio,
                tail: Vec::new(),
                scratch: Vec::new(),
            });
        }

        let inner = FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Cubic, block, 1)
            .map_err(|e| VadError::Resample(e.to_string()))?;
        let scratch = vec![vec![0f32; inner.output_frames_max()]];
        debug!(from_rate, to_rate, block, "rate converter ready");

        Ok(Self {
            inner: Some(inner),
            block,
            ratio,
            tail: Vec::new(),
            scratch,
        })
    }

    pub fn is_passthrough(&self) -> bool {
        self.inner.is_none()
    }

    /// Convert as many whole blocks as `samples` (plus any held tail) allows.
    pub fn push(&mut self, samples: &[f32]) -> Result<Vec<f32>> {
        let Some(inner) = self.inner.as_mut() else {
            return Ok(samples.to_vec());
        };

        self.tail.extend_from_slice(samples);
        let whole = self.tail.len() / self.block * self.block;
        let mut out = Vec::with_capacity((whole as f64 * self.ratio).ceil() as usize);

        for block in self.tail[..whole].chunks_exact(self.block) {
            let (_, produced) = inner
                .process_into_buffer(&[block], &mut self.scratch, None)
                .map_err(|e| VadError::Resample(e.to_string()))?;
            out.extend_from_slice(&self.scratch[0][..produced]);
        }
        self.tail.drain(..whole);
        Ok(out)
    }

    /// Zero-pad and convert the held tail, trimmed to its converted length.
    pub fn finish(&mut self) -> Result<Vec<f32>> {
        if self.inner.is_none() || self.tail.is_empty() {
            return Ok(Vec::new());
        }
        let keep = (self.tail.len() as f64 * self.ratio).round() as usize;
        let padding = vec![0f32; self.block - self.tail.len()];
        let mut out = self.push(&padding)?;
        out.truncate(keep);
        Ok(out)
    }
}

/// Convert a whole chunk to `to_rate` in one go.
pub fn convert(chunk: &AudioChunk, to_rate: u32) -> Result<AudioChunk> {
    let mut rc = RateConverter::new(chunk.sample_rate, to_rate, DEFAULT_BLOCK)?;
    if rc.is_passthrough() {
        return Ok(chunk.clone());
    }
    let mut samples = rc.push(&chunk.samples)?;
    samples.extend(rc.finish()?);
    Ok(AudioChunk::new(samples, to_rate))
}
