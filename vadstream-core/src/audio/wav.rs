//! WAV decoding into mono f32 chunks.

use std::path::Path;

use tracing::debug;

use super::resample;
use crate::buffering::AudioChunk;
use crate::config::SAMPLE_RATE;
use crate::error::{Result, VadError};

/// Read a WAV file, normalise integer PCM to [-1, 1], and downmix to mono.
pub fn read_wav_mono(path: impl AsRef<Path>) -> Result<AudioChunk> {
    let path = path.as_ref();
    let mut reader =
        hound::WavReader::open(path).map_err(|e| VadError::AudioDecode(e.to_string()))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| VadError::AudioDecode(e.to_string()))?,
        hound::SampleFormat::Int => {
            // Full scale for the stored width: 127 for 8-bit, 32767 for 16-bit.
            let max = ((1_i64 << (spec.bits_per_sample.max(2) - 1)) - 1) as f32;
            if spec.bits_per_sample <= 16 {
                reader
                    .samples::<i16>()
                    .map(|s| s.map(|v| (v as f32) / max))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| VadError::AudioDecode(e.to_string()))?
            } else {
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| (v as f32) / max))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| VadError::AudioDecode(e.to_string()))?
            }
        }
    };

    debug!(
        path = ?path,
        channels,
        sample_rate = spec.sample_rate,
        bits = spec.bits_per_sample,
        "wav decoded"
    );

    if channels == 1 {
        return Ok(AudioChunk::new(interleaved, spec.sample_rate));
    }

    let mono = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().copied().sum::<f32>() / channels as f32)
        .collect();
    Ok(AudioChunk::new(mono, spec.sample_rate))
}

/// Read a WAV file as mono 16 kHz audio, resampling when needed.
pub fn read_wav_mono_16k(path: impl AsRef<Path>) -> Result<AudioChunk> {
    let chunk = read_wav_mono(path)?;
    if chunk.sample_rate == SAMPLE_RATE {
        return Ok(chunk);
    }
    resample::convert(&chunk, SAMPLE_RATE)
}
