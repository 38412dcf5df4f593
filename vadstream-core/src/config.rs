//! Session configuration.
//!
//! `VadConfig` is plain data: it can be built in code, or loaded from a JSON
//! file whose keys mirror the camelCase field names:
//!
//! ```json
//! { "threshold": 0.5, "frameSize": 512, "sampleRate": 16000, "ignoreDuration": 1.5 }
//! ```
//!
//! Missing keys fall back to the defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VadError};

/// The only sample rate the classifier accepts (Hz).
pub const SAMPLE_RATE: u32 = 16_000;

/// Analysis window length in samples.
///
/// The classifier accepts exactly these three lengths at 16 kHz
/// (32 ms, 64 ms and 96 ms).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum FrameSize {
    #[default]
    Samples512,
    Samples1024,
    Samples1536,
}

impl FrameSize {
    /// Number of samples in one frame.
    pub fn samples(self) -> usize {
        match self {
            FrameSize::Samples512 => 512,
            FrameSize::Samples1024 => 1024,
            FrameSize::Samples1536 => 1536,
        }
    }

    /// Returns `true` if `len` is one of the accepted frame lengths.
    pub fn is_valid_len(len: usize) -> bool {
        Self::try_from(len).is_ok()
    }
}

impl TryFrom<usize> for FrameSize {
    type Error = VadError;

    fn try_from(len: usize) -> Result<Self> {
        match len {
            512 => Ok(FrameSize::Samples512),
            1024 => Ok(FrameSize::Samples1024),
            1536 => Ok(FrameSize::Samples1536),
            other => Err(VadError::InvalidFrameSize { len: other }),
        }
    }
}

impl From<FrameSize> for usize {
    fn from(size: FrameSize) -> usize {
        size.samples()
    }
}

/// Configuration for a `VadSession`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct VadConfig {
    /// Speech probability threshold in [0, 1]. A frame is speech when
    /// `probability >= threshold`. Default: 0.5.
    pub threshold: f32,
    /// Frame length fed to the classifier. Default: 512.
    pub frame_size: FrameSize,
    /// Input sample rate. Only 16000 is accepted.
    pub sample_rate: u32,
    /// Warm-up window in seconds. Transitions whose frame ends at or before
    /// this point update the activity state but emit no event. Default: 0.
    pub ignore_duration: f64,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            frame_size: FrameSize::default(),
            sample_rate: SAMPLE_RATE,
            ignore_duration: 0.0,
        }
    }
}

impl VadConfig {
    /// Check value ranges.
    ///
    /// # Errors
    /// Returns `VadError::InvalidConfig` describing the first bad field.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(VadError::InvalidConfig(format!(
                "threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }
        if self.sample_rate != SAMPLE_RATE {
            return Err(VadError::InvalidConfig(format!(
                "sample rate must be {SAMPLE_RATE} Hz, got {}",
                self.sample_rate
            )));
        }
        if !self.ignore_duration.is_finite() || self.ignore_duration < 0.0 {
            return Err(VadError::InvalidConfig(format!(
                "ignore duration must be a non-negative number of seconds, got {}",
                self.ignore_duration
            )));
        }
        Ok(())
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(&self) -> f64 {
        self.frame_size.samples() as f64 / self.sample_rate as f64
    }

    /// Load and validate a config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: VadConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }
}
