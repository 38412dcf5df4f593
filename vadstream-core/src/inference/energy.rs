//! Energy-based classifier: RMS level mapped to a speech probability.
//!
//! ## Algorithm
//!
//! 1. Compute RMS of the frame.
//! 2. Divide by `full_scale_rms` (the level treated as certain speech).
//! 3. Clamp to [0, 1].
//!
//! There is no recurrent model, so the incoming state is returned unchanged.
//! Useful when no ONNX model is available, and as a deterministic backend in
//! tests.

use tracing::debug;

use super::{RecurrentState, Score, SpeechClassifier};
use crate::error::Result;

/// A simple energy-based speech classifier.
#[derive(Debug, Clone)]
pub struct EnergyClassifier {
    /// RMS amplitude that maps to probability 1.0.
    /// Typical range: 0.02–0.1 for a close microphone.
    full_scale_rms: f32,
}

impl EnergyClassifier {
    /// Create a new `EnergyClassifier`.
    ///
    /// `full_scale_rms` is floored at a small positive value so the
    /// probability stays finite.
    pub fn new(full_scale_rms: f32) -> Self {
        Self {
            full_scale_rms: full_scale_rms.max(1e-6),
        }
    }

    /// Compute the root-mean-square of a sample slice.
    fn rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
        (sum_sq / samples.len() as f32).sqrt()
    }
}

impl Default for EnergyClassifier {
    fn default() -> Self {
        Self::new(0.04)
    }
}

impl SpeechClassifier for EnergyClassifier {
    fn warm_up(&mut self) -> Result<()> {
        debug!(full_scale_rms = self.full_scale_rms, "EnergyClassifier::warm_up — no-op");
        Ok(())
    }

    fn score(&mut self, frame: &[f32], state: &RecurrentState) -> Result<Score> {
        let probability = (Self::rms(frame) / self.full_scale_rms).clamp(0.0, 1.0);
        Ok(Score {
            probability,
            state: state.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(classifier: &mut EnergyClassifier, amplitude: f32) -> f32 {
        classifier
            .score(&vec![amplitude; 512], &RecurrentState::zeroed())
            .expect("energy score never fails")
            .probability
    }

    #[test]
    fn silence_scores_zero() {
        let mut classifier = EnergyClassifier::default();
        assert_eq!(score(&mut classifier, 0.0), 0.0);
    }

    #[test]
    fn loud_frame_saturates_at_one() {
        let mut classifier = EnergyClassifier::new(0.04);
        assert_eq!(score(&mut classifier, 0.5), 1.0);
    }

    #[test]
    fn probability_scales_with_level() {
        let mut classifier = EnergyClassifier::new(0.04);
        let p = score(&mut classifier, 0.02);
        assert!((p - 0.5).abs() < 1e-5, "p={p}");
    }

    #[test]
    fn state_passes_through_unchanged() {
        let mut classifier = EnergyClassifier::default();
        let state = RecurrentState {
            h: vec![0.25; 128],
            c: vec![-0.5; 128],
        };
        let out = classifier.score(&[0.1; 512], &state).expect("score");
        assert_eq!(out.state, state);
    }

    #[test]
    fn rms_of_square_wave() {
        // A square wave at ±0.5 should have RMS = 0.5
        let samples: Vec<f32> = (0..256)
            .map(|i| if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();
        let rms = EnergyClassifier::rms(&samples);
        assert!((rms - 0.5).abs() < 1e-5, "rms={rms}");
    }
}
