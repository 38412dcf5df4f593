//! Per-frame speech decisions and the activity state machine built on them.

pub mod activity;

pub use activity::{ActivityState, ActivityTracker, Transition};

/// Whether a given audio frame contains speech or silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadDecision {
    /// The classifier probability reached the threshold.
    Speech,
    /// Below threshold, or no classifier result for this frame.
    Silence,
}

impl VadDecision {
    /// `Speech` iff `probability >= threshold`.
    pub fn from_probability(probability: f32, threshold: f32) -> Self {
        if probability >= threshold {
            VadDecision::Speech
        } else {
            VadDecision::Silence
        }
    }

    pub fn is_speech(self) -> bool {
        self == VadDecision::Speech
    }
}
