//! Edge-triggered speech activity tracking.
//!
//! ## Algorithm (per completed frame)
//!
//! 1. Advance the stream clock by one frame. The clock is kept as a frame
//!    count, so `time = frames * frame_size / sample_rate` exactly.
//! 2. If the decision matches the current state → `Unchanged`.
//! 3. Otherwise flip the state. If `time <= ignore_duration` the flip is
//!    `Suppressed` (warm-up); else it is `Emitted` with a `SpeechEvent`.
//!
//! Suppressed flips still move the state, so speech that starts inside the
//! warm-up window and continues past it produces no activation event; the
//! next event is its deactivation.

use super::VadDecision;
use crate::config::VadConfig;
use crate::events::SpeechEvent;

/// Session-visible interpretation of the most recent decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivityState {
    #[default]
    Inactive,
    Active,
}

impl ActivityState {
    pub fn is_active(self) -> bool {
        self == ActivityState::Active
    }
}

impl From<VadDecision> for ActivityState {
    fn from(decision: VadDecision) -> Self {
        if decision.is_speech() {
            ActivityState::Active
        } else {
            ActivityState::Inactive
        }
    }
}

/// Outcome of feeding one frame to the tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// Same decision as before.
    Unchanged,
    /// State flipped inside the warm-up window; nothing is delivered.
    Suppressed(SpeechEvent),
    /// State flipped; deliver this event.
    Emitted(SpeechEvent),
}

/// Activity state machine plus the stream clock.
#[derive(Debug, Clone)]
pub struct ActivityTracker {
    state: ActivityState,
    frames: u64,
    frame_size: usize,
    sample_rate: u32,
    ignore_duration: f64,
}

impl ActivityTracker {
    pub fn new(config: &VadConfig) -> Self {
        Self {
            state: ActivityState::Inactive,
            frames: 0,
            frame_size: config.frame_size.samples(),
            sample_rate: config.sample_rate,
            ignore_duration: config.ignore_duration,
        }
    }

    /// Feed the decision for the next completed frame.
    pub fn observe(&mut self, decision: VadDecision) -> Transition {
        self.frames += 1;

        let next = ActivityState::from(decision);
        if next == self.state {
            return Transition::Unchanged;
        }
        self.state = next;

        let event = SpeechEvent {
            time: self.duration_secs(),
            activated: next.is_active(),
        };
        if event.time <= self.ignore_duration {
            Transition::Suppressed(event)
        } else {
            Transition::Emitted(event)
        }
    }

    /// Advance the clock for a frame that produced no decision.
    pub fn skip(&mut self) {
        self.frames += 1;
    }

    /// Cumulative stream duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frames as f64 * self.frame_size as f64 / self.sample_rate as f64
    }

    /// Number of completed frames seen.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn state(&self) -> ActivityState {
        self.state
    }

    /// Back to `Inactive` at time zero.
    pub fn reset(&mut self) {
        self.state = ActivityState::Inactive;
        self.frames = 0;
    }
}
