//! Event types delivered to session consumers.
//!
//! Both types serialize with camelCase keys so they can be forwarded as JSON
//! without a mapping layer (the CLI prints `SpeechEvent`s one per line).

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Speech events
// ---------------------------------------------------------------------------

/// A speech start/stop transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechEvent {
    /// Stream time in seconds at the end of the frame that triggered the
    /// transition.
    pub time: f64,
    /// `true` = speech started, `false` = speech stopped.
    pub activated: bool,
}

// ---------------------------------------------------------------------------
// Session status
// ---------------------------------------------------------------------------

/// Current state of a `VadSession`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Created; `initialize()` not yet called. Frames are no-op decisions.
    Uninitialized,
    /// Classifier warm-up in progress.
    Initializing,
    /// Frames are scored.
    Ready,
    /// Warm-up failed. Frames stay no-op decisions; `initialize()` may be retried.
    Error,
    /// Worker shut down via `close()`.
    Closed,
}
