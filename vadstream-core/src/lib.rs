//! # vadstream-core
//!
//! Streaming voice activity detection over arbitrarily chunked audio.
//!
//! ## Architecture
//!
//! ```text
//! push_audio_frame(chunk) → mpsc queue → worker task (one per session)
//!                                             │
//!                                   FrameAccumulator (512/1024/1536)
//!                                             │
//!                          SpeechClassifier::score (spawn_blocking)
//!                                             │
//!                                      ActivityTracker
//!                                             │
//!                             EventSink → callback / broadcast
//! ```
//!
//! Chunks are processed strictly in push order. The recurrent model state,
//! the activity state and the stream clock are owned by the worker task.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod config;
pub mod error;
pub mod events;
pub mod inference;
pub mod session;
pub mod vad;

// Convenience re-exports for downstream crates
pub use buffering::accumulator::{Frame, FrameAccumulator};
pub use config::{FrameSize, VadConfig};
pub use error::VadError;
pub use events::{SessionStatus, SpeechEvent};
pub use inference::{ClassifierHandle, RecurrentState, Score, SpeechClassifier};
pub use session::{DiagnosticsSnapshot, VadSession};
pub use vad::activity::{ActivityState, ActivityTracker, Transition};

#[cfg(feature = "onnx")]
pub use inference::{SileroClassifier, SileroConfig};
