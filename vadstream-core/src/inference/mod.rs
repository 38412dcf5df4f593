//! Speech classifier abstraction.
//!
//! The `SpeechClassifier` trait decouples the session from any specific
//! backend (Silero ONNX, RMS energy, test doubles).
//!
//! The recurrent state is *not* kept inside the backend: it is passed in and
//! handed back on every call, so the session worker owns it and can replace
//! it as one unit only after a call succeeds.
//!
//! `&mut self` on `score` expresses that backends own stateful runtime
//! resources (ONNX sessions, scratch buffers). All calls are serialised
//! through `ClassifierHandle`'s `parking_lot::Mutex`.

pub mod energy;

#[cfg(feature = "onnx")]
pub mod silero;

pub use energy::EnergyClassifier;

#[cfg(feature = "onnx")]
pub use silero::{SileroClassifier, SileroConfig};

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::FrameSize;
use crate::error::{Result, VadError};

/// Layers × batch × units of each recurrent tensor: `[2, 1, 64]`.
pub const STATE_SHAPE: (usize, usize, usize) = (2, 1, 64);
/// Floats per recurrent tensor.
pub const STATE_LEN: usize = STATE_SHAPE.0 * STATE_SHAPE.1 * STATE_SHAPE.2;

/// Recurrent `h`/`c` tensors carried between classifier calls, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurrentState {
    pub h: Vec<f32>,
    pub c: Vec<f32>,
}

impl RecurrentState {
    /// Zero-filled state, used at start-up and after a reset.
    pub fn zeroed() -> Self {
        Self {
            h: vec![0.0; STATE_LEN],
            c: vec![0.0; STATE_LEN],
        }
    }

    pub fn is_zeroed(&self) -> bool {
        self.h.iter().chain(self.c.iter()).all(|&v| v == 0.0)
    }

    /// Both tensors have the `[2, 1, 64]` element count.
    pub fn has_valid_shape(&self) -> bool {
        self.h.len() == STATE_LEN && self.c.len() == STATE_LEN
    }
}

impl Default for RecurrentState {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Result of scoring one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    /// Speech probability in [0, 1].
    pub probability: f32,
    /// State to pass to the next call.
    pub state: RecurrentState,
}

/// Contract for frame classifiers.
pub trait SpeechClassifier: Send + 'static {
    /// One-time preparation: load weights, create runtime sessions.
    /// Called once from `VadSession::initialize`.
    ///
    /// # Errors
    /// Returns an error if model files are missing or corrupt.
    fn warm_up(&mut self) -> Result<()>;

    /// Score one frame.
    ///
    /// `frame` has already been checked to be 512, 1024 or 1536 samples by
    /// `ClassifierHandle`. Implementations must not keep `state` between
    /// calls; the returned `Score::state` replaces it.
    fn score(&mut self, frame: &[f32], state: &RecurrentState) -> Result<Score>;
}

/// Thread-safe reference-counted handle to any `SpeechClassifier` implementor.
///
/// Uses `parking_lot::Mutex` for non-poisoning locks, so a panicking backend
/// does not wedge later calls.
#[derive(Clone)]
pub struct ClassifierHandle(pub Arc<Mutex<dyn SpeechClassifier>>);

impl ClassifierHandle {
    /// Wrap any `SpeechClassifier` in a `ClassifierHandle`.
    pub fn new<C: SpeechClassifier>(classifier: C) -> Self {
        Self(Arc::new(Mutex::new(classifier)))
    }

    pub fn warm_up(&self) -> Result<()> {
        self.0.lock().warm_up()
    }

    /// Validate the frame length, then score it.
    ///
    /// # Errors
    /// - `VadError::InvalidFrameSize` if `frame.len()` is not 512, 1024 or
    ///   1536. The backend is not called.
    /// - Whatever the backend reports.
    pub fn score(&self, frame: &[f32], state: &RecurrentState) -> Result<Score> {
        FrameSize::try_from(frame.len())?;

        let mut score = self.0.lock().score(frame, state)?;
        if !score.state.has_valid_shape() {
            return Err(VadError::Inference(format!(
                "classifier returned state of {}/{} floats, expected {STATE_LEN}",
                score.state.h.len(),
                score.state.c.len()
            )));
        }
        if score.probability.is_nan() {
            return Err(VadError::Inference("classifier returned NaN".into()));
        }
        score.probability = score.probability.clamp(0.0, 1.0);
        Ok(score)
    }
}

impl std::fmt::Debug for ClassifierHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierHandle").finish_non_exhaustive()
    }
}

/// Platform data directory where model files are looked up by default.
pub fn default_models_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(|p| PathBuf::from(p).join("vadstream").join("models"))
            .unwrap_or_else(|| PathBuf::from("models"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("vadstream")
            .join("models")
    }
}
