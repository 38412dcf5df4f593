//! Silero VAD neural speech classifier.
//!
//! Wraps the Silero VAD v3/v4 ONNX model published at
//! <https://github.com/snakers4/silero-vad>.
//!
//! ## Model I/O (v4 LSTM)
//!
//! | Name     | Shape      | DType | Direction |
//! |----------|------------|-------|-----------|
//! | `input`  | `[1, N]`   | f32   | in        |
//! | `sr`     | `[1]`      | i64   | in        |
//! | `h`      | `[2,1,64]` | f32   | in/out    |
//! | `c`      | `[2,1,64]` | f32   | in/out    |
//! | `output` | `[1, 1]`   | f32   | out       |
//! | `hn`     | `[2,1,64]` | f32   | out       |
//! | `cn`     | `[2,1,64]` | f32   | out       |
//!
//! `N` is 512, 1024 or 1536 at 16 kHz.
//!
//! Threading is set per classifier through `SileroConfig`; nothing is read
//! from the environment or configured process-wide.

use std::path::PathBuf;

use ndarray::{Array1, Array2, Array3};
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::{Session, SessionInputValue};
use ort::value::Value;
use tracing::info;

use super::{default_models_dir, RecurrentState, Score, SpeechClassifier, STATE_SHAPE};
use crate::config::SAMPLE_RATE;
use crate::error::{Result, VadError};

/// Execution options for the ONNX session.
#[derive(Debug, Clone)]
pub struct SileroConfig {
    /// Path to `silero_vad.onnx`.
    pub model_path: PathBuf,
    /// Threads used inside one operator. Default: 1 (one frame is tiny).
    pub intra_threads: usize,
    /// Threads used across independent operators. Default: 1.
    pub inter_threads: usize,
}

impl Default for SileroConfig {
    fn default() -> Self {
        Self {
            model_path: default_models_dir().join("silero_vad.onnx"),
            intra_threads: 1,
            inter_threads: 1,
        }
    }
}

/// Resolved tensor names of a loaded model.
#[derive(Debug, Clone)]
struct IoNames {
    input: String,
    sr: Option<String>,
    h: String,
    c: String,
    output: String,
    hn: String,
    cn: String,
}

/// Neural classifier using the Silero VAD ONNX model.
///
/// The ONNX session is created in `warm_up`; scoring before that fails with
/// `VadError::ClassifierUnavailable`.
pub struct SileroClassifier {
    config: SileroConfig,
    session: Option<Session>,
    names: Option<IoNames>,
}

impl SileroClassifier {
    pub fn new(config: SileroConfig) -> Self {
        Self {
            config,
            session: None,
            names: None,
        }
    }

    /// Default path for the Silero VAD model file.
    pub fn default_model_path() -> PathBuf {
        default_models_dir().join("silero_vad.onnx")
    }

    fn load(&self) -> Result<(Session, IoNames)> {
        let path = &self.config.model_path;
        if !path.exists() {
            return Err(VadError::ModelNotFound { path: path.clone() });
        }

        let size_mb = std::fs::metadata(path)
            .map(|m| m.len() as f64 / 1_048_576.0)
            .unwrap_or(0.0);

        info!("=== SileroClassifier Startup Report ===");
        info!("  path: {:?}", path);
        info!("  size: {:.2} MB", size_mb);

        let intra_threads = self.config.intra_threads.clamp(1, 32);
        let inter_threads = self.config.inter_threads.clamp(1, 8);

        let session = SessionBuilder::new()
            .map_err(|e| VadError::OnnxSession(e.to_string()))?
            .with_intra_threads(intra_threads)
            .map_err(|e| VadError::OnnxSession(e.to_string()))?
            .with_inter_threads(inter_threads)
            .map_err(|e| VadError::OnnxSession(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::All)
            .map_err(|e| VadError::OnnxSession(e.to_string()))?
            .commit_from_file(path)
            .map_err(|e| VadError::OnnxSession(e.to_string()))?;

        let input_names: Vec<String> = session
            .inputs()
            .iter()
            .map(|outlet| outlet.name().to_string())
            .collect();
        let output_names: Vec<String> = session
            .outputs()
            .iter()
            .map(|outlet| outlet.name().to_string())
            .collect();

        info!(intra_threads, inter_threads, "  threading configured");
        info!("  inputs: {:?}", input_names);
        info!("  outputs: {:?}", output_names);

        let required = |names: &[String], preferred: &[&str], role: &str| {
            resolve_name(names, preferred).ok_or_else(|| {
                VadError::OnnxSession(format!(
                    "Silero model has no {role} tensor (looked for {preferred:?})"
                ))
            })
        };

        let names = IoNames {
            input: resolve_name(&input_names, &["input", "audio", "x"])
                .or_else(|| input_names.first().cloned())
                .ok_or_else(|| VadError::OnnxSession("Silero model has no inputs".into()))?,
            sr: resolve_name(&input_names, &["sr", "sample_rate"]),
            h: required(&input_names, &["h", "state_h"], "h")?,
            c: required(&input_names, &["c", "state_c"], "c")?,
            output: resolve_name(&output_names, &["output", "speech_prob", "prob"])
                .or_else(|| output_names.first().cloned())
                .ok_or_else(|| VadError::OnnxSession("Silero model has no outputs".into()))?,
            hn: required(&output_names, &["hn", "state_hn", "h_out"], "hn")?,
            cn: required(&output_names, &["cn", "state_cn", "c_out"], "cn")?,
        };

        info!("=== SileroClassifier ready ===");
        Ok((session, names))
    }
}

fn resolve_name(candidates: &[String], preferred: &[&str]) -> Option<String> {
    preferred.iter().find_map(|needle| {
        candidates
            .iter()
            .find(|name| name.eq_ignore_ascii_case(needle))
            .cloned()
    })
}

fn state_tensor(data: &[f32]) -> Result<Value> {
    let arr = Array3::<f32>::from_shape_vec(STATE_SHAPE, data.to_vec())
        .map_err(|e| VadError::Inference(e.to_string()))?;
    Value::from_array(arr)
        .map(|tensor| tensor.into_dyn())
        .map_err(|e: ort::Error| VadError::OnnxSession(e.to_string()))
}

impl SpeechClassifier for SileroClassifier {
    fn warm_up(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }
        let (session, names) = self.load()?;
        self.session = Some(session);
        self.names = Some(names);
        Ok(())
    }

    fn score(&mut self, frame: &[f32], state: &RecurrentState) -> Result<Score> {
        let (Some(session), Some(names)) = (self.session.as_mut(), self.names.as_ref()) else {
            return Err(VadError::ClassifierUnavailable);
        };

        let input_arr = Array2::<f32>::from_shape_vec((1, frame.len()), frame.to_vec())
            .map_err(|e| VadError::Inference(e.to_string()))?;
        let input_val = Value::from_array(input_arr)
            .map_err(|e: ort::Error| VadError::OnnxSession(e.to_string()))?;

        let mut input_values: Vec<(String, SessionInputValue<'_>)> = vec![
            (names.input.clone(), input_val.into()),
            (names.h.clone(), state_tensor(&state.h)?.into()),
            (names.c.clone(), state_tensor(&state.c)?.into()),
        ];

        if let Some(sr_name) = &names.sr {
            let sr_arr = Array1::<i64>::from_elem(1, i64::from(SAMPLE_RATE));
            let sr_val = Value::from_array(sr_arr)
                .map_err(|e: ort::Error| VadError::OnnxSession(e.to_string()))?;
            input_values.push((sr_name.clone(), sr_val.into()));
        }

        let outputs = session
            .run(input_values)
            .map_err(|e| VadError::Inference(e.to_string()))?;

        let extract = |name: &str| -> Result<Vec<f32>> {
            let value = outputs
                .get(name)
                .ok_or_else(|| VadError::Inference(format!("model output `{name}` missing")))?;
            let (_, data) = value
                .try_extract_tensor::<f32>()
                .map_err(|e| VadError::Inference(e.to_string()))?;
            Ok(data.to_vec())
        };

        let probability = extract(&names.output)?
            .first()
            .copied()
            .ok_or_else(|| VadError::Inference("model output is empty".into()))?;

        // Both tensors are extracted before either is handed back, so the
        // caller never sees a half-updated pair.
        let h = extract(&names.hn)?;
        let c = extract(&names.cn)?;

        Ok(Score {
            probability,
            state: RecurrentState { h, c },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoring_before_warm_up_reports_unavailable() {
        let mut classifier = SileroClassifier::new(SileroConfig::default());
        let err = classifier
            .score(&[0.0; 512], &RecurrentState::zeroed())
            .unwrap_err();
        assert!(matches!(err, VadError::ClassifierUnavailable));
    }

    #[test]
    fn warm_up_with_missing_model_reports_path() {
        let mut classifier = SileroClassifier::new(SileroConfig {
            model_path: PathBuf::from("/nonexistent/silero_vad.onnx"),
            ..SileroConfig::default()
        });
        let err = classifier.warm_up().unwrap_err();
        assert!(matches!(err, VadError::ModelNotFound { .. }));
    }

    #[test]
    fn resolve_name_is_case_insensitive_and_ordered() {
        let names = vec!["Input".to_string(), "sr".to_string(), "H".to_string()];
        assert_eq!(resolve_name(&names, &["input"]).as_deref(), Some("Input"));
        assert_eq!(resolve_name(&names, &["state_h", "h"]).as_deref(), Some("H"));
        assert_eq!(resolve_name(&names, &["c"]), None);
    }
}
