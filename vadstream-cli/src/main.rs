//! `vadstream` — replay a WAV file as a live stream through a `VadSession`
//! and print every speech event as one JSON line on stdout.
//!
//! Logs go to stderr; filter with `RUST_LOG` (default `vadstream=info`).

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};
use vadstream_core::{
    audio::read_wav_mono_16k, inference::EnergyClassifier, ClassifierHandle, FrameSize,
    VadConfig, VadSession,
};

const USAGE: &str = "Usage: vadstream <input.wav> [--model <silero_vad.onnx>] [--config <file.json>]
                 [--threshold <p>] [--frame-size <512|1024|1536>] [--ignore <secs>]
                 [--chunk <samples>] [--threads <n>]";

#[derive(Debug)]
struct Args {
    input: PathBuf,
    model: Option<PathBuf>,
    config: Option<PathBuf>,
    threshold: Option<f32>,
    frame_size: Option<usize>,
    ignore: Option<f64>,
    chunk: usize,
    threads: Option<usize>,
}

fn parse_args(argv: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut input: Option<PathBuf> = None;
    let mut model = None;
    let mut config = None;
    let mut threshold = None;
    let mut frame_size = None;
    let mut ignore = None;
    let mut chunk = 480usize;
    let mut threads = None;

    let mut it = argv.into_iter();
    while let Some(arg) = it.next() {
        let mut value = |name: &str| it.next().with_context(|| format!("missing value for {name}"));
        match arg.as_str() {
            "--model" => model = Some(PathBuf::from(value("--model")?)),
            "--config" => config = Some(PathBuf::from(value("--config")?)),
            "--threshold" => {
                let v = value("--threshold")?;
                threshold = Some(v.parse::<f32>().context("invalid --threshold")?);
            }
            "--frame-size" => {
                let v = value("--frame-size")?;
                frame_size = Some(v.parse::<usize>().context("invalid --frame-size")?);
            }
            "--ignore" => {
                let v = value("--ignore")?;
                ignore = Some(v.parse::<f64>().context("invalid --ignore")?);
            }
            "--chunk" => {
                chunk = value("--chunk")?
                    .parse::<usize>()
                    .context("invalid --chunk")?
                    .max(1)
            }
            "--threads" => {
                let v = value("--threads")?;
                threads = Some(v.parse::<usize>().context("invalid --threads")?.clamp(1, 32));
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            other if other.starts_with("--") => {
                anyhow::bail!("unknown argument: {other}\n{USAGE}")
            }
            other => input = Some(PathBuf::from(other)),
        }
    }

    let input = input.with_context(|| format!("missing input file\n{USAGE}"))?;
    Ok(Args {
        input,
        model,
        config,
        threshold,
        frame_size,
        ignore,
        chunk,
        threads,
    })
}

/// Config file (if any), then command-line overrides.
fn build_config(args: &Args) -> Result<VadConfig> {
    let mut config = match &args.config {
        Some(path) => VadConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => VadConfig::default(),
    };
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(frame_size) = args.frame_size {
        config.frame_size = FrameSize::try_from(frame_size)?;
    }
    if let Some(ignore) = args.ignore {
        config.ignore_duration = ignore;
    }
    config.validate()?;
    Ok(config)
}

#[cfg(feature = "onnx")]
fn build_classifier(args: &Args) -> ClassifierHandle {
    use vadstream_core::{SileroClassifier, SileroConfig};

    let cfg = SileroConfig {
        model_path: args
            .model
            .clone()
            .unwrap_or_else(SileroClassifier::default_model_path),
        intra_threads: args.threads.unwrap_or(1),
        ..SileroConfig::default()
    };
    if cfg.model_path.exists() {
        info!("using SileroClassifier from {:?}", cfg.model_path);
        return ClassifierHandle::new(SileroClassifier::new(cfg));
    }
    warn!(
        "Silero model not found at {:?} — using EnergyClassifier",
        cfg.model_path
    );
    ClassifierHandle::new(EnergyClassifier::default())
}

#[cfg(not(feature = "onnx"))]
fn build_classifier(args: &Args) -> ClassifierHandle {
    if args.model.is_some() {
        warn!("--model ignored: built without the `onnx` feature");
    }
    if args.threads.is_some() {
        warn!("--threads ignored: built without the `onnx` feature");
    }
    ClassifierHandle::new(EnergyClassifier::default())
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("vadstream=info")),
        )
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let config = build_config(&args)?;
    info!(input = ?args.input, chunk = args.chunk, ?config, "vadstream starting");

    let audio = read_wav_mono_16k(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    info!(
        samples = audio.samples.len(),
        secs = audio.duration_secs(),
        "audio loaded"
    );

    // ── Session ───────────────────────────────────────────────────────────
    let session = VadSession::new(config, build_classifier(&args))?;
    session.on_speech_event(|event| match serde_json::to_string(&event) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!("failed to serialize speech event: {e}"),
    })?;
    session.initialize().await?;

    for chunk in audio.split_into(args.chunk) {
        session.push_audio_frame(chunk.samples);
    }

    let snapshot = session.close().await;
    info!(
        frames = snapshot.frames_completed,
        events = snapshot.events_emitted,
        suppressed = snapshot.events_suppressed,
        inference_errors = snapshot.inference_errors,
        "stream finished"
    );
    if snapshot.chunks_failed > 0 {
        warn!(chunks_failed = snapshot.chunks_failed, "some chunks failed; see errors above");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn threads_is_unset_unless_given() {
        let args = parse_args(argv(&["in.wav"])).expect("parse");
        assert_eq!(args.threads, None);
        assert_eq!(args.chunk, 480);

        let args = parse_args(argv(&["in.wav", "--threads", "64"])).expect("parse");
        assert_eq!(args.threads, Some(32));
    }

    #[test]
    fn overrides_apply_on_top_of_defaults() {
        let args = parse_args(argv(&[
            "--threshold",
            "0.7",
            "--frame-size",
            "1024",
            "in.wav",
        ]))
        .expect("parse");
        let config = build_config(&args).expect("config");
        assert_eq!(config.threshold, 0.7);
        assert_eq!(config.frame_size, FrameSize::Samples1024);
    }

    #[test]
    fn unknown_flags_and_missing_input_are_errors() {
        assert!(parse_args(argv(&["--bogus"])).is_err());
        assert!(parse_args(argv(&["--threads", "2"])).is_err());
        assert!(parse_args(argv(&["in.wav", "--frame-size", "500"]))
            .and_then(|args| build_config(&args))
            .is_err());
    }
}
