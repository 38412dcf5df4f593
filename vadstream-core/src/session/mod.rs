//! `VadSession` — the caller-facing handle of one audio stream.
//!
//! ## Lifecycle
//!
//! ```text
//! VadSession::new(config, classifier)   → worker spawned, status = Uninitialized
//!     └─► initialize().await            → warm-up, status = Initializing → Ready
//!         └─► push_audio_frame(..)*     → chunks scored in push order
//!             └─► close().await         → queue drained, worker joined
//! ```
//!
//! Chunks pushed before `initialize()` completes are still framed and
//! clocked, but every frame is treated as silence without calling the
//! classifier.
//!
//! ## Threading
//!
//! `new` spawns the worker with `tokio::spawn` and must run inside a Tokio
//! runtime. All stream state lives in the worker; this handle only holds the
//! queue sender plus shared status/diagnostics.

pub mod sink;
mod worker;

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{error, info, warn};

use crate::{
    config::VadConfig,
    error::{Result, VadError},
    events::{SessionStatus, SpeechEvent},
    inference::ClassifierHandle,
};
use sink::EventSink;
use worker::{Job, Worker};

/// Shared session counters, written by the worker.
#[derive(Default)]
pub struct SessionDiagnostics {
    pub chunks_in: AtomicUsize,
    pub chunks_failed: AtomicUsize,
    pub frames_completed: AtomicUsize,
    pub frames_not_ready: AtomicUsize,
    pub frames_skipped_after_error: AtomicUsize,
    pub inference_calls: AtomicUsize,
    pub inference_errors: AtomicUsize,
    pub events_emitted: AtomicUsize,
    pub events_suppressed: AtomicUsize,
    pub callback_panics: AtomicUsize,
}

impl SessionDiagnostics {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            chunks_in: self.chunks_in.load(Ordering::Relaxed),
            chunks_failed: self.chunks_failed.load(Ordering::Relaxed),
            frames_completed: self.frames_completed.load(Ordering::Relaxed),
            frames_not_ready: self.frames_not_ready.load(Ordering::Relaxed),
            frames_skipped_after_error: self.frames_skipped_after_error.load(Ordering::Relaxed),
            inference_calls: self.inference_calls.load(Ordering::Relaxed),
            inference_errors: self.inference_errors.load(Ordering::Relaxed),
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
            events_suppressed: self.events_suppressed.load(Ordering::Relaxed),
            callback_panics: self.callback_panics.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub chunks_in: usize,
    pub chunks_failed: usize,
    pub frames_completed: usize,
    pub frames_not_ready: usize,
    pub frames_skipped_after_error: usize,
    pub inference_calls: usize,
    pub inference_errors: usize,
    pub events_emitted: usize,
    pub events_suppressed: usize,
    pub callback_panics: usize,
}

/// Streaming VAD session.
///
/// `VadSession` is `Send + Sync`; wrap it in `Arc` to push audio from several
/// places. Chunks are processed in the order their `push_audio_frame` calls
/// return.
pub struct VadSession {
    config: VadConfig,
    classifier: ClassifierHandle,
    jobs: mpsc::UnboundedSender<Job>,
    worker: JoinHandle<()>,
    sink: Arc<EventSink>,
    status: Arc<Mutex<SessionStatus>>,
    /// Set by the worker when it processes the activation job.
    ready: Arc<AtomicBool>,
    diagnostics: Arc<SessionDiagnostics>,
}

impl VadSession {
    /// Validate `config` and spawn the worker. Does not warm up the
    /// classifier — call `initialize()`.
    ///
    /// # Errors
    /// `VadError::InvalidConfig` if `config.validate()` fails.
    pub fn new(config: VadConfig, classifier: ClassifierHandle) -> Result<Self> {
        config.validate()?;

        let sink = Arc::new(EventSink::new());
        let diagnostics = Arc::new(SessionDiagnostics::default());
        let ready = Arc::new(AtomicBool::new(false));
        let (jobs, rx) = mpsc::unbounded_channel();

        let worker = Worker::new(
            &config,
            classifier.clone(),
            Arc::clone(&sink),
            Arc::clone(&diagnostics),
            Arc::clone(&ready),
        );
        let worker = tokio::spawn(worker.run(rx));

        info!(
            threshold = config.threshold,
            frame_size = config.frame_size.samples(),
            sample_rate = config.sample_rate,
            ignore_duration = config.ignore_duration,
            "vad session created"
        );

        Ok(Self {
            config,
            classifier,
            jobs,
            worker,
            sink,
            status: Arc::new(Mutex::new(SessionStatus::Uninitialized)),
            ready,
            diagnostics,
        })
    }

    /// Warm up the classifier, then switch the worker to scoring.
    ///
    /// The activation is queued behind chunks already pushed, so those are
    /// still treated as not-ready. Returns once the worker has activated.
    /// Calling again after success is a no-op, and overlapping calls
    /// activate the worker only once.
    ///
    /// # Errors
    /// - Whatever the classifier's `warm_up` reports (status becomes `Error`).
    /// - `VadError::SessionClosed` if the worker is gone.
    pub async fn initialize(&self) -> Result<()> {
        if self.is_ready() {
            return Ok(());
        }

        self.set_status(SessionStatus::Initializing);
        info!("warming up speech classifier");

        let classifier = self.classifier.clone();
        let warmed = tokio::task::spawn_blocking(move || classifier.warm_up())
            .await
            .map_err(|e| VadError::Inference(format!("warm-up task failed: {e}")))
            .and_then(|r| r);
        if let Err(e) = warmed {
            error!(error = %e, "classifier warm-up failed");
            self.set_status(SessionStatus::Error);
            return Err(e);
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(Job::Activate(ack_tx))?;
        ack_rx.await.map_err(|_| VadError::SessionClosed)?;

        self.set_status(SessionStatus::Ready);
        info!("vad session ready");
        Ok(())
    }

    /// Queue a chunk of 16 kHz mono samples. Never blocks; never fails.
    ///
    /// Errors while processing the chunk are logged by the worker and do not
    /// reach the caller.
    pub fn push_audio_frame(&self, samples: impl Into<Vec<f32>>) {
        if self.jobs.send(Job::Chunk(samples.into())).is_err() {
            warn!("session worker has shut down; audio chunk dropped");
        }
    }

    /// Register the speech event callback. At most one callback per session.
    ///
    /// The callback runs on the worker task between frames and should return
    /// quickly. A panic inside it is caught and logged; the chunk counts as
    /// failed and later chunks are processed normally.
    ///
    /// # Errors
    /// `VadError::CallbackAlreadySet` on the second call.
    pub fn on_speech_event<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(SpeechEvent) + Send + Sync + 'static,
    {
        self.sink.set_callback(Box::new(callback))
    }

    /// Receive speech events on a broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<SpeechEvent> {
        self.sink.subscribe()
    }

    /// Start a new stream after everything already queued: zero the
    /// recurrent state, drop the partial frame, reset activity and clock.
    /// Readiness is kept.
    pub fn reset(&self) {
        if self.send(Job::Reset).is_err() {
            warn!("session worker has shut down; reset ignored");
        }
    }

    /// Wait until every chunk pushed before this call has been processed.
    pub async fn flush(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(Job::Flush(ack_tx))?;
        ack_rx.await.map_err(|_| VadError::SessionClosed)
    }

    /// Process everything queued, stop the worker, and return final counters.
    pub async fn close(self) -> DiagnosticsSnapshot {
        let Self {
            jobs,
            worker,
            status,
            diagnostics,
            ..
        } = self;

        drop(jobs);
        if let Err(e) = worker.await {
            error!(error = %e, "session worker terminated abnormally");
        }
        *status.lock() = SessionStatus::Closed;

        let snapshot = diagnostics.snapshot();
        info!(?snapshot, "vad session closed");
        snapshot
    }

    /// Current session status (snapshot).
    pub fn status(&self) -> SessionStatus {
        *self.status.lock()
    }

    /// `true` once the worker scores frames.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &VadConfig {
        &self.config
    }

    /// Snapshot of session counters for observability.
    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn send(&self, job: Job) -> Result<()> {
        self.jobs.send(job).map_err(|_| VadError::SessionClosed)
    }

    fn set_status(&self, new_status: SessionStatus) {
        *self.status.lock() = new_status;
    }
}

impl std::fmt::Debug for VadSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VadSession")
            .field("config", &self.config)
            .field("status", &self.status())
            .field("sink", &self.sink)
            .finish_non_exhaustive()
    }
}
