//! Single-consumer worker loop.
//!
//! ## Per chunk
//!
//! ```text
//! 1. FrameAccumulator folds the chunk into 0+ completed frames
//! 2. For each frame, in order:
//!    a. not ready      → Silence, state untouched, no classifier call
//!    b. ready          → classifier on the blocking pool; replace state
//!    c. ActivityTracker::observe → deliver event on a transition
//! 3. Next job
//! ```
//!
//! Jobs are drained one at a time, so a chunk's frames are all scored and its
//! events delivered before the next chunk is touched.
//!
//! ## Failures
//!
//! If scoring fails, that frame and the remaining completed frames of the
//! same chunk are not scored. The recurrent state keeps its last good value,
//! the stream clock still advances for every completed frame, and the
//! partial tail stays buffered. The error is logged and the loop moves on.
//!
//! A panicking event callback is caught by the sink. The rest of the chunk
//! is still scored and the chunk is reported as failed.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use super::{sink::EventSink, SessionDiagnostics};
use crate::{
    buffering::{Frame, FrameAccumulator},
    config::VadConfig,
    error::{Result, VadError},
    inference::{ClassifierHandle, RecurrentState},
    vad::{ActivityTracker, Transition, VadDecision},
};

/// Work items, processed strictly in send order.
pub(crate) enum Job {
    Chunk(Vec<f32>),
    /// Classifier warmed up: zero the state, start scoring.
    Activate(oneshot::Sender<()>),
    /// Start a new stream: zero state, drop partial frame, clock to zero.
    Reset,
    /// Acknowledged once every earlier job is done.
    Flush(oneshot::Sender<()>),
}

pub(crate) struct Worker {
    threshold: f32,
    classifier: ClassifierHandle,
    accumulator: FrameAccumulator,
    state: RecurrentState,
    tracker: ActivityTracker,
    ready: bool,
    ready_flag: Arc<AtomicBool>,
    sink: Arc<EventSink>,
    diagnostics: Arc<SessionDiagnostics>,
}

impl Worker {
    pub(crate) fn new(
        config: &VadConfig,
        classifier: ClassifierHandle,
        sink: Arc<EventSink>,
        diagnostics: Arc<SessionDiagnostics>,
        ready_flag: Arc<AtomicBool>,
    ) -> Self {
        Self {
            threshold: config.threshold,
            classifier,
            accumulator: FrameAccumulator::new(config.frame_size),
            state: RecurrentState::zeroed(),
            tracker: ActivityTracker::new(config),
            ready: false,
            ready_flag,
            sink,
            diagnostics,
        }
    }

    /// Drain `jobs` until every sender is dropped.
    pub(crate) async fn run(mut self, mut jobs: mpsc::UnboundedReceiver<Job>) {
        debug!("session worker started");

        while let Some(job) = jobs.recv().await {
            match job {
                Job::Chunk(samples) => {
                    SessionDiagnostics::bump(&self.diagnostics.chunks_in);
                    if let Err(e) = self.process_chunk(&samples).await {
                        SessionDiagnostics::bump(&self.diagnostics.chunks_failed);
                        error!(
                            error = %e,
                            samples = samples.len(),
                            stream_secs = self.tracker.duration_secs(),
                            "chunk processing failed; continuing with next chunk"
                        );
                    }
                }
                Job::Activate(ack) => {
                    // Overlapping `initialize` calls may queue several; only
                    // the first one starts scoring from a zeroed state.
                    if !self.ready {
                        self.state = RecurrentState::zeroed();
                        self.ready = true;
                        self.ready_flag.store(true, Ordering::SeqCst);
                        info!(stream_secs = self.tracker.duration_secs(), "classifier active");
                    }
                    let _ = ack.send(());
                }
                Job::Reset => {
                    self.state = RecurrentState::zeroed();
                    self.accumulator.clear();
                    self.tracker.reset();
                    debug!("session reset");
                }
                Job::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }

        debug!(
            frames = self.tracker.frames(),
            stream_secs = self.tracker.duration_secs(),
            "session worker stopped"
        );
    }

    async fn process_chunk(&mut self, samples: &[f32]) -> Result<()> {
        let frames: Vec<Frame> = self.accumulator.accumulate(samples).collect();
        let mut failure: Option<VadError> = None;
        let mut callback_failure: Option<VadError> = None;

        for frame in frames {
            SessionDiagnostics::bump(&self.diagnostics.frames_completed);

            if failure.is_some() {
                SessionDiagnostics::bump(&self.diagnostics.frames_skipped_after_error);
                self.tracker.skip();
                continue;
            }

            let decision = if self.ready {
                match self.score(frame).await {
                    Ok(probability) => VadDecision::from_probability(probability, self.threshold),
                    Err(e) => {
                        SessionDiagnostics::bump(&self.diagnostics.inference_errors);
                        self.tracker.skip();
                        failure = Some(e);
                        continue;
                    }
                }
            } else {
                SessionDiagnostics::bump(&self.diagnostics.frames_not_ready);
                VadDecision::Silence
            };

            match self.tracker.observe(decision) {
                Transition::Unchanged => {}
                Transition::Suppressed(event) => {
                    SessionDiagnostics::bump(&self.diagnostics.events_suppressed);
                    debug!(
                        time = event.time,
                        activated = event.activated,
                        "transition inside warm-up window; not delivered"
                    );
                }
                Transition::Emitted(event) => {
                    SessionDiagnostics::bump(&self.diagnostics.events_emitted);
                    debug!(time = event.time, activated = event.activated, "speech event");
                    if let Err(e) = self.sink.deliver(event) {
                        SessionDiagnostics::bump(&self.diagnostics.callback_panics);
                        callback_failure.get_or_insert(e);
                    }
                }
            }
        }

        match failure.or(callback_failure) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Score one frame on the blocking pool. `self.state` is replaced only
    /// after the call succeeds.
    async fn score(&mut self, frame: Frame) -> Result<f32> {
        SessionDiagnostics::bump(&self.diagnostics.inference_calls);

        let classifier = self.classifier.clone();
        let state = self.state.clone();
        let score = tokio::task::spawn_blocking(move || classifier.score(frame.samples(), &state))
            .await
            .map_err(|e| VadError::Inference(format!("inference task failed: {e}")))??;

        self.state = score.state;
        Ok(score.probability)
    }
}
