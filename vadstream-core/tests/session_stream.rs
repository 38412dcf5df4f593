use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use vadstream_core::{
    ClassifierHandle, FrameSize, RecurrentState, Score, SpeechClassifier, SpeechEvent, VadConfig,
    VadError, VadSession,
};

/// One recorded classifier invocation.
#[derive(Debug, Clone)]
struct Call {
    frame: Vec<f32>,
    state_in: RecurrentState,
}

/// Returns scripted probabilities; the n-th call hands back a state filled
/// with `n + 1` so continuity can be checked.
struct ScriptedClassifier {
    probabilities: Vec<f32>,
    fail_on: Option<usize>,
    delay: Duration,
    warm_up_delay: Duration,
    calls: usize,
    seen: Arc<Mutex<Vec<Call>>>,
}

impl ScriptedClassifier {
    fn new(probabilities: &[f32]) -> (Self, Arc<Mutex<Vec<Call>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                probabilities: probabilities.to_vec(),
                fail_on: None,
                delay: Duration::ZERO,
                warm_up_delay: Duration::ZERO,
                calls: 0,
                seen: Arc::clone(&seen),
            },
            seen,
        )
    }

    fn failing_on(mut self, call: usize) -> Self {
        self.fail_on = Some(call);
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn with_warm_up_delay(mut self, delay: Duration) -> Self {
        self.warm_up_delay = delay;
        self
    }
}

impl SpeechClassifier for ScriptedClassifier {
    fn warm_up(&mut self) -> std::result::Result<(), VadError> {
        if !self.warm_up_delay.is_zero() {
            thread::sleep(self.warm_up_delay);
        }
        Ok(())
    }

    fn score(
        &mut self,
        frame: &[f32],
        state: &RecurrentState,
    ) -> std::result::Result<Score, VadError> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.seen.lock().push(Call {
            frame: frame.to_vec(),
            state_in: state.clone(),
        });

        let n = self.calls;
        self.calls += 1;
        if self.fail_on == Some(n) {
            return Err(VadError::Inference("scripted failure".into()));
        }

        let probability = self
            .probabilities
            .get(n)
            .or(self.probabilities.last())
            .copied()
            .unwrap_or(0.0);
        let fill = (n + 1) as f32;
        Ok(Score {
            probability,
            state: RecurrentState {
                h: vec![fill; 128],
                c: vec![-fill; 128],
            },
        })
    }
}

async fn ready_session(config: VadConfig, classifier: ScriptedClassifier) -> VadSession {
    let session = VadSession::new(config, ClassifierHandle::new(classifier)).expect("session");
    session.initialize().await.expect("initialize");
    session
}

fn collect_events(session: &VadSession) -> Arc<Mutex<Vec<SpeechEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    session
        .on_speech_event(move |ev| sink.lock().push(ev))
        .expect("register callback");
    events
}

fn ramp(len: usize) -> Vec<f32> {
    (0..len).map(|i| (i as f32 / len as f32) * 2.0 - 1.0).collect()
}

#[tokio::test]
async fn classifier_calls_match_whole_frames_regardless_of_split() {
    let samples = ramp(512 * 6);
    let splits: [&[usize]; 3] = [
        &[3072],
        &[1, 3071],
        &[100, 412, 1000, 1, 559, 1000],
    ];

    for split in splits {
        let (classifier, seen) = ScriptedClassifier::new(&[0.0]);
        let session = ready_session(VadConfig::default(), classifier).await;

        let mut offset = 0;
        for &len in split {
            session.push_audio_frame(&samples[offset..offset + len]);
            offset += len;
        }
        let snap = session.close().await;

        assert_eq!(seen.lock().len(), 6, "split {split:?}");
        assert_eq!(snap.inference_calls, 6);
        assert_eq!(snap.frames_completed, 6);
    }
}

#[tokio::test]
async fn frame_split_across_pushes_reaches_classifier_unchanged() {
    let frame = ramp(1024);
    let config = VadConfig {
        frame_size: FrameSize::Samples1024,
        ..VadConfig::default()
    };

    let (whole, whole_seen) = ScriptedClassifier::new(&[0.0]);
    let session = ready_session(config.clone(), whole).await;
    session.push_audio_frame(frame.clone());
    session.close().await;

    let (pieces, pieces_seen) = ScriptedClassifier::new(&[0.0]);
    let session = ready_session(config, pieces).await;
    session.push_audio_frame(&frame[..7]);
    session.push_audio_frame(&frame[7..8]);
    session.push_audio_frame(Vec::new());
    session.push_audio_frame(&frame[8..]);
    session.close().await;

    let whole_seen = whole_seen.lock();
    let pieces_seen = pieces_seen.lock();
    assert_eq!(whole_seen.len(), 1);
    assert_eq!(pieces_seen.len(), 1);
    assert_eq!(whole_seen[0].frame, frame);
    assert_eq!(pieces_seen[0].frame, whole_seen[0].frame);
}

#[tokio::test]
async fn scripted_probabilities_emit_one_start_and_one_stop() {
    let (classifier, _) = ScriptedClassifier::new(&[0.1, 0.9, 0.9, 0.2]);
    let session = ready_session(VadConfig::default(), classifier).await;
    let events = collect_events(&session);

    session.push_audio_frame(vec![0.0f32; 512 * 4]);
    session.flush().await.expect("flush");

    let events = events.lock().clone();
    assert_eq!(events.len(), 2, "events: {events:?}");
    assert!(events[0].activated);
    approx::assert_relative_eq!(events[0].time, 2.0 * 512.0 / 16_000.0);
    assert!(!events[1].activated);
    approx::assert_relative_eq!(events[1].time, 4.0 * 512.0 / 16_000.0);
    session.close().await;
}

#[tokio::test]
async fn event_time_counts_whole_frames_not_chunks() {
    // Speech starts on the 11th frame; chunk sizes are deliberately ragged.
    let mut probabilities = vec![0.0; 10];
    probabilities.push(1.0);
    let (classifier, _) = ScriptedClassifier::new(&probabilities);
    let config = VadConfig {
        frame_size: FrameSize::Samples1536,
        ..VadConfig::default()
    };
    let session = ready_session(config, classifier).await;
    let mut rx = session.subscribe();

    for len in [1000, 3000, 5000, 7000] {
        session.push_audio_frame(vec![0.0f32; len]);
    }
    let snap = session.close().await;

    // 16000 samples = 10 full frames + 640 leftover; the 11th frame never completes.
    assert_eq!(snap.frames_completed, 10);
    assert!(rx.try_recv().is_err(), "no frame reached probability 1.0");

    let (classifier, _) = ScriptedClassifier::new(&probabilities);
    let session = ready_session(
        VadConfig {
            frame_size: FrameSize::Samples1536,
            ..VadConfig::default()
        },
        classifier,
    )
    .await;
    let mut rx = session.subscribe();
    for len in [1000, 3000, 5000, 7000, 896] {
        session.push_audio_frame(vec![0.0f32; len]);
    }
    session.close().await;

    let event = rx.recv().await.expect("activation");
    assert!(event.activated);
    approx::assert_relative_eq!(event.time, 11.0 * 1536.0 / 16_000.0);
}

#[tokio::test]
async fn warm_up_window_suppresses_early_transitions() {
    // 0.2 s warm-up covers the first six 32 ms frames (0.192 s).
    let probabilities = [0.9, 0.9, 0.9, 0.1, 0.1, 0.9, 0.1, 0.1, 0.1, 0.9];
    let (classifier, _) = ScriptedClassifier::new(&probabilities);
    let config = VadConfig {
        ignore_duration: 0.2,
        ..VadConfig::default()
    };
    let session = ready_session(config, classifier).await;
    let events = collect_events(&session);

    session.push_audio_frame(vec![0.0f32; 512 * probabilities.len()]);
    let snap = session.close().await;

    let events = events.lock().clone();
    assert_eq!(snap.events_suppressed, 3);
    assert_eq!(events.len(), 2, "events: {events:?}");
    assert!(!events[0].activated);
    approx::assert_relative_eq!(events[0].time, 7.0 * 0.032, epsilon = 1e-12);
    assert!(events[1].activated);
    approx::assert_relative_eq!(events[1].time, 10.0 * 0.032, epsilon = 1e-12);
    assert!(events.iter().all(|ev| ev.time > 0.2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn chunks_are_scored_and_reported_in_push_order() {
    let probabilities = [0.9, 0.1, 0.9, 0.1, 0.9, 0.1];
    let (classifier, seen) = ScriptedClassifier::new(&probabilities);
    let classifier = classifier.with_delay(Duration::from_millis(5));
    let session = ready_session(VadConfig::default(), classifier).await;
    let events = collect_events(&session);

    // C1, C2, C3: two frames each, tagged by their sample value.
    for tag in [0.1f32, 0.2, 0.3] {
        session.push_audio_frame(vec![tag; 1024]);
    }
    session.close().await;

    let tags: Vec<f32> = seen.lock().iter().map(|call| call.frame[0]).collect();
    assert_eq!(tags, vec![0.1, 0.1, 0.2, 0.2, 0.3, 0.3]);

    let events = events.lock().clone();
    assert_eq!(events.len(), 6);
    for (i, ev) in events.iter().enumerate() {
        assert_eq!(ev.activated, i % 2 == 0);
        approx::assert_relative_eq!(ev.time, (i + 1) as f64 * 0.032, epsilon = 1e-12);
    }
}

#[tokio::test]
async fn recurrent_state_is_threaded_through_every_call() {
    let (classifier, seen) = ScriptedClassifier::new(&[0.0]);
    let session = ready_session(VadConfig::default(), classifier).await;

    session.push_audio_frame(vec![0.0f32; 700]);
    session.push_audio_frame(vec![0.0f32; 700]);
    session.push_audio_frame(vec![0.0f32; 700]);
    session.close().await;

    let seen = seen.lock();
    assert_eq!(seen.len(), 4);
    assert!(seen[0].state_in.is_zeroed());
    for (i, call) in seen.iter().enumerate().skip(1) {
        assert!(call.state_in.h.iter().all(|&v| v == i as f32));
        assert!(call.state_in.c.iter().all(|&v| v == -(i as f32)));
    }
}

#[tokio::test]
async fn inference_failure_skips_rest_of_chunk_and_keeps_state() {
    let (classifier, seen) = ScriptedClassifier::new(&[0.0]);
    let session = ready_session(VadConfig::default(), classifier.failing_on(1)).await;

    // Chunk A: three frames; the second fails and the third is skipped.
    session.push_audio_frame(vec![0.0f32; 512 * 3 + 10]);
    // Chunk B completes the next frame from the buffered tail.
    session.push_audio_frame(vec![0.0f32; 502]);
    let snap = session.close().await;

    assert_eq!(snap.chunks_in, 2);
    assert_eq!(snap.chunks_failed, 1);
    assert_eq!(snap.frames_completed, 4);
    assert_eq!(snap.inference_errors, 1);
    assert_eq!(snap.frames_skipped_after_error, 1);

    let seen = seen.lock();
    assert_eq!(seen.len(), 3, "frame 0, failed frame 1, chunk B frame");
    // Chunk B sees the state produced by frame 0, not by the failed call.
    assert!(seen[2].state_in.h.iter().all(|&v| v == 1.0));
}

#[tokio::test]
async fn frames_before_initialize_never_reach_the_classifier() {
    let (classifier, seen) = ScriptedClassifier::new(&[0.9]);
    let session =
        VadSession::new(VadConfig::default(), ClassifierHandle::new(classifier)).expect("session");
    let events = collect_events(&session);

    session.push_audio_frame(vec![0.0f32; 512 * 3]);
    session.flush().await.expect("flush");
    assert!(seen.lock().is_empty());
    assert!(events.lock().is_empty());

    session.initialize().await.expect("initialize");
    session.push_audio_frame(vec![0.0f32; 512]);
    let snap = session.close().await;

    assert_eq!(snap.frames_not_ready, 3);
    assert_eq!(snap.inference_calls, 1);
    let seen = seen.lock();
    assert!(seen[0].state_in.is_zeroed());

    let events = events.lock();
    assert_eq!(events.len(), 1);
    approx::assert_relative_eq!(events[0].time, 4.0 * 0.032, epsilon = 1e-12);
}

#[tokio::test]
async fn invalid_frame_size_is_rejected_without_touching_state() {
    let (classifier, seen) = ScriptedClassifier::new(&[0.9]);
    let handle = ClassifierHandle::new(classifier);
    let state = RecurrentState::zeroed();

    let err = handle.score(&[0.0; 480], &state).unwrap_err();
    assert!(matches!(err, VadError::InvalidFrameSize { len: 480 }));
    assert!(seen.lock().is_empty());
    assert!(state.is_zeroed());

    let score = handle.score(&[0.0; 512], &state).expect("valid frame");
    assert!(score.state.h.iter().all(|&v| v == 1.0));
}

#[tokio::test]
async fn second_callback_registration_fails() {
    let (classifier, _) = ScriptedClassifier::new(&[0.0]);
    let session = ready_session(VadConfig::default(), classifier).await;
    session.on_speech_event(|_| {}).expect("first callback");
    assert!(matches!(
        session.on_speech_event(|_| {}),
        Err(VadError::CallbackAlreadySet)
    ));
    session.close().await;
}

#[tokio::test]
async fn panicking_callback_does_not_stop_the_session() {
    let (classifier, seen) = ScriptedClassifier::new(&[0.9, 0.1]);
    let session = ready_session(VadConfig::default(), classifier).await;
    let mut rx = session.subscribe();
    session
        .on_speech_event(|ev| {
            if ev.activated {
                panic!("consumer failed on activation");
            }
        })
        .expect("register callback");

    session.push_audio_frame(vec![0.0f32; 512]);
    session.push_audio_frame(vec![0.0f32; 512]);
    session.flush().await.expect("worker still running");
    let snap = session.close().await;

    assert_eq!(seen.lock().len(), 2);
    assert_eq!(snap.chunks_in, 2);
    assert_eq!(snap.chunks_failed, 1);
    assert_eq!(snap.callback_panics, 1);
    assert_eq!(snap.events_emitted, 2);

    let start = rx.recv().await.expect("activation reaches subscribers");
    assert!(start.activated);
    let stop = rx.recv().await.expect("deactivation");
    assert!(!stop.activated);
    approx::assert_relative_eq!(stop.time, 2.0 * 0.032, epsilon = 1e-12);
}

#[tokio::test]
async fn overlapping_initialize_calls_keep_recurrent_state() {
    let (classifier, seen) = ScriptedClassifier::new(&[0.0]);
    let classifier = classifier.with_warm_up_delay(Duration::from_millis(100));
    let session =
        VadSession::new(VadConfig::default(), ClassifierHandle::new(classifier)).expect("session");

    // The second call starts while the first is still warming up, so both
    // queue an activation; frames land between the two.
    let first = async {
        session.initialize().await.expect("first initialize");
        session.push_audio_frame(vec![0.0f32; 1024]);
    };
    let second = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        session.initialize().await.expect("second initialize");
        session.push_audio_frame(vec![0.0f32; 512]);
    };
    tokio::join!(first, second);
    let snap = session.close().await;

    assert_eq!(snap.inference_calls, 3);
    let h: Vec<f32> = seen.lock().iter().map(|call| call.state_in.h[0]).collect();
    assert_eq!(h, vec![0.0, 1.0, 2.0]);
}
