//! Delivery of `SpeechEvent`s to the session's consumers.
//!
//! Two paths, both optional:
//! - one callback, registered at most once, invoked on the worker task
//!   with panics caught;
//! - any number of `broadcast` subscribers.
//!
//! With neither present, events are computed and dropped.

use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;

use tokio::sync::broadcast;

use crate::error::{Result, VadError};
use crate::events::SpeechEvent;

/// Boxed speech event callback.
pub type SpeechCallback = Box<dyn Fn(SpeechEvent) + Send + Sync + 'static>;

/// Broadcast channel capacity: events buffered for slow subscribers.
const BROADCAST_CAP: usize = 256;

pub struct EventSink {
    callback: OnceLock<SpeechCallback>,
    tx: broadcast::Sender<SpeechEvent>,
}

impl EventSink {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAP);
        Self {
            callback: OnceLock::new(),
            tx,
        }
    }

    /// Register the callback.
    ///
    /// # Errors
    /// `VadError::CallbackAlreadySet` if one is already registered; the first
    /// callback stays active.
    pub fn set_callback(&self, callback: SpeechCallback) -> Result<()> {
        self.callback
            .set(callback)
            .map_err(|_| VadError::CallbackAlreadySet)
    }

    pub fn has_callback(&self) -> bool {
        self.callback.get().is_some()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SpeechEvent> {
        self.tx.subscribe()
    }

    /// Send `event` to subscribers, then to the callback.
    ///
    /// # Errors
    /// `VadError::CallbackPanicked` if the callback panics. The panic is
    /// contained here; subscribers have already received the event.
    pub fn deliver(&self, event: SpeechEvent) -> Result<()> {
        // No subscribers is not an error.
        let _ = self.tx.send(event);

        let Some(callback) = self.callback.get() else {
            return Ok(());
        };
        panic::catch_unwind(AssertUnwindSafe(|| callback(event)))
            .map_err(|payload| VadError::CallbackPanicked(panic_message(payload.as_ref())))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("has_callback", &self.has_callback())
            .field("subscribers", &self.tx.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn deliver_without_consumers_is_a_no_op() {
        let sink = EventSink::new();
        sink.deliver(SpeechEvent {
            time: 0.1,
            activated: true,
        })
        .expect("deliver");
        assert!(!sink.has_callback());
    }

    #[test]
    fn second_callback_is_rejected_and_first_stays_active() {
        let sink = EventSink::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&seen);
        sink.set_callback(Box::new(move |ev| first.lock().unwrap().push(("first", ev))))
            .expect("first registration");

        let second = Arc::clone(&seen);
        let err = sink
            .set_callback(Box::new(move |ev| second.lock().unwrap().push(("second", ev))))
            .unwrap_err();
        assert!(matches!(err, VadError::CallbackAlreadySet));

        sink.deliver(SpeechEvent {
            time: 0.5,
            activated: false,
        })
        .expect("deliver");
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "first");
    }

    #[test]
    fn subscribers_receive_events_alongside_callback() {
        let sink = EventSink::new();
        let mut rx = sink.subscribe();
        let event = SpeechEvent {
            time: 0.064,
            activated: true,
        };
        sink.deliver(event).expect("deliver");
        assert_eq!(rx.try_recv().expect("event"), event);
    }

    #[test]
    fn panicking_callback_is_contained_and_subscribers_still_receive() {
        let sink = EventSink::new();
        let mut rx = sink.subscribe();
        sink.set_callback(Box::new(|ev| {
            if ev.activated {
                panic!("callback rejected activation");
            }
        }))
        .expect("register");

        let start = SpeechEvent {
            time: 0.032,
            activated: true,
        };
        let err = sink.deliver(start).unwrap_err();
        assert!(
            matches!(&err, VadError::CallbackPanicked(msg) if msg == "callback rejected activation")
        );
        assert_eq!(rx.try_recv().expect("event"), start);

        let stop = SpeechEvent {
            time: 0.064,
            activated: false,
        };
        sink.deliver(stop).expect("non-panicking delivery");
        assert_eq!(rx.try_recv().expect("event"), stop);
    }
}
