//! Backend → manager event path.
//!
//! Backends may signal from any thread; signals land in a shared queue that
//! only the manager drains, inside `Manager::tick`. That keeps every state
//! transition on one logical context.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::BackendKind;

/// Signal about one sound's backend resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundSignal {
    Loaded { duration_ms: Option<u64> },
    LoadFailed(String),
    Position(u64),
    Duration(u64),
    Finished,
    Error(String),
}

/// Signal about a backend driver's capability probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverSignal {
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BackendEvent {
    Driver {
        kind: BackendKind,
        generation: u64,
        signal: DriverSignal,
    },
    Sound {
        id: String,
        token: u64,
        signal: SoundSignal,
    },
}

/// Shared FIFO of backend events.
#[derive(Clone, Default)]
pub struct EventQueue {
    inner: Arc<Mutex<VecDeque<BackendEvent>>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, event: BackendEvent) {
        self.inner.lock().push_back(event);
    }

    pub(crate) fn drain(&self) -> Vec<BackendEvent> {
        self.inner.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub(crate) fn clear(&self) {
        self.inner.lock().clear();
    }
}

/// Handed to an adapter on every `load`. The token ties each signal to that
/// load; signals from a cancelled or superseded load are discarded.
#[derive(Clone)]
pub struct SoundSink {
    queue: EventQueue,
    id: String,
    token: u64,
}

impl SoundSink {
    pub(crate) fn new(queue: EventQueue, id: String, token: u64) -> Self {
        Self { queue, id, token }
    }

    pub fn sound_id(&self) -> &str {
        &self.id
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn emit(&self, signal: SoundSignal) {
        self.queue.push(BackendEvent::Sound {
            id: self.id.clone(),
            token: self.token,
            signal,
        });
    }

    pub fn loaded(&self, duration_ms: Option<u64>) {
        self.emit(SoundSignal::Loaded { duration_ms });
    }

    pub fn load_failed(&self, reason: impl Into<String>) {
        self.emit(SoundSignal::LoadFailed(reason.into()));
    }

    pub fn position(&self, ms: u64) {
        self.emit(SoundSignal::Position(ms));
    }

    pub fn duration(&self, ms: u64) {
        self.emit(SoundSignal::Duration(ms));
    }

    pub fn finished(&self) {
        self.emit(SoundSignal::Finished);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(SoundSignal::Error(message.into()));
    }
}

/// Handed to a driver on `probe`. The generation changes on every reboot.
#[derive(Clone)]
pub struct DriverSink {
    queue: EventQueue,
    kind: BackendKind,
    generation: u64,
}

impl DriverSink {
    pub(crate) fn new(queue: EventQueue, kind: BackendKind, generation: u64) -> Self {
        Self {
            queue,
            kind,
            generation,
        }
    }

    pub fn ready(&self) {
        self.emit(DriverSignal::Ready);
    }

    pub fn failed(&self, reason: impl Into<String>) {
        self.emit(DriverSignal::Failed(reason.into()));
    }

    fn emit(&self, signal: DriverSignal) {
        self.queue.push(BackendEvent::Driver {
            kind: self.kind,
            generation: self.generation,
            signal,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_tags_signals_with_id_and_token() {
        let queue = EventQueue::new();
        let sink = SoundSink::new(queue.clone(), "a".into(), 7);
        sink.loaded(Some(1200));
        sink.position(40);

        let events = queue.drain();
        assert_eq!(
            events,
            vec![
                BackendEvent::Sound {
                    id: "a".into(),
                    token: 7,
                    signal: SoundSignal::Loaded {
                        duration_ms: Some(1200)
                    },
                },
                BackendEvent::Sound {
                    id: "a".into(),
                    token: 7,
                    signal: SoundSignal::Position(40),
                },
            ]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn sinks_are_usable_from_other_threads() {
        let queue = EventQueue::new();
        let sink = SoundSink::new(queue.clone(), "t".into(), 1);
        std::thread::spawn(move || sink.finished())
            .join()
            .unwrap();
        assert_eq!(queue.len(), 1);
    }
}
