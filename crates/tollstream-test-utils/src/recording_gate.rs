//! A playback gate that records what it was told.

use std::sync::{Arc, Mutex};

use tollstream_session::PlaybackGate;

/// One instruction received by a [`RecordingGate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateCall {
    Resume(Option<String>),
    Pause,
}

/// Records every resume and pause. Clones share the same log, so a test
/// can keep one clone and hand the other to the session.
#[derive(Debug, Clone, Default)]
pub struct RecordingGate {
    calls: Arc<Mutex<Vec<GateCall>>>,
}

impl RecordingGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// All calls, in order.
    pub fn calls(&self) -> Vec<GateCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn resume_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, GateCall::Resume(_)))
            .count()
    }

    pub fn pause_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, GateCall::Pause))
            .count()
    }

    /// Whether the last instruction allowed playback.
    pub fn is_playing(&self) -> bool {
        matches!(self.calls().last(), Some(GateCall::Resume(_)))
    }
}

impl PlaybackGate for RecordingGate {
    fn resume(&mut self, playback: Option<&str>) {
        self.calls
            .lock()
            .unwrap()
            .push(GateCall::Resume(playback.map(str::to_string)));
    }

    fn pause(&mut self) {
        self.calls.lock().unwrap().push(GateCall::Pause);
    }
}
