// Recording player - InstrumentPlayer that records every call instead of producing sound
// Used headless, in tests and in benchmarks

use crate::audio::gain::GainNode;
use crate::instrument::{Expression, InstrumentPlayer, PlayerError, PlayerResult};
use std::sync::{Arc, Mutex, MutexGuard};

/// One accepted `play` call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayCall {
    pub expression: Expression,
    pub pitch: u8,
    pub time: f64,
    pub duration: f64,
}

#[derive(Debug, Default)]
struct Journal {
    calls: Vec<PlayCall>,
    /// Calls accepted since the last `stop_all`
    pending: usize,
    stop_count: usize,
    failing_pitches: Vec<u8>,
    destination: Option<GainNode>,
}

/// Player that journals calls into shared state
///
/// Clones share the journal, so a test can keep one handle while the
/// transport owns the boxed player.
#[derive(Debug, Clone)]
pub struct RecordingPlayer {
    journal: Arc<Mutex<Journal>>,
    output: GainNode,
}

impl RecordingPlayer {
    pub fn new() -> Self {
        Self {
            journal: Arc::new(Mutex::new(Journal::default())),
            output: GainNode::new(),
        }
    }

    fn journal(&self) -> MutexGuard<'_, Journal> {
        // A poisoned journal only means another test thread panicked
        self.journal.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make `play` fail for this pitch, as a broken host voice would
    pub fn fail_on_pitch(&self, pitch: u8) {
        self.journal().failing_pitches.push(pitch);
    }

    /// Every accepted call, in order
    pub fn calls(&self) -> Vec<PlayCall> {
        self.journal().calls.clone()
    }

    /// Number of notes accepted since the last `stop_all`
    pub fn pending(&self) -> usize {
        self.journal().pending
    }

    pub fn stop_count(&self) -> usize {
        self.journal().stop_count
    }

    /// Channel node this player was routed into, if any
    pub fn destination(&self) -> Option<GainNode> {
        self.journal().destination.clone()
    }

    pub fn clear(&self) {
        let mut journal = self.journal();
        journal.calls.clear();
        journal.pending = 0;
        journal.stop_count = 0;
    }
}

impl Default for RecordingPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl InstrumentPlayer for RecordingPlayer {
    fn play(&mut self, expression: Expression, pitch: u8, time: f64, duration: f64) -> PlayerResult<()> {
        let mut journal = self.journal();
        if journal.destination.as_ref().is_some_and(|node| !node.is_connected()) {
            return Err(PlayerError::Disconnected);
        }
        if journal.failing_pitches.contains(&pitch) {
            return Err(PlayerError::Rejected(format!("no sample for pitch {}", pitch)));
        }

        journal.calls.push(PlayCall {
            expression,
            pitch,
            time,
            duration,
        });
        journal.pending += 1;
        Ok(())
    }

    fn stop_all(&mut self) {
        let mut journal = self.journal();
        journal.pending = 0;
        journal.stop_count += 1;
    }

    fn output(&self) -> &GainNode {
        &self.output
    }

    fn connect(&mut self, destination: &GainNode) {
        self.journal().destination = Some(destination.clone());
    }
}
