// Score engine boundary - What the transport reads from the document model
//
// The document model owns flows, instruments and notes. Playback only needs
// a read-only snapshot of one flow: its length, resolution, tempo events and
// the tones of each instrument.

use crate::sequencer::tempo_map::{Tempo, TempoMap, Tick};
use crate::sequencer::tone::Tone;
use std::collections::HashMap;

/// Read access to the external score engine
pub trait ScoreEngine {
    /// Length of a flow in ticks
    fn flow_length(&self, flow_key: &str) -> Tick;

    /// Ticks per quarter note in a flow
    fn flow_subdivisions(&self, flow_key: &str) -> u32;

    /// Tempo events of a flow, in document order
    fn flow_tempos(&self, flow_key: &str) -> Vec<Tempo>;

    /// Every tone an instrument plays in a flow
    fn all_tones(&self, flow_key: &str, instrument_key: &str) -> Vec<Tone>;

    /// Human readable position, for display only
    fn timestamp(&self, flow_key: &str, tick: Tick) -> String;
}

/// Format seconds as `m:ss.mmm`
pub fn format_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let minutes = total_ms / 60_000;
    let secs = (total_ms / 1000) % 60;
    let millis = total_ms % 1000;
    format!("{}:{:02}.{:03}", minutes, secs, millis)
}

/// One flow held by `MemoryScore`
#[derive(Debug, Clone, Default)]
pub struct FlowData {
    pub length: Tick,
    pub subdivisions: u32,
    pub tempos: Vec<Tempo>,
    pub tones: HashMap<String, Vec<Tone>>,
}

impl FlowData {
    pub fn new(length: Tick, subdivisions: u32) -> Self {
        Self {
            length,
            subdivisions,
            ..Default::default()
        }
    }

    pub fn with_tempo(mut self, tempo: Tempo) -> Self {
        self.tempos.push(tempo);
        self
    }

    pub fn with_tone(mut self, instrument_key: &str, tone: Tone) -> Self {
        self.tones
            .entry(instrument_key.to_string())
            .or_default()
            .push(tone);
        self
    }
}

/// In-memory score engine
///
/// Unknown flows and instruments read as empty.
#[derive(Debug, Clone, Default)]
pub struct MemoryScore {
    flows: HashMap<String, FlowData>,
}

impl MemoryScore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_flow(&mut self, flow_key: &str, flow: FlowData) {
        self.flows.insert(flow_key.to_string(), flow);
    }

    pub fn with_flow(mut self, flow_key: &str, flow: FlowData) -> Self {
        self.insert_flow(flow_key, flow);
        self
    }

    pub fn flow(&self, flow_key: &str) -> Option<&FlowData> {
        self.flows.get(flow_key)
    }
}

impl ScoreEngine for MemoryScore {
    fn flow_length(&self, flow_key: &str) -> Tick {
        self.flow(flow_key).map(|f| f.length).unwrap_or(0)
    }

    fn flow_subdivisions(&self, flow_key: &str) -> u32 {
        self.flow(flow_key).map(|f| f.subdivisions).unwrap_or(1)
    }

    fn flow_tempos(&self, flow_key: &str) -> Vec<Tempo> {
        self.flow(flow_key)
            .map(|f| f.tempos.clone())
            .unwrap_or_default()
    }

    fn all_tones(&self, flow_key: &str, instrument_key: &str) -> Vec<Tone> {
        self.flow(flow_key)
            .and_then(|f| f.tones.get(instrument_key))
            .cloned()
            .unwrap_or_default()
    }

    fn timestamp(&self, flow_key: &str, tick: Tick) -> String {
        let map = TempoMap::from_events(self.flow_subdivisions(flow_key), self.flow_tempos(flow_key));
        format_timestamp(map.tick_to_seconds(tick))
    }
}
