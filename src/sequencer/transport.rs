// Transport - Playback control and state management
// Drives start/pause/seek, schedules tones ahead of the host audio clock and
// publishes the playhead position

use crate::audio::timing::HostClock;
use crate::config::{EndPolicy, TransportConfig};
use crate::instrument::InstrumentPlayer;
use crate::messaging::{EventBus, ListenerId};
use crate::mixer::Mixer;
use crate::score::ScoreEngine;
use crate::sequencer::scheduler::{Anchor, Scheduler};
use crate::sequencer::tempo_map::{Tempo, TempoMap, Tick};
use crate::sequencer::tone::Tone;

/// Transport state (play/stop)
///
/// Pausing and stopping are the same state: the clock halts and the
/// position is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
}

impl TransportState {
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing)
    }
}

/// Notifications published on the transport's event bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// Playhead position, once per frame while playing and after each seek
    Tick(Tick),
    Start,
    Stop,
}

/// One registered instrument: its player and the tones it plays in the current flow
struct Track {
    key: String,
    player: Box<dyn InstrumentPlayer>,
    /// Sorted by tick
    tones: Vec<Tone>,
}

/// Transport controller
///
/// Single threaded: the host calls `on_schedule_timer` from a coarse
/// periodic timer and `on_frame` from its redraw callback. Every control
/// call takes effect immediately, so the last call before the next timer
/// callback wins.
pub struct Transport {
    clock: Box<dyn HostClock>,
    config: TransportConfig,
    tempo_map: TempoMap,
    mixer: Mixer,
    tracks: Vec<Track>,
    events: EventBus<TransportEvent>,
    state: TransportState,
    position: Tick,
    /// Fractional position the playhead halted at, until a seek or flow load moves it
    halted_at: Option<f64>,
    length: Tick,
    /// Valid only while playing
    anchor: Anchor,
    scheduler: Scheduler,
}

impl Transport {
    /// Create a stopped transport with no flow loaded
    pub fn new(clock: impl HostClock + 'static, config: TransportConfig) -> Self {
        let tempo_map = TempoMap::new(1).with_fallback_bpm(config.fallback_bpm);
        let scheduler = Scheduler::new(config.lookahead_seconds());

        Self {
            clock: Box::new(clock),
            config,
            tempo_map,
            mixer: Mixer::new(),
            tracks: Vec::new(),
            events: EventBus::new(),
            state: TransportState::Stopped,
            position: 0,
            halted_at: None,
            length: 0,
            anchor: Anchor::new(0.0, 0.0),
            scheduler,
        }
    }

    /// Register an instrument and route its player into a new mixer channel
    ///
    /// A player already registered under `key` is silenced and replaced.
    pub fn add_instrument(&mut self, key: &str, mut player: Box<dyn InstrumentPlayer>) {
        let channel = self.mixer.create_channel(key);
        player.connect(channel.node());

        match self.tracks.iter_mut().find(|t| t.key == key) {
            Some(track) => {
                track.player.stop_all();
                track.player = player;
                tracing::debug!(key, "instrument player replaced");
            }
            None => {
                self.tracks.push(Track {
                    key: key.to_string(),
                    player,
                    tones: Vec::new(),
                });
                tracing::debug!(key, "instrument added");
            }
        }
    }

    /// Silence and drop an instrument, disconnecting its mixer channel
    pub fn remove_instrument(&mut self, key: &str) -> bool {
        let Some(index) = self.tracks.iter().position(|t| t.key == key) else {
            return false;
        };

        let mut track = self.tracks.remove(index);
        track.player.stop_all();
        self.mixer.disconnect(key);
        tracing::debug!(key, "instrument removed");
        true
    }

    /// Replace the tones of one instrument
    ///
    /// While playing, tones before the already scheduled horizon are only
    /// picked up on the next seek or loop iteration.
    pub fn set_tones(&mut self, key: &str, mut tones: Vec<Tone>) -> bool {
        match self.tracks.iter_mut().find(|t| t.key == key) {
            Some(track) => {
                tones.sort_by_key(|t| t.tick);
                track.tones = tones;
                true
            }
            None => {
                tracing::warn!(key, "tones for unknown instrument ignored");
                false
            }
        }
    }

    /// Load a flow from the score engine and reset the playhead to 0
    ///
    /// Tones are read for every registered instrument, so instruments should
    /// be added first.
    pub fn load_flow(&mut self, score: &dyn ScoreEngine, flow_key: &str) {
        if self.state.is_playing() {
            self.pause();
        }

        self.length = score.flow_length(flow_key);
        self.tempo_map = TempoMap::from_events(score.flow_subdivisions(flow_key), score.flow_tempos(flow_key))
            .with_fallback_bpm(self.config.fallback_bpm);

        for track in &mut self.tracks {
            let mut tones = score.all_tones(flow_key, &track.key);
            tones.sort_by_key(|t| t.tick);
            track.tones = tones;
        }

        self.position = 0;
        self.halted_at = None;
        self.scheduler.reset(0);

        tracing::debug!(
            flow_key,
            length = self.length,
            subdivisions = self.tempo_map.subdivisions(),
            tempos = self.tempo_map.len(),
            "flow loaded"
        );
        self.events.emit(&TransportEvent::Tick(0));
    }

    /// Start playback from the current position
    ///
    /// Resumes from the exact point a pause halted at, so a tone that had
    /// already begun is not restarted. At the end of the flow this does
    /// nothing under the stop policy and restarts from tick 0 when looping.
    pub fn start(&mut self) {
        if self.state.is_playing() {
            return;
        }

        let mut position = self.halted_at.take().unwrap_or(self.position as f64);
        if position >= self.length as f64 {
            if !self.loops() {
                tracing::debug!(position = self.position, length = self.length, "start at end of flow ignored");
                return;
            }
            position = 0.0;
        }

        self.state = TransportState::Playing;
        self.reanchor_at(position);
        tracing::debug!(position = self.position, "transport started");
        self.events.emit(&TransportEvent::Start);
        self.schedule();
    }

    /// Halt playback and silence every scheduled or sounding note
    ///
    /// The position is kept at the tick playing when pause was called.
    pub fn pause(&mut self) {
        if !self.state.is_playing() {
            return;
        }

        let position = self.current_position();
        self.position = whole_tick(position);
        self.halted_at = Some(position);
        self.state = TransportState::Stopped;
        self.silence();
        self.scheduler.reset(self.position);
        tracing::debug!(position = self.position, "transport paused");
        self.events.emit(&TransportEvent::Stop);
    }

    /// Move the playhead, clamped to the flow length
    ///
    /// Play state is unchanged. While playing, pending notes are cancelled
    /// and scheduling restarts from the new position.
    pub fn seek(&mut self, tick: Tick) {
        let position = tick.min(self.length);
        if position != tick {
            tracing::debug!(tick, length = self.length, "seek clamped to flow length");
        }
        self.position = position;
        self.halted_at = None;

        if self.state.is_playing() {
            self.silence();
            self.reanchor_at(position as f64);
            self.schedule();
        } else {
            self.scheduler.reset(position);
        }

        tracing::debug!(position, "seek");
        self.events.emit(&TransportEvent::Tick(position));
    }

    /// Replace the tempo map, keeping the flow's subdivisions and the
    /// configured fallback tempo
    ///
    /// While playing the current position is kept: deadlines derived from
    /// the old map are cancelled and rescheduled from here.
    pub fn set_tempo_map(&mut self, mut tempo_map: TempoMap) {
        tempo_map.set_subdivisions(self.tempo_map.subdivisions());
        tempo_map.set_fallback_bpm(self.config.fallback_bpm);
        self.retime(|map| *map = tempo_map);
    }

    /// Add one tempo event to the current map
    pub fn insert_tempo(&mut self, tempo: Tempo) {
        self.retime(|map| map.insert(tempo));
    }

    /// Coarse timer callback: schedule the next lookahead window
    pub fn on_schedule_timer(&mut self) {
        if self.state.is_playing() {
            self.schedule();
        }
    }

    /// Frame callback: publish the interpolated playhead and handle the end of the flow
    pub fn on_frame(&mut self) {
        if !self.state.is_playing() {
            return;
        }

        let now = self.clock.now();
        let mut tick = self.anchor.tick_at(&self.tempo_map, now);

        if tick >= self.length {
            match self.config.end_policy {
                EndPolicy::Loop if self.length > 0 => {
                    let loop_start = self.anchor.host_time(&self.tempo_map, self.length as f64);
                    self.anchor = Anchor::new(loop_start, 0.0);
                    self.scheduler.begin_next_iteration();
                    tick = self.anchor.tick_at(&self.tempo_map, now).min(self.length);
                    tracing::debug!(tick, "loop wrapped");
                }
                _ => {
                    self.finish();
                    return;
                }
            }
        }

        self.position = tick;
        self.events.emit(&TransportEvent::Tick(tick));
    }

    /// Subscribe to transport events
    pub fn subscribe(&mut self, listener: impl FnMut(&TransportEvent) + 'static) -> ListenerId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Event bus, for bridging events elsewhere
    pub fn events_mut(&mut self) -> &mut EventBus<TransportEvent> {
        &mut self.events
    }

    /// Last published playhead position
    pub fn position(&self) -> Tick {
        self.position
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    /// Ticks per quarter note of the loaded flow
    pub fn subdivisions(&self) -> u32 {
        self.tempo_map.subdivisions()
    }

    /// Length of the loaded flow in ticks
    pub fn length(&self) -> Tick {
        self.length
    }

    pub fn tempo_map(&self) -> &TempoMap {
        &self.tempo_map
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    /// Mixer, for mute/solo/volume calls from the UI
    pub fn mixer_mut(&mut self) -> &mut Mixer {
        &mut self.mixer
    }

    /// Keys of the registered instruments, in registration order
    pub fn instrument_keys(&self) -> impl Iterator<Item = &str> {
        self.tracks.iter().map(|t| t.key.as_str())
    }

    /// Host clock time in seconds
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    fn loops(&self) -> bool {
        self.config.end_policy == EndPolicy::Loop && self.length > 0
    }

    /// Fractional position playing right now
    ///
    /// Wrapped into the flow when looping, clamped to it otherwise, so it
    /// stays correct even when no frame callback has run since the end.
    fn current_position(&self) -> f64 {
        if !self.state.is_playing() {
            return self.halted_at.unwrap_or(self.position as f64);
        }

        let mut seconds = self.anchor.seconds + (self.clock.now() - self.anchor.host_time);
        if self.loops() {
            let total = self.tempo_map.tick_to_seconds(self.length);
            if total > 0.0 && seconds >= total {
                seconds = seconds.rem_euclid(total);
            }
        }
        self.tempo_map.seconds_to_position(seconds).min(self.length as f64)
    }

    /// Pin a fractional position to "now" and forget scheduled windows
    ///
    /// Scheduling resumes at the first tick not yet reached.
    fn reanchor_at(&mut self, position: f64) {
        self.position = whole_tick(position);
        self.anchor = Anchor::at_position(&self.tempo_map, self.clock.now(), position);
        self.scheduler.reset(first_unplayed_tick(position));
    }

    fn retime(&mut self, edit: impl FnOnce(&mut TempoMap)) {
        if !self.state.is_playing() {
            edit(&mut self.tempo_map);
            return;
        }

        let position = self.current_position();
        edit(&mut self.tempo_map);
        self.silence();
        self.reanchor_at(position);
        tracing::debug!(position = self.position, "tempo changed while playing");
        self.schedule();
    }

    /// Natural end of the flow under the stop policy
    fn finish(&mut self) {
        self.position = self.length;
        self.halted_at = None;
        self.state = TransportState::Stopped;
        self.scheduler.reset(self.length);
        tracing::debug!(length = self.length, "reached end of flow");
        self.events.emit(&TransportEvent::Tick(self.length));
        self.events.emit(&TransportEvent::Stop);
    }

    fn silence(&mut self) {
        for track in &mut self.tracks {
            track.player.stop_all();
        }
    }

    /// Forward the next lookahead window's notes to the players
    fn schedule(&mut self) {
        let now = self.clock.now();
        let notes = self.scheduler.process(
            now,
            &self.anchor,
            &self.tempo_map,
            self.length,
            self.config.end_policy,
            self.tracks.iter().map(|t| t.tones.as_slice()),
        );

        for note in notes {
            let track = &mut self.tracks[note.track];
            if let Err(e) = track.player.play(note.expression, note.pitch, note.time, note.duration) {
                // One bad note must not silence the rest of the flow
                tracing::warn!(
                    instrument = %track.key,
                    tick = note.tick,
                    pitch = note.pitch,
                    error = %e,
                    "note skipped"
                );
            }
        }
    }
}

// Absorb rounding noise so a position on a tick boundary keeps that tick
const TICK_EPSILON: f64 = 1e-6;

fn whole_tick(position: f64) -> Tick {
    (position + TICK_EPSILON).floor().clamp(0.0, Tick::MAX as f64) as Tick
}

fn first_unplayed_tick(position: f64) -> Tick {
    (position - TICK_EPSILON).ceil().clamp(0.0, Tick::MAX as f64) as Tick
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("state", &self.state)
            .field("position", &self.position)
            .field("length", &self.length)
            .field("subdivisions", &self.tempo_map.subdivisions())
            .field("instruments", &self.tracks.len())
            .finish()
    }
}
