// Tempo map - Tick positions to tempo and real time
// Handles instantaneous tempo changes and linear tempo ramps

use std::fmt;

/// Musical time unit; `subdivisions` ticks make one quarter note
pub type Tick = u32;

/// Lowest tempo accepted by the map (BPM)
pub const MIN_BPM: f64 = 20.0;
/// Highest tempo accepted by the map (BPM)
pub const MAX_BPM: f64 = 999.0;
/// Tempo used before the first tempo event
pub const DEFAULT_BPM: f64 = 120.0;

const SLOPE_EPSILON: f64 = 1e-12;

/// A tempo event
///
/// With `duration == 0` this is an instantaneous change to `to` at tick `at`.
/// Otherwise the tempo ramps linearly from `from` to `to` over
/// `[at, at + duration)` and stays at `to` afterwards.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tempo {
    pub at: Tick,
    pub to: f64,
    pub from: f64,
    pub duration: Tick,
}

impl Tempo {
    /// Instantaneous tempo change
    pub fn constant(at: Tick, bpm: f64) -> Self {
        Self {
            at,
            to: bpm,
            from: bpm,
            duration: 0,
        }
    }

    /// Linear ramp from `from` to `to` over `duration` ticks
    pub fn ramp(at: Tick, from: f64, to: f64, duration: Tick) -> Self {
        Self {
            at,
            to,
            from,
            duration,
        }
    }

    /// First tick at which the tempo is exactly `to`
    pub fn end(&self) -> Tick {
        self.at.saturating_add(self.duration)
    }

    /// True when `tick` falls inside the ramp window
    pub fn is_ramping_at(&self, tick: Tick) -> bool {
        self.duration > 0 && tick >= self.at && tick < self.end()
    }

    fn sanitized(self) -> Self {
        let clamp = |bpm: f64| {
            if bpm.is_finite() {
                bpm.clamp(MIN_BPM, MAX_BPM)
            } else {
                DEFAULT_BPM
            }
        };
        Self {
            to: clamp(self.to),
            from: clamp(self.from),
            ..self
        }
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.duration == 0 {
            write!(f, "{:.1} BPM @ {}", self.to, self.at)
        } else {
            write!(
                f,
                "{:.1} -> {:.1} BPM @ {}..{}",
                self.from,
                self.to,
                self.at,
                self.end()
            )
        }
    }
}

/// A span of ticks over which the tempo is linear in ticks
#[derive(Debug, Clone, Copy)]
struct Segment {
    start: f64,
    end: f64,
    /// Tempo at `start`
    bpm: f64,
    /// BPM change per tick (0 for constant spans)
    slope: f64,
    /// Real time elapsed between tick 0 and `start`
    start_seconds: f64,
}

impl Segment {
    /// Seconds taken to advance `ticks` ticks from the segment start
    ///
    /// Integrates 60 / (bpm(x) * subdivisions) analytically; for a ramp the
    /// integral is logarithmic in the tempo ratio.
    fn elapsed(&self, ticks: f64, subdivisions: f64) -> f64 {
        if self.slope.abs() < SLOPE_EPSILON {
            return 60.0 * ticks / (subdivisions * self.bpm);
        }
        60.0 / (subdivisions * self.slope) * (self.slope * ticks / self.bpm).ln_1p()
    }

    /// Inverse of `elapsed`
    fn ticks_in(&self, seconds: f64, subdivisions: f64) -> f64 {
        if self.slope.abs() < SLOPE_EPSILON {
            return seconds * subdivisions * self.bpm / 60.0;
        }
        self.bpm / self.slope * (seconds * subdivisions * self.slope / 60.0).exp_m1()
    }
}

/// Ordered tempo events for one flow
///
/// Events are kept sorted by `at`; among events sharing a tick the one
/// inserted last wins. Conversions to and from seconds go through cached
/// per-segment start times, so every lookup is a binary search plus one
/// closed-form evaluation and error does not build up over long flows.
#[derive(Debug, Clone)]
pub struct TempoMap {
    events: Vec<Tempo>,
    segments: Vec<Segment>,
    subdivisions: u32,
    fallback_bpm: f64,
}

impl TempoMap {
    /// Create an empty map for a flow with the given ticks per quarter note
    pub fn new(subdivisions: u32) -> Self {
        let mut map = Self {
            events: Vec::new(),
            segments: Vec::new(),
            subdivisions: subdivisions.max(1),
            fallback_bpm: DEFAULT_BPM,
        };
        map.rebuild();
        map
    }

    /// Create a map from events in insertion order
    pub fn from_events(subdivisions: u32, events: impl IntoIterator<Item = Tempo>) -> Self {
        let mut map = Self::new(subdivisions);
        for tempo in events {
            map.insert_unchecked(tempo);
        }
        map.rebuild();
        map
    }

    /// Set the tempo assumed before the first event
    pub fn with_fallback_bpm(mut self, bpm: f64) -> Self {
        self.set_fallback_bpm(bpm);
        self
    }

    pub fn set_fallback_bpm(&mut self, bpm: f64) {
        self.fallback_bpm = Tempo::constant(0, bpm).sanitized().to;
        self.rebuild();
    }

    pub fn fallback_bpm(&self) -> f64 {
        self.fallback_bpm
    }

    pub fn subdivisions(&self) -> u32 {
        self.subdivisions
    }

    pub fn set_subdivisions(&mut self, subdivisions: u32) {
        self.subdivisions = subdivisions.max(1);
        self.rebuild();
    }

    /// Add a tempo event
    pub fn insert(&mut self, tempo: Tempo) {
        self.insert_unchecked(tempo);
        self.rebuild();
    }

    fn insert_unchecked(&mut self, tempo: Tempo) {
        let tempo = tempo.sanitized();
        let index = self.events.partition_point(|e| e.at <= tempo.at);
        self.events.insert(index, tempo);
    }

    /// Remove every event anchored at `tick`, returning how many were removed
    pub fn remove_at(&mut self, tick: Tick) -> usize {
        let before = self.events.len();
        self.events.retain(|e| e.at != tick);
        let removed = before - self.events.len();
        if removed > 0 {
            self.rebuild();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.rebuild();
    }

    pub fn events(&self) -> &[Tempo] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Tempo at `tick`, or `None` if no event starts at or before it
    pub fn tempo_at(&self, tick: Tick) -> Option<f64> {
        let index = self.events.partition_point(|e| e.at <= tick);
        let tempo = self.events.get(index.checked_sub(1)?)?;

        if tempo.is_ramping_at(tick) {
            let progress = (tick - tempo.at) as f64 / tempo.duration as f64;
            Some(tempo.from + progress * (tempo.to - tempo.from))
        } else {
            Some(tempo.to)
        }
    }

    /// Tempo at `tick`, falling back to the map's default
    pub fn bpm_at(&self, tick: Tick) -> f64 {
        self.tempo_at(tick).unwrap_or(self.fallback_bpm)
    }

    /// Real time from tick 0 to `tick`, in seconds
    pub fn tick_to_seconds(&self, tick: Tick) -> f64 {
        self.position_to_seconds(tick as f64)
    }

    /// Real time from tick 0 to a fractional tick position, in seconds
    pub fn position_to_seconds(&self, position: f64) -> f64 {
        let position = position.max(0.0);
        let segment = self.segment_at_tick(position);
        segment.start_seconds + segment.elapsed(position - segment.start, self.subdivisions as f64)
    }

    /// Fractional tick position reached after `seconds` of playback from tick 0
    pub fn seconds_to_position(&self, seconds: f64) -> f64 {
        let seconds = seconds.max(0.0);
        let segment = self.segment_at_seconds(seconds);
        segment.start + segment.ticks_in(seconds - segment.start_seconds, self.subdivisions as f64)
    }

    /// Whole tick reached after `seconds` of playback from tick 0
    pub fn seconds_to_tick(&self, seconds: f64) -> Tick {
        // Absorb rounding noise so exact tick boundaries do not floor down
        let position = self.seconds_to_position(seconds) + 1e-9;
        position.floor().min(Tick::MAX as f64) as Tick
    }

    fn segment_at_tick(&self, position: f64) -> &Segment {
        let index = self.segments.partition_point(|s| s.start <= position);
        &self.segments[index.saturating_sub(1)]
    }

    fn segment_at_seconds(&self, seconds: f64) -> &Segment {
        let index = self.segments.partition_point(|s| s.start_seconds <= seconds);
        &self.segments[index.saturating_sub(1)]
    }

    fn rebuild(&mut self) {
        let subdivisions = self.subdivisions as f64;
        let mut segments: Vec<Segment> = Vec::with_capacity(self.events.len() * 2 + 1);
        let mut push = |start: f64, end: f64, bpm: f64, slope: f64| {
            if end <= start {
                return;
            }
            let start_seconds = segments
                .last()
                .map(|s| s.start_seconds + s.elapsed(s.end - s.start, subdivisions))
                .unwrap_or(0.0);
            segments.push(Segment {
                start,
                end,
                bpm,
                slope,
                start_seconds,
            });
        };

        let first_at = self
            .events
            .first()
            .map(|e| e.at as f64)
            .unwrap_or(f64::INFINITY);
        push(0.0, first_at, self.fallback_bpm, 0.0);

        for (index, tempo) in self.events.iter().enumerate() {
            let at = tempo.at as f64;
            let next = self
                .events
                .get(index + 1)
                .map(|e| e.at as f64)
                .unwrap_or(f64::INFINITY);

            if tempo.duration > 0 {
                let ramp_end = at + tempo.duration as f64;
                let slope = (tempo.to - tempo.from) / tempo.duration as f64;
                push(at, ramp_end.min(next), tempo.from, slope);
                push(ramp_end, next, tempo.to, 0.0);
            } else {
                push(at, next, tempo.to, 0.0);
            }
        }

        self.segments = segments;
    }
}

impl Default for TempoMap {
    fn default() -> Self {
        Self::new(1)
    }
}
