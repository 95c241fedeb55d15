// Scheduler - Lookahead note scheduling against the host audio clock
//
// Each pass covers the half-open tick window [next_tick, horizon) where the
// horizon is the tick reached `lookahead` seconds after "now". Windows never
// overlap, so every tone is handed to its player exactly once per iteration.

use crate::config::EndPolicy;
use crate::instrument::Expression;
use crate::sequencer::tempo_map::{TempoMap, Tick};
use crate::sequencer::tone::Tone;

/// Pins one point of the tempo map's timeline to the host clock
///
/// Everything derived from an anchor is invalid once the tempo map, the
/// position or the play state changes; the transport builds a new one then.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    /// Host clock time, in seconds
    pub host_time: f64,
    /// Tempo map time (seconds from tick 0) playing at `host_time`
    pub seconds: f64,
}

impl Anchor {
    pub fn new(host_time: f64, seconds: f64) -> Self {
        Self { host_time, seconds }
    }

    /// Anchor a (fractional) tick position at `host_time`
    pub fn at_position(map: &TempoMap, host_time: f64, position: f64) -> Self {
        Self::new(host_time, map.position_to_seconds(position))
    }

    /// Host time at which a (fractional) tick position sounds
    pub fn host_time(&self, map: &TempoMap, position: f64) -> f64 {
        self.host_time + (map.position_to_seconds(position) - self.seconds)
    }

    /// Fractional tick position playing at `host_time`
    pub fn position_at(&self, map: &TempoMap, host_time: f64) -> f64 {
        map.seconds_to_position(self.seconds + (host_time - self.host_time))
    }

    /// Whole tick playing at `host_time`
    pub fn tick_at(&self, map: &TempoMap, host_time: f64) -> Tick {
        map.seconds_to_tick(self.seconds + (host_time - self.host_time))
    }
}

/// A note ready to be forwarded to an instrument player
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledNote {
    /// Index of the track the tone came from
    pub track: usize,
    pub tick: Tick,
    pub expression: Expression,
    pub pitch: u8,
    /// Absolute host time of the note start
    pub time: f64,
    /// Sounding length in seconds
    pub duration: f64,
}

/// One tick window to enumerate, with the anchor its host times come from
#[derive(Debug, Clone, Copy)]
struct Window {
    anchor: Anchor,
    from: Tick,
    to: Tick,
}

/// Tracks which part of the flow has already been scheduled
#[derive(Debug, Clone)]
pub struct Scheduler {
    /// First tick not yet scheduled in the current iteration
    next_tick: Tick,
    /// First tick not yet scheduled in the following loop iteration
    wrapped_next: Option<Tick>,
    /// Lookahead window in seconds
    lookahead: f64,
}

impl Scheduler {
    pub fn new(lookahead: f64) -> Self {
        Self {
            next_tick: 0,
            wrapped_next: None,
            lookahead: lookahead.max(0.0),
        }
    }

    pub fn lookahead(&self) -> f64 {
        self.lookahead
    }

    pub fn next_tick(&self) -> Tick {
        self.next_tick
    }

    /// Ticks of the next loop iteration already scheduled, if any
    pub fn wrapped_next(&self) -> Option<Tick> {
        self.wrapped_next
    }

    /// Forget everything scheduled and resume from `position`
    pub fn reset(&mut self, position: Tick) {
        self.next_tick = position;
        self.wrapped_next = None;
    }

    /// Make the pre-scheduled part of the next loop iteration current
    pub fn begin_next_iteration(&mut self) {
        self.next_tick = self.wrapped_next.take().unwrap_or(0);
    }

    /// Run one lookahead pass at host time `now`
    ///
    /// `tracks` holds the tones of each instrument sorted by tick. Returned
    /// notes are grouped by track, ascending in time within a track.
    pub fn process<'a>(
        &mut self,
        now: f64,
        anchor: &Anchor,
        map: &TempoMap,
        length: Tick,
        policy: EndPolicy,
        tracks: impl IntoIterator<Item = &'a [Tone]>,
    ) -> Vec<ScheduledNote> {
        let horizon_time = now + self.lookahead;
        let mut windows: Vec<Window> = Vec::with_capacity(2);

        let horizon = anchor.position_at(map, horizon_time);
        if let Some(window) = self.advance(*anchor, horizon, length) {
            windows.push(window);
        }

        if policy == EndPolicy::Loop && length > 0 && horizon >= length as f64 {
            // The window runs past the end: start on the next iteration
            let next = Anchor::new(anchor.host_time(map, length as f64), 0.0);
            let horizon = next.position_at(map, horizon_time);
            let from = self.wrapped_next.unwrap_or(0);
            let to = window_end(horizon, length);
            if to > from {
                self.wrapped_next = Some(to);
                windows.push(Window {
                    anchor: next,
                    from,
                    to,
                });
            }
        }

        if windows.is_empty() {
            return Vec::new();
        }

        let mut notes = Vec::new();
        for (track, tones) in tracks.into_iter().enumerate() {
            for window in &windows {
                collect(track, tones, window, map, &mut notes);
            }
        }

        tracing::trace!(
            now,
            horizon,
            next_tick = self.next_tick,
            notes = notes.len(),
            "scheduling pass"
        );
        notes
    }

    /// Claim the current iteration's ticks up to `horizon`
    fn advance(&mut self, anchor: Anchor, horizon: f64, length: Tick) -> Option<Window> {
        let from = self.next_tick;
        let to = window_end(horizon, length);
        if to <= from {
            return None;
        }
        self.next_tick = to;
        Some(Window { anchor, from, to })
    }
}

/// Exclusive end tick of a window whose horizon is the fractional `horizon`
fn window_end(horizon: f64, length: Tick) -> Tick {
    // A tone exactly on the horizon belongs to the next window
    horizon.ceil().clamp(0.0, length as f64) as Tick
}

fn collect(track: usize, tones: &[Tone], window: &Window, map: &TempoMap, notes: &mut Vec<ScheduledNote>) {
    let lo = tones.partition_point(|t| t.tick < window.from);
    let hi = tones.partition_point(|t| t.tick < window.to);

    for tone in &tones[lo..hi] {
        let time = window.anchor.host_time(map, tone.tick as f64);
        let end = window.anchor.host_time(map, tone.sounding_end());
        notes.push(ScheduledNote {
            track,
            tick: tone.tick,
            expression: tone.expression(),
            pitch: tone.pitch.int,
            time,
            duration: (end - time).max(0.0),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::tempo_map::Tempo;
    use crate::sequencer::tone::{Articulation, Pitch};

    // 120 BPM, 48 ticks per beat: 96 ticks per second
    fn map() -> TempoMap {
        TempoMap::from_events(48, [Tempo::constant(0, 120.0)])
    }

    fn tone(tick: Tick, pitch: u8) -> Tone {
        Tone::new(format!("t{}", tick), tick, 48, Pitch::natural(pitch), 100)
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_anchor_maps_ticks_to_host_time() {
        let map = map();
        let anchor = Anchor::at_position(&map, 10.0, 96.0);

        assert_close(anchor.host_time(&map, 96.0), 10.0);
        assert_close(anchor.host_time(&map, 192.0), 11.0);
        assert_close(anchor.position_at(&map, 10.5), 144.0);
        assert_eq!(anchor.tick_at(&map, 10.0), 96);
    }

    #[test]
    fn test_tone_on_window_boundary_scheduled_once() {
        let map = map();
        let anchor = Anchor::new(0.0, 0.0);
        let tones = vec![tone(100, 60)];

        let mut scheduler = Scheduler::new(0.1);
        let mut count = 0;
        for horizon in [99.5, 100.0, 100.0, 100.5, 150.0] {
            if let Some(window) = scheduler.advance(anchor, horizon, 192) {
                let mut notes = Vec::new();
                collect(0, &tones, &window, &map, &mut notes);
                count += notes.len();
            }
        }
        assert_eq!(count, 1);

        // Same tone when the boundary lands just past it
        let mut scheduler = Scheduler::new(0.1);
        let mut count = 0;
        for horizon in [100.0 + 1e-7, 100.9, 101.0] {
            if let Some(window) = scheduler.advance(anchor, horizon, 192) {
                let mut notes = Vec::new();
                collect(0, &tones, &window, &map, &mut notes);
                count += notes.len();
            }
        }
        assert_eq!(count, 1);
    }

    #[test]
    fn test_overlapping_passes_never_double_fire() {
        let map = map();
        let anchor = Anchor::new(0.0, 0.0);
        let tones: Vec<Tone> = (0..20).map(|i| tone(i * 10, 60)).collect();
        let mut scheduler = Scheduler::new(0.1);

        let mut ticks = Vec::new();
        let mut now = 0.0;
        while now < 3.0 {
            let notes = scheduler.process(now, &anchor, &map, 192, EndPolicy::Stop, [tones.as_slice()]);
            ticks.extend(notes.iter().map(|n| n.tick));
            // Passes 10 ms apart with a 100 ms lookahead overlap heavily
            now += 0.01;
        }

        let expected: Vec<Tick> = (0..20).map(|i| i * 10).filter(|t| *t < 192).collect();
        assert_eq!(ticks, expected);
    }

    #[test]
    fn test_notes_carry_host_time_and_articulation() {
        let map = map();
        let anchor = Anchor::at_position(&map, 5.0, 0.0);
        let tones = vec![tone(48, 60).with_articulation(Articulation::Staccato)];
        let mut scheduler = Scheduler::new(0.1);

        let notes = scheduler.process(5.45, &anchor, &map, 192, EndPolicy::Stop, [tones.as_slice()]);

        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].expression, Expression::Staccato);
        assert_eq!(notes[0].pitch, 60);
        assert_close(notes[0].time, 5.5);
        assert_close(notes[0].duration, 0.25);
    }

    #[test]
    fn test_tones_before_start_are_skipped() {
        let map = map();
        let mut scheduler = Scheduler::new(0.1);
        scheduler.reset(50);
        let anchor = Anchor::at_position(&map, 0.0, 50.0);
        let tones = vec![tone(48, 60), tone(52, 62)];

        let notes = scheduler.process(0.0, &anchor, &map, 192, EndPolicy::Stop, [tones.as_slice()]);

        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].tick, 52);
    }

    #[test]
    fn test_window_clamped_to_length() {
        let map = map();
        let anchor = Anchor::new(0.0, 0.0);
        let tones = vec![tone(150, 60), tone(192, 62), tone(200, 64)];
        let mut scheduler = Scheduler::new(0.1);

        let notes = scheduler.process(5.0, &anchor, &map, 192, EndPolicy::Stop, [tones.as_slice()]);

        assert_eq!(notes.len(), 1);
        assert_eq!(scheduler.next_tick(), 192);
    }

    #[test]
    fn test_loop_preschedules_next_iteration() {
        let map = map();
        let anchor = Anchor::new(0.0, 0.0);
        let tones = vec![tone(0, 60), tone(190, 62)];
        let mut scheduler = Scheduler::new(0.1);

        // Horizon at 2.05 s crosses the end (2.0 s) by 0.05 s
        let notes = scheduler.process(1.95, &anchor, &map, 192, EndPolicy::Loop, [tones.as_slice()]);
        let ticks: Vec<Tick> = notes.iter().map(|n| n.tick).collect();
        assert_eq!(ticks, vec![0, 190, 0]);
        assert_close(notes[2].time, 2.0);

        // The downbeat already went out; the next iteration resumes after it
        scheduler.begin_next_iteration();
        assert!(scheduler.next_tick() > 0);
        assert_eq!(scheduler.wrapped_next(), None);
    }

    #[test]
    fn test_stop_policy_never_wraps() {
        let map = map();
        let anchor = Anchor::new(0.0, 0.0);
        let tones = vec![tone(0, 60)];
        let mut scheduler = Scheduler::new(0.1);

        let notes = scheduler.process(1.95, &anchor, &map, 192, EndPolicy::Stop, [tones.as_slice()]);

        assert_eq!(notes.len(), 1);
        assert_eq!(scheduler.wrapped_next(), None);
    }

    #[test]
    fn test_notes_grouped_per_track_in_order() {
        let map = map();
        let anchor = Anchor::new(0.0, 0.0);
        let a = vec![tone(0, 60), tone(4, 61)];
        let b = vec![tone(2, 70)];
        let mut scheduler = Scheduler::new(0.1);

        let notes = scheduler.process(0.0, &anchor, &map, 192, EndPolicy::Stop, [a.as_slice(), b.as_slice()]);

        let order: Vec<(usize, Tick)> = notes.iter().map(|n| (n.track, n.tick)).collect();
        assert_eq!(order, vec![(0, 0), (0, 4), (1, 2)]);
    }
}
