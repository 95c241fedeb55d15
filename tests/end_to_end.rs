//! End-to-end playback tests
//!
//! Drives a transport on a hand-advanced audio clock, the way a host would
//! from its schedule timer and redraw callback, and checks what reaches the
//! instrument players and the event listeners.

use score_playback::audio::timing::AudioTiming;
use score_playback::{
    EndPolicy, FlowData, MemoryScore, Pitch, RecordingPlayer, ScoreEngine, Tempo, Tone,
    Transport, TransportConfig, TransportEvent,
};
use std::cell::RefCell;
use std::rc::Rc;

const SAMPLE_RATE: f32 = 48_000.0;
/// 25 ms at 48 kHz, one schedule timer period
const FRAMES_PER_STEP: usize = 1200;

struct Harness {
    transport: Transport,
    timing: AudioTiming,
    events: Rc<RefCell<Vec<(f64, TransportEvent)>>>,
}

impl Harness {
    fn new(score: &MemoryScore, config: TransportConfig, players: &[(&str, RecordingPlayer)]) -> Self {
        let timing = AudioTiming::new(SAMPLE_RATE);
        let mut transport = Transport::new(timing.clone(), config);
        for (key, player) in players {
            transport.add_instrument(key, Box::new(player.clone()));
        }
        transport.load_flow(score, "flow");

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        let clock = timing.clone();
        transport.subscribe(move |e| {
            let now = clock.current_sample() as f64 / SAMPLE_RATE as f64;
            sink.borrow_mut().push((now, *e));
        });

        Self {
            transport,
            timing,
            events,
        }
    }

    fn step(&mut self) {
        self.timing.advance(FRAMES_PER_STEP);
        self.transport.on_schedule_timer();
        self.transport.on_frame();
    }

    fn run_until_stopped(&mut self, max_seconds: f64) {
        let max_steps = (max_seconds * SAMPLE_RATE as f64 / FRAMES_PER_STEP as f64) as usize;
        for _ in 0..max_steps {
            self.step();
            if !self.transport.is_playing() {
                return;
            }
        }
    }

    fn stop_times(&self) -> Vec<f64> {
        self.events
            .borrow()
            .iter()
            .filter(|(_, e)| *e == TransportEvent::Stop)
            .map(|(t, _)| *t)
            .collect()
    }
}

fn single_note_score() -> MemoryScore {
    MemoryScore::new().with_flow(
        "flow",
        FlowData::new(192, 48)
            .with_tempo(Tempo::constant(0, 120.0))
            .with_tone("x", Tone::new("n1", 48, 48, Pitch::natural(60), 100)),
    )
}

/// One beat in at 120 BPM the note plays at 0.5 s; four beats end at 2.0 s
#[test]
fn test_single_note_plays_once_and_stops_at_end() {
    let x = RecordingPlayer::new();
    let mut harness = Harness::new(&single_note_score(), TransportConfig::default(), &[("x", x.clone())]);

    harness.transport.start();
    harness.run_until_stopped(5.0);

    let calls = x.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].pitch, 60);
    assert!((calls[0].time - 0.5).abs() < 1e-9, "time was {}", calls[0].time);

    let stops = harness.stop_times();
    assert_eq!(stops.len(), 1);
    // Stop is seen on the first frame at or after 2.0 s
    assert!(stops[0] >= 2.0 - 1e-9 && stops[0] <= 2.025 + 1e-9, "stopped at {}", stops[0]);
    assert_eq!(harness.transport.position(), 192);
}

#[test]
fn test_event_order_for_a_full_run() {
    let x = RecordingPlayer::new();
    let mut harness = Harness::new(&single_note_score(), TransportConfig::default(), &[("x", x)]);

    harness.transport.start();
    harness.run_until_stopped(5.0);

    let events: Vec<TransportEvent> = harness.events.borrow().iter().map(|(_, e)| *e).collect();
    assert_eq!(events.first(), Some(&TransportEvent::Start));
    assert_eq!(events.last(), Some(&TransportEvent::Stop));
    assert_eq!(events[events.len() - 2], TransportEvent::Tick(192));

    // Playhead never moves backwards during a plain run
    let ticks: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            TransportEvent::Tick(t) => Some(*t),
            _ => None,
        })
        .collect();
    assert!(ticks.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_instruments_are_scheduled_independently() {
    let score = MemoryScore::new().with_flow(
        "flow",
        FlowData::new(192, 48)
            .with_tempo(Tempo::constant(0, 120.0))
            .with_tone("a", Tone::new("a2", 96, 24, Pitch::natural(64), 100))
            .with_tone("a", Tone::new("a1", 0, 24, Pitch::natural(62), 100))
            .with_tone("b", Tone::new("b1", 48, 96, Pitch::natural(40), 100)),
    );
    let a = RecordingPlayer::new();
    let b = RecordingPlayer::new();
    let mut harness = Harness::new(&score, TransportConfig::default(), &[("a", a.clone()), ("b", b.clone())]);

    harness.transport.start();
    harness.run_until_stopped(5.0);

    // Out of order in the score, in tick order at the player
    let a_pitches: Vec<u8> = a.calls().iter().map(|c| c.pitch).collect();
    assert_eq!(a_pitches, vec![62, 64]);
    assert!((a.calls()[1].time - 1.0).abs() < 1e-9);

    let b_calls = b.calls();
    assert_eq!(b_calls.len(), 1);
    assert!((b_calls[0].duration - 1.0).abs() < 1e-9);
}

#[test]
fn test_tempo_ramp_timing() {
    // 60 -> 120 BPM over the first two beats, then steady
    let score = MemoryScore::new().with_flow(
        "flow",
        FlowData::new(192, 48)
            .with_tempo(Tempo::ramp(0, 60.0, 120.0, 96))
            .with_tone("x", Tone::new("n1", 96, 48, Pitch::natural(60), 100))
            .with_tone("x", Tone::new("n2", 144, 48, Pitch::natural(62), 100)),
    );
    let x = RecordingPlayer::new();
    let mut harness = Harness::new(&score, TransportConfig::default(), &[("x", x.clone())]);

    harness.transport.start();
    harness.run_until_stopped(10.0);

    // Two beats ramping from 1 s/beat to 0.5 s/beat take 2 ln 2 seconds
    let ramp_end = 2.0 * std::f64::consts::LN_2;
    let calls = x.calls();
    assert_eq!(calls.len(), 2);
    assert!((calls[0].time - ramp_end).abs() < 1e-9);
    assert!((calls[1].time - (ramp_end + 0.5)).abs() < 1e-9);
}

#[test]
fn test_pause_and_resume_continue_where_left() {
    let score = MemoryScore::new().with_flow(
        "flow",
        FlowData::new(192, 48)
            .with_tempo(Tempo::constant(0, 120.0))
            .with_tone("x", Tone::new("n1", 24, 12, Pitch::natural(60), 100))
            .with_tone("x", Tone::new("n2", 120, 12, Pitch::natural(62), 100)),
    );
    let x = RecordingPlayer::new();
    let mut harness = Harness::new(&score, TransportConfig::default(), &[("x", x.clone())]);

    harness.transport.start();
    for _ in 0..40 {
        harness.step(); // 1.0 s
    }
    harness.transport.pause();
    assert_eq!(harness.transport.position(), 96);
    assert_eq!(x.pending(), 0);

    // Time passes while stopped
    for _ in 0..40 {
        harness.step();
    }
    assert_eq!(x.calls().len(), 1);

    // Resume at 2.0 s: tick 120 is a quarter second away
    harness.transport.start();
    harness.run_until_stopped(5.0);

    let calls = x.calls();
    assert_eq!(calls.len(), 2);
    assert!((calls[1].time - 2.25).abs() < 1e-9);
}

#[test]
fn test_loop_policy_repeats_flow() {
    let config = TransportConfig {
        end_policy: EndPolicy::Loop,
        ..TransportConfig::default()
    };
    let x = RecordingPlayer::new();
    let mut harness = Harness::new(&single_note_score(), config, &[("x", x.clone())]);

    harness.transport.start();
    for _ in 0..240 {
        harness.step(); // 6.0 s, three passes
    }

    assert!(harness.transport.is_playing());
    assert!(harness.stop_times().is_empty());
    let times: Vec<f64> = x.calls().iter().map(|c| c.time).collect();
    assert_eq!(times.len(), 3);
    for (pass, time) in times.iter().enumerate() {
        assert!((time - (0.5 + 2.0 * pass as f64)).abs() < 1e-9);
    }
}

#[test]
fn test_timestamp_of_flow_end() {
    let score = single_note_score();
    assert_eq!(score.timestamp("flow", 192), "0:02.000");
}
