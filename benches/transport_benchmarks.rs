use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use score_playback::audio::timing::AudioTiming;
use score_playback::config::EndPolicy;
use score_playback::sequencer::{Anchor, Scheduler};
use score_playback::{
    FlowData, MemoryScore, Mixer, Pitch, RecordingPlayer, Tempo, TempoMap, Tone, Transport,
    TransportConfig,
};

/// Map with a ramp every 16 beats, like an expressive orchestral flow
fn ramped_map(segments: u32) -> TempoMap {
    let subdivisions = 480;
    let events = (0..segments).map(|i| {
        let at = i * 16 * subdivisions;
        if i % 2 == 0 {
            Tempo::ramp(at, 80.0, 140.0, 8 * subdivisions)
        } else {
            Tempo::constant(at, 100.0)
        }
    });
    TempoMap::from_events(subdivisions, events)
}

/// Benchmark tick <-> seconds conversion (called on every frame and for every note)
fn bench_tempo_conversions(c: &mut Criterion) {
    let mut group = c.benchmark_group("tempo_map");

    for segments in [1u32, 16, 256] {
        let map = ramped_map(segments);
        let last_tick = segments * 16 * 480;

        group.bench_with_input(BenchmarkId::new("tick_to_seconds", segments), &map, |b, map| {
            let mut tick = 0;
            b.iter(|| {
                tick = (tick + 977) % last_tick.max(1);
                black_box(map.tick_to_seconds(black_box(tick)))
            });
        });

        let total = map.tick_to_seconds(last_tick);
        group.bench_with_input(BenchmarkId::new("seconds_to_tick", segments), &map, |b, map| {
            let mut seconds = 0.0;
            b.iter(|| {
                seconds = (seconds + 0.37) % total.max(1.0);
                black_box(map.seconds_to_tick(black_box(seconds)))
            });
        });
    }
    group.finish();
}

/// Benchmark one scheduling pass over a dense ensemble
fn bench_scheduler_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler");
    let map = TempoMap::from_events(48, [Tempo::constant(0, 120.0)]);
    let length = 48 * 4 * 200;

    for instruments in [1usize, 16, 64] {
        // One sixteenth note per instrument per 12 ticks
        let tracks: Vec<Vec<Tone>> = (0..instruments)
            .map(|i| {
                (0..length / 12)
                    .map(|n| Tone::new(format!("{}-{}", i, n), n * 12, 12, Pitch::natural(60), 100))
                    .collect()
            })
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(instruments), &tracks, |b, tracks| {
            b.iter(|| {
                let mut scheduler = Scheduler::new(0.1);
                let anchor = Anchor::new(0.0, 0.0);
                let mut now = 0.0;
                let mut count = 0;
                // First ten seconds in 25 ms passes
                for _ in 0..400 {
                    let notes = scheduler.process(
                        now,
                        &anchor,
                        &map,
                        length,
                        EndPolicy::Stop,
                        tracks.iter().map(|t| t.as_slice()),
                    );
                    count += notes.len();
                    now += 0.025;
                }
                black_box(count)
            });
        });
    }
    group.finish();
}

/// Benchmark gain recomputation on solo toggles
fn bench_mixer_solo(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixer_solo");

    for channels in [8usize, 64, 256] {
        let mut mixer = Mixer::new();
        let keys: Vec<String> = (0..channels).map(|i| format!("inst-{}", i)).collect();
        for key in &keys {
            mixer.create_channel(key);
        }

        group.bench_function(BenchmarkId::from_parameter(channels), |b| {
            let mut i = 0;
            b.iter(|| {
                let key = &keys[i % channels];
                mixer.solo(key);
                mixer.unsolo(key);
                i += 1;
            });
        });
    }
    group.finish();
}

/// Benchmark a transport frame callback (playhead interpolation)
fn bench_transport_frame(c: &mut Criterion) {
    let score = MemoryScore::new().with_flow(
        "flow",
        FlowData::new(u32::MAX / 2, 480).with_tempo(Tempo::ramp(0, 60.0, 180.0, 480 * 1000)),
    );
    let timing = AudioTiming::new(48_000.0);
    let mut transport = Transport::new(timing.clone(), TransportConfig::default());
    transport.add_instrument("x", Box::new(RecordingPlayer::new()));
    transport.load_flow(&score, "flow");
    transport.start();

    c.bench_function("transport_frame", |b| {
        b.iter(|| {
            timing.advance(800);
            transport.on_frame();
            black_box(transport.position())
        });
    });
}

criterion_group!(
    benches,
    bench_tempo_conversions,
    bench_scheduler_pass,
    bench_mixer_solo,
    bench_transport_frame
);
criterion_main!(benches);
