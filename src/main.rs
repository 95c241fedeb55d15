use score_playback::audio::device::OutputClock;
use score_playback::messaging::channels::create_event_channel;
use score_playback::{
    Articulation, EndPolicy, Expression, FlowData, GainNode, HostClock, InstrumentPlayer,
    MemoryScore, Pitch, PlayerResult, ScoreEngine, SystemClock, Tempo, Tone, Transport,
    TransportConfig, TransportEvent,
};
use ringbuf::traits::Consumer;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const FLOW: &str = "demo";
const SUBDIVISIONS: u32 = 48;
const EVENT_CHANNEL_CAPACITY: usize = 256;
// ~60 fps redraw callback
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Player that logs every note instead of producing sound
struct LoggingPlayer {
    name: &'static str,
    output: GainNode,
}

impl LoggingPlayer {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            output: GainNode::new(),
        }
    }
}

impl InstrumentPlayer for LoggingPlayer {
    fn play(&mut self, expression: Expression, pitch: u8, time: f64, duration: f64) -> PlayerResult<()> {
        tracing::info!(
            instrument = self.name,
            pitch = %Pitch::natural(pitch).name(),
            ?expression,
            time,
            duration,
            "play"
        );
        Ok(())
    }

    fn stop_all(&mut self) {
        tracing::info!(instrument = self.name, "stop all");
    }

    fn output(&self) -> &GainNode {
        &self.output
    }
}

/// Two bars of a C major scale over a bass line, accelerating from 90 to 150 BPM
fn demo_score() -> MemoryScore {
    let beat = SUBDIVISIONS;
    let mut flow = FlowData::new(8 * beat, SUBDIVISIONS).with_tempo(Tempo::ramp(0, 90.0, 150.0, 8 * beat));

    for (i, pitch) in [60u8, 62, 64, 65, 67, 69, 71, 72].into_iter().enumerate() {
        let tick = i as u32 * beat;
        let articulation = if i % 2 == 0 {
            Articulation::None
        } else {
            Articulation::Staccato
        };
        flow = flow.with_tone(
            "piano",
            Tone::new(format!("p{}", i), tick, beat, Pitch::natural(pitch), 90).with_articulation(articulation),
        );
    }
    for (i, pitch) in [36u8, 43].into_iter().enumerate() {
        let tick = i as u32 * 4 * beat;
        flow = flow.with_tone("bass", Tone::new(format!("b{}", i), tick, 4 * beat, Pitch::natural(pitch), 100));
    }

    MemoryScore::new().with_flow(FLOW, flow)
}

fn open_clock(use_device: bool) -> Box<dyn HostClock> {
    if use_device {
        match OutputClock::open() {
            Ok(clock) => return Box::new(clock),
            Err(e) => tracing::warn!(error = %e, "output device unavailable, using system clock"),
        }
    }
    Box::new(SystemClock::new())
}

fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let use_device = args.iter().any(|a| a == "--device");
    let config = TransportConfig {
        end_policy: if args.iter().any(|a| a == "--loop") {
            EndPolicy::Loop
        } else {
            EndPolicy::Stop
        },
        ..TransportConfig::default()
    };

    let score = demo_score();
    let schedule_interval = config.schedule_interval();
    let mut transport = Transport::new(open_clock(use_device), config);
    transport.add_instrument("piano", Box::new(LoggingPlayer::new("piano")));
    transport.add_instrument("bass", Box::new(LoggingPlayer::new("bass")));
    transport.load_flow(&score, FLOW);

    let (event_tx, mut event_rx) = create_event_channel(EVENT_CHANNEL_CAPACITY);
    transport.events_mut().forward_to(event_tx);

    tracing::info!(
        length = transport.length(),
        subdivisions = transport.subdivisions(),
        duration = %score.timestamp(FLOW, transport.length()),
        "demo flow loaded"
    );

    transport.start();

    let mut last_schedule = transport.now();
    let mut last_logged = None;
    // Looping demos run for three passes
    let deadline = transport.now() + 3.0 * transport.tempo_map().tick_to_seconds(transport.length());

    loop {
        std::thread::sleep(FRAME_INTERVAL);

        let now = transport.now();
        if now - last_schedule >= schedule_interval.as_secs_f64() {
            transport.on_schedule_timer();
            last_schedule = now;
        }
        transport.on_frame();

        let mut stopped = false;
        while let Some(event) = event_rx.try_pop() {
            match event {
                TransportEvent::Tick(tick) => {
                    // One line per beat keeps the log readable
                    let beat = tick / SUBDIVISIONS;
                    if last_logged != Some(beat) {
                        last_logged = Some(beat);
                        tracing::info!(beat = beat + 1, at = %score.timestamp(FLOW, tick), "playhead");
                    }
                }
                TransportEvent::Start => tracing::info!("started"),
                TransportEvent::Stop => stopped = true,
            }
        }

        if stopped || now >= deadline {
            break;
        }
    }

    transport.pause();
    tracing::info!(position = transport.position(), "demo finished");
}
