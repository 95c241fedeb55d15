// Score Playback - Library exports for tests, benchmarks and the demo binary

pub mod audio;
pub mod config;
pub mod instrument;
pub mod messaging;
pub mod mixer;
pub mod score;
pub mod sequencer;

// Re-export commonly used types for convenience
pub use audio::gain::GainNode;
pub use audio::timing::{AudioTiming, HostClock, SystemClock};
pub use config::{ConfigError, EndPolicy, TransportConfig};
pub use instrument::{Expression, InstrumentPlayer, PlayerError, PlayerResult, RecordingPlayer};
pub use messaging::{EventBus, ListenerId, create_event_channel};
pub use mixer::Mixer;
pub use score::{FlowData, MemoryScore, ScoreEngine};
pub use sequencer::{
    Articulation, Pitch, Tempo, TempoMap, Tick, Tone, Transport, TransportEvent, TransportState,
};
