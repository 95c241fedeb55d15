// Sequencer module - Musical time, tones and the playback transport

pub mod scheduler;
pub mod tempo_map;
pub mod tone;
pub mod transport;

pub use scheduler::{Anchor, ScheduledNote, Scheduler};
pub use tempo_map::{Tempo, TempoMap, Tick};
pub use tone::{Accidental, Articulation, Pitch, Tone};
pub use transport::{Transport, TransportEvent, TransportState};
