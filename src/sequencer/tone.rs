// Tone representation for playback
// A tone is one sounding note of an instrument as reported by the score engine

use crate::instrument::Expression;
use crate::sequencer::tempo_map::Tick;

/// Accidental attached to a written pitch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum Accidental {
    DoubleFlat,
    Flat,
    #[default]
    Natural,
    Sharp,
    DoubleSharp,
}

impl Accidental {
    /// Semitone offset from the natural step
    pub fn alteration(&self) -> i8 {
        match self {
            Accidental::DoubleFlat => -2,
            Accidental::Flat => -1,
            Accidental::Natural => 0,
            Accidental::Sharp => 1,
            Accidental::DoubleSharp => 2,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Accidental::DoubleFlat => "bb",
            Accidental::Flat => "b",
            Accidental::Natural => "",
            Accidental::Sharp => "#",
            Accidental::DoubleSharp => "##",
        }
    }
}

/// Sounding pitch plus its written spelling
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Pitch {
    /// MIDI note number (0-127, where 60 = C4)
    pub int: u8,
    pub accidental: Accidental,
}

impl Pitch {
    pub fn new(int: u8, accidental: Accidental) -> Self {
        Self {
            int: int.min(127),
            accidental,
        }
    }

    /// Pitch spelled without accidentals where possible
    pub fn natural(int: u8) -> Self {
        Self::new(int, Accidental::Natural)
    }

    /// Spelled note name (e.g. "C4", "Db4", "B#3")
    pub fn name(&self) -> String {
        // Semitone -> natural letter, for the seven natural steps
        const LETTERS: [Option<&str>; 12] = [
            Some("C"),
            None,
            Some("D"),
            None,
            Some("E"),
            Some("F"),
            None,
            Some("G"),
            None,
            Some("A"),
            None,
            Some("B"),
        ];
        const SHARP_NAMES: [&str; 12] = [
            "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
        ];

        let base = self.int as i32 - self.accidental.alteration() as i32;
        if let Some(letter) = LETTERS[base.rem_euclid(12) as usize] {
            let octave = base.div_euclid(12) - 1;
            return format!("{}{}{}", letter, self.accidental.symbol(), octave);
        }

        // Spelling does not land on a natural step: fall back to sharps
        let octave = (self.int / 12) as i32 - 1;
        format!("{}{}", SHARP_NAMES[(self.int % 12) as usize], octave)
    }
}

/// Articulation marking on a tone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum Articulation {
    #[default]
    None,
    Staccato,
    Staccatissimo,
    Tenuto,
    StaccatoTenuto,
    Accent,
    Marcato,
}

impl Articulation {
    /// Playing technique requested from the instrument player
    pub fn expression(&self) -> Expression {
        match self {
            Articulation::None => Expression::Natural,
            Articulation::Staccato | Articulation::Staccatissimo => Expression::Staccato,
            Articulation::Tenuto | Articulation::StaccatoTenuto => Expression::Tenuto,
            Articulation::Accent | Articulation::Marcato => Expression::Accent,
        }
    }

    /// Share of the written duration that actually sounds
    pub fn sounding_fraction(&self) -> f64 {
        match self {
            Articulation::Staccato => 0.5,
            Articulation::Staccatissimo => 0.25,
            Articulation::StaccatoTenuto => 0.75,
            _ => 1.0,
        }
    }
}

/// A tone scheduled for playback
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tone {
    /// Identifier of the tone in the score document
    pub key: String,

    /// Start position in ticks
    pub tick: Tick,

    /// Written duration in ticks
    pub duration: Tick,

    pub pitch: Pitch,

    /// MIDI velocity (0-127, where 127 = maximum)
    pub velocity: u8,

    #[serde(default)]
    pub articulation: Articulation,
}

impl Tone {
    /// Creates a new tone with no articulation
    pub fn new(key: impl Into<String>, tick: Tick, duration: Tick, pitch: Pitch, velocity: u8) -> Self {
        Self {
            key: key.into(),
            tick,
            duration,
            pitch,
            velocity: velocity.min(127),
            articulation: Articulation::None,
        }
    }

    pub fn with_articulation(mut self, articulation: Articulation) -> Self {
        self.articulation = articulation;
        self
    }

    /// First tick after the written tone
    pub fn end_tick(&self) -> Tick {
        self.tick.saturating_add(self.duration)
    }

    /// Fractional tick position at which the sound stops
    pub fn sounding_end(&self) -> f64 {
        self.tick as f64 + self.duration as f64 * self.articulation.sounding_fraction()
    }

    pub fn expression(&self) -> Expression {
        self.articulation.expression()
    }
}
