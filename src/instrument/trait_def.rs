use crate::audio::gain::GainNode;
use crate::instrument::PlayerResult;

/// Playing technique requested for one note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Expression {
    #[default]
    Natural,
    Staccato,
    Tenuto,
    Accent,
}

/// Sound generator for one instrument
///
/// The transport and mixer only ever see this control surface. Sample
/// loading and voice generation live behind it.
pub trait InstrumentPlayer {
    /// Schedule a note against the host audio clock
    ///
    /// # Arguments
    /// * `expression` - Playing technique
    /// * `pitch` - MIDI note number
    /// * `time` - Absolute host-clock time of the note start, in seconds
    /// * `duration` - Sounding length in seconds
    fn play(&mut self, expression: Expression, pitch: u8, time: f64, duration: f64) -> PlayerResult<()>;

    /// Cancel every scheduled note and silence every sounding one
    fn stop_all(&mut self);

    /// Output node of the player
    fn output(&self) -> &GainNode;

    /// Route the player output into a mixer channel
    fn connect(&mut self, _destination: &GainNode) {
        // Default implementation does nothing
    }
}
