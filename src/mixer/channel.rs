// Mixer channel - Per-instrument mute/solo/volume state and its gain node

use crate::audio::gain::GainNode;

/// Mute/solo flags of one channel, the only input to gain resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelFlags {
    pub mute: bool,
    pub solo: bool,
}

/// Resolve the mute/solo gain of every channel from the flags of all channels
///
/// A soloed channel is always audible. Otherwise a channel is silent when it
/// is muted or when any other channel is soloed. The result depends only on
/// the final flag set, never on the order the flags were changed in.
pub fn resolve_gains(flags: &[ChannelFlags]) -> Vec<f32> {
    let solo_active = flags.iter().any(|f| f.solo);

    flags
        .iter()
        .map(|f| {
            if f.solo {
                1.0
            } else if solo_active || f.mute {
                0.0
            } else {
                1.0
            }
        })
        .collect()
}

/// One instrument's strip in the mixer
#[derive(Debug)]
pub struct Channel {
    key: String,
    flags: ChannelFlags,
    volume: f32,
    node: GainNode,
}

impl Channel {
    pub(crate) fn new(key: String) -> Self {
        Self {
            key,
            flags: ChannelFlags::default(),
            volume: 1.0,
            node: GainNode::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_muted(&self) -> bool {
        self.flags.mute
    }

    pub fn is_soloed(&self) -> bool {
        self.flags.solo
    }

    pub fn flags(&self) -> ChannelFlags {
        self.flags
    }

    /// Fader level in [0, 1]
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Resolved mute/solo gain currently applied
    pub fn gain(&self) -> f32 {
        self.node.gain()
    }

    /// Input node that instrument players route into
    pub fn node(&self) -> &GainNode {
        &self.node
    }

    pub(crate) fn flags_mut(&mut self) -> &mut ChannelFlags {
        &mut self.flags
    }

    pub(crate) fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        self.node.set_volume(volume);
    }

    pub(crate) fn apply_gain(&self, gain: f32) {
        self.node.set_gain(gain);
    }

    pub(crate) fn release(self) {
        self.node.release();
    }
}
