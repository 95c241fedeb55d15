// Mixer - One channel per instrument, mute/solo resolution and metering
//
// Every mutation that can change audibility (create, mute, solo, disconnect)
// re-runs `resolve_gains` over all channels and writes the result into each
// channel's gain node. Unknown keys are ignored: channels may disappear while
// UI calls for them are still in flight.

pub mod channel;

pub use channel::{Channel, ChannelFlags, resolve_gains};

use crate::audio::gain::GainNode;

/// Per-instrument mixer
#[derive(Debug, Default)]
pub struct Mixer {
    /// Channels in creation order; keys are unique
    channels: Vec<Channel>,
}

impl Mixer {
    pub fn new() -> Self {
        Self {
            channels: Vec::new(),
        }
    }

    /// Create the channel for an instrument
    ///
    /// Returns the existing channel if the key is already present.
    pub fn create_channel(&mut self, key: &str) -> &Channel {
        let index = match self.index_of(key) {
            Some(index) => {
                tracing::debug!(key, "channel already exists");
                index
            }
            None => {
                self.channels.push(Channel::new(key.to_string()));
                tracing::debug!(key, channels = self.channels.len(), "channel created");
                self.recompute_gains();
                self.channels.len() - 1
            }
        };
        &self.channels[index]
    }

    pub fn mute(&mut self, key: &str) -> bool {
        self.update_flags(key, |flags| flags.mute = true)
    }

    pub fn unmute(&mut self, key: &str) -> bool {
        self.update_flags(key, |flags| flags.mute = false)
    }

    pub fn solo(&mut self, key: &str) -> bool {
        self.update_flags(key, |flags| flags.solo = true)
    }

    pub fn unsolo(&mut self, key: &str) -> bool {
        self.update_flags(key, |flags| flags.solo = false)
    }

    /// Set the fader level of a channel, clamped to [0, 1]
    ///
    /// Independent from the mute/solo gain.
    pub fn set_volume(&mut self, key: &str, volume: f32) -> bool {
        if volume.is_nan() {
            tracing::warn!(key, "ignoring NaN volume");
            return false;
        }
        match self.channel_mut(key) {
            Some(channel) => {
                channel.set_volume(volume.clamp(0.0, 1.0));
                true
            }
            None => {
                tracing::debug!(key, "set_volume on unknown channel");
                false
            }
        }
    }

    /// Remove a channel and release its gain node
    ///
    /// Calling this for an absent key does nothing.
    pub fn disconnect(&mut self, key: &str) -> bool {
        let Some(index) = self.index_of(key) else {
            return false;
        };

        let channel = self.channels.remove(index);
        channel.release();
        tracing::debug!(key, "channel disconnected");
        self.recompute_gains();
        true
    }

    /// RMS level of a channel's last processed block, 0.0 for unknown keys
    pub fn rms(&self, key: &str) -> f32 {
        self.channel(key).map(|c| c.node().rms()).unwrap_or(0.0)
    }

    /// Peak level of a channel's last processed block, 0.0 for unknown keys
    pub fn peak(&self, key: &str) -> f32 {
        self.channel(key).map(|c| c.node().peak()).unwrap_or(0.0)
    }

    /// Resolved mute/solo gain of a channel
    pub fn gain(&self, key: &str) -> Option<f32> {
        self.channel(key).map(|c| c.gain())
    }

    /// Volume of a channel
    pub fn volume(&self, key: &str) -> Option<f32> {
        self.channel(key).map(|c| c.volume())
    }

    /// Gain node of a channel, for routing audio into it
    pub fn node(&self, key: &str) -> Option<&GainNode> {
        self.channel(key).map(|c| c.node())
    }

    pub fn channel(&self, key: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.key() == key)
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index_of(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// True when any channel is soloed
    pub fn solo_active(&self) -> bool {
        self.channels.iter().any(|c| c.is_soloed())
    }

    fn index_of(&self, key: &str) -> Option<usize> {
        self.channels.iter().position(|c| c.key() == key)
    }

    fn channel_mut(&mut self, key: &str) -> Option<&mut Channel> {
        self.channels.iter_mut().find(|c| c.key() == key)
    }

    fn update_flags(&mut self, key: &str, update: impl FnOnce(&mut ChannelFlags)) -> bool {
        match self.channel_mut(key) {
            Some(channel) => {
                update(channel.flags_mut());
                tracing::debug!(key, flags = ?channel.flags(), "channel flags changed");
                self.recompute_gains();
                true
            }
            None => {
                tracing::debug!(key, "flag change on unknown channel");
                false
            }
        }
    }

    fn recompute_gains(&self) {
        let flags: Vec<ChannelFlags> = self.channels.iter().map(|c| c.flags()).collect();
        for (channel, gain) in self.channels.iter().zip(resolve_gains(&flags)) {
            channel.apply_gain(gain);
        }
    }
}
