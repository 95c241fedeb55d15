// Gain node - Handle into the host audio graph for one signal path
// Control values are atomics so the audio callback never takes a lock

use super::parameters::AtomicF32;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Level meter fed by the audio callback
///
/// Holds the RMS and peak of the most recently processed block.
/// Both read as 0.0 until signal has passed through the node.
#[derive(Debug, Default)]
struct LevelMeter {
    rms: AtomicF32,
    peak: AtomicF32,
}

impl LevelMeter {
    fn update(&self, block: &[f32]) {
        if block.is_empty() {
            return;
        }

        let mut sum_squares = 0.0f32;
        let mut peak = 0.0f32;
        for sample in block {
            if !sample.is_finite() {
                continue;
            }
            sum_squares += sample * sample;
            peak = peak.max(sample.abs());
        }

        self.rms.set((sum_squares / block.len() as f32).sqrt());
        self.peak.set(peak);
    }

    fn reset(&self) {
        self.rms.set(0.0);
        self.peak.set(0.0);
    }
}

#[derive(Debug)]
struct GainNodeInner {
    /// Binary mute/solo gain (0.0 or 1.0), resolved by the mixer
    gain: AtomicF32,
    /// Fader level in [0, 1], independent from the mute/solo gain
    volume: AtomicF32,
    meter: LevelMeter,
    connected: AtomicBool,
}

/// Shared gain stage in the host audio graph
///
/// Clones are handles onto the same node: the mixer keeps one to write
/// control values, the audio side keeps one to process blocks.
#[derive(Clone, Debug)]
pub struct GainNode {
    inner: Arc<GainNodeInner>,
}

impl GainNode {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(GainNodeInner {
                gain: AtomicF32::new(1.0),
                volume: AtomicF32::new(1.0),
                meter: LevelMeter::default(),
                connected: AtomicBool::new(true),
            }),
        }
    }

    /// Current mute/solo gain
    pub fn gain(&self) -> f32 {
        self.inner.gain.get()
    }

    /// Current fader volume
    pub fn volume(&self) -> f32 {
        self.inner.volume.get()
    }

    /// Gain actually applied to the signal
    pub fn effective_gain(&self) -> f32 {
        if !self.is_connected() {
            return 0.0;
        }
        self.gain() * self.volume()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Relaxed)
    }

    /// RMS of the last processed block
    pub fn rms(&self) -> f32 {
        self.inner.meter.rms.get()
    }

    /// Peak magnitude of the last processed block
    pub fn peak(&self) -> f32 {
        self.inner.meter.peak.get()
    }

    /// Apply the node to a block of samples in place and meter the result
    /// Called from the audio callback
    pub fn process(&self, block: &mut [f32]) {
        let gain = self.effective_gain();
        for sample in block.iter_mut() {
            *sample *= gain;
        }
        self.inner.meter.update(block);
    }

    pub(crate) fn set_gain(&self, gain: f32) {
        self.inner.gain.set(gain);
    }

    pub(crate) fn set_volume(&self, volume: f32) {
        self.inner.volume.set(volume);
    }

    /// Detach the node from the graph; every later block is silenced
    pub(crate) fn release(&self) {
        self.inner.connected.store(false, Ordering::Relaxed);
        self.inner.meter.reset();
    }

    /// True when both handles point at the same node
    pub fn same_node(&self, other: &GainNode) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for GainNode {
    fn default() -> Self {
        Self::new()
    }
}
