// Host audio clock - the monotonic real-time reference every playback deadline is expressed in

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Source of host audio-clock time, in seconds
///
/// All note deadlines handed to instrument players are absolute values on
/// this clock. The clock only ever moves forward.
pub trait HostClock {
    /// Current host time in seconds
    fn now(&self) -> f64;
}

/// Shared audio timing state, advanced by the audio callback
///
/// Counts rendered frames, so the clock is sample accurate and stops
/// moving when the device stops pulling audio.
#[derive(Clone, Debug)]
pub struct AudioTiming {
    /// Current sample position (incremented by audio callback)
    sample_position: Arc<AtomicU64>,
    /// Sample rate (for timestamp conversions)
    sample_rate: f64,
}

impl AudioTiming {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_position: Arc::new(AtomicU64::new(0)),
            sample_rate: sample_rate as f64,
        }
    }

    /// Get current sample position
    pub fn current_sample(&self) -> u64 {
        self.sample_position.load(Ordering::Relaxed)
    }

    /// Advance sample position (called from audio callback)
    pub fn advance(&self, frames: usize) {
        self.sample_position
            .fetch_add(frames as u64, Ordering::Relaxed);
    }

    /// Get sample rate
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate as f32
    }
}

impl HostClock for AudioTiming {
    fn now(&self) -> f64 {
        self.current_sample() as f64 / self.sample_rate
    }
}

/// Wall-clock fallback used when no audio device drives the clock
#[derive(Clone, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl HostClock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

impl<C: HostClock + ?Sized> HostClock for Box<C> {
    fn now(&self) -> f64 {
        (**self).now()
    }
}
