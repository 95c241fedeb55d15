// Output device clock - Drives the host audio clock from a CPAL output stream

use super::timing::{AudioTiming, HostClock};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SizedSample, Stream, StreamConfig};

/// Errors raised while opening the output device
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("No audio output device available")]
    NoDevice,

    #[error("Failed to query device configuration: {0}")]
    Config(String),

    #[error("Unsupported sample format: {0:?}")]
    UnsupportedFormat(SampleFormat),

    #[error("Failed to build output stream: {0}")]
    Stream(String),
}

/// Host clock backed by the default output device
///
/// The stream callback writes silence and advances an `AudioTiming` by the
/// number of frames the device consumed, so `now()` follows the hardware
/// clock rather than the wall clock.
pub struct OutputClock {
    timing: AudioTiming,
    _stream: Stream,
}

impl OutputClock {
    /// Open the default output device and start its stream
    pub fn open() -> Result<Self, DeviceError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(DeviceError::NoDevice)?;

        let supported_config = device
            .default_output_config()
            .map_err(|e| DeviceError::Config(e.to_string()))?;
        let sample_format = supported_config.sample_format();
        let config: StreamConfig = supported_config.into();
        let timing = AudioTiming::new(config.sample_rate.0 as f32);

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, timing.clone()),
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, timing.clone()),
            SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, timing.clone()),
            other => return Err(DeviceError::UnsupportedFormat(other)),
        }?;

        stream
            .play()
            .map_err(|e| DeviceError::Stream(e.to_string()))?;

        tracing::info!(
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            "output clock started"
        );

        Ok(Self {
            timing,
            _stream: stream,
        })
    }

    fn build_stream<T: SizedSample>(
        device: &Device,
        config: &StreamConfig,
        timing: AudioTiming,
    ) -> Result<Stream, DeviceError> {
        let channels = (config.channels as usize).max(1);

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    for sample in data.iter_mut() {
                        *sample = T::EQUILIBRIUM;
                    }
                    timing.advance(data.len() / channels);
                },
                |err| tracing::error!("audio stream error: {}", err),
                None,
            )
            .map_err(|e| DeviceError::Stream(e.to_string()))
    }

    /// Timing handle shared with the stream callback
    pub fn timing(&self) -> &AudioTiming {
        &self.timing
    }
}

impl HostClock for OutputClock {
    fn now(&self) -> f64 {
        self.timing.now()
    }
}
