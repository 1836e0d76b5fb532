//! Microphone capture
//!
//! Wraps the default `cpal` input device and hands out mono `f32` samples
//! regardless of the device's native sample format and channel count.

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use hound::{WavSpec, WavWriter};
use log::{error, info};

use crate::error::VoiceError;

pub struct Microphone {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
}

impl Microphone {
    /// Open the host's default input device with its default config
    pub fn open() -> Result<Self, VoiceError> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or(VoiceError::NoInputDevice)?;
        let config = device.default_input_config()?;
        info!(
            "input device {} ({} Hz, {} ch, {:?})",
            device.name().unwrap_or_else(|_| "<unnamed>".into()),
            config.sample_rate().0,
            config.channels(),
            config.sample_format()
        );
        Ok(Self { device, config })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate().0
    }

    /// Build an input stream that delivers mono samples to `on_samples`.
    /// The stream is returned unstarted; call `play()` on it.
    pub fn stream<F>(&self, on_samples: F) -> Result<cpal::Stream, VoiceError>
    where
        F: FnMut(&[f32]) + Send + 'static,
    {
        match self.config.sample_format() {
            cpal::SampleFormat::F32 => self.build::<f32, F>(|s| s, on_samples),
            cpal::SampleFormat::I16 => {
                self.build::<i16, F>(|s| s as f32 / i16::MAX as f32, on_samples)
            }
            cpal::SampleFormat::U16 => self.build::<u16, F>(
                |s| (s as f32 / u16::MAX as f32) * 2.0 - 1.0,
                on_samples,
            ),
            other => Err(VoiceError::UnsupportedSampleFormat(other)),
        }
    }

    /// Stream samples of type `T`, converting each to `f32` with `convert`
    fn build<T, F>(&self, convert: fn(T) -> f32, mut on_samples: F) -> Result<cpal::Stream, VoiceError>
    where
        T: cpal::SizedSample + Send + 'static,
        F: FnMut(&[f32]) + Send + 'static,
    {
        let channels = usize::from(self.config.channels()).max(1);
        let mut mono = Vec::new();
        let stream = self.device.build_input_stream(
            &self.config.config(),
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                // Average interleaved channels down to mono
                mono.clear();
                mono.extend(data.chunks(channels).map(|frame| {
                    frame.iter().map(|&s| convert(s)).sum::<f32>() / frame.len() as f32
                }));
                on_samples(&mono);
            },
            |err| error!("audio stream error: {}", err),
            None,
        )?;
        Ok(stream)
    }

    /// Capture `duration` of audio
    pub fn record(&self, duration: Duration) -> Result<Vec<f32>, VoiceError> {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&captured);
        let stream = self.stream(move |samples| {
            if let Ok(mut captured) = sink.lock() {
                captured.extend_from_slice(samples);
            }
        })?;

        stream.play()?;
        std::thread::sleep(duration);
        // Dropping the stream stops the callback before we take the buffer
        drop(stream);

        let samples = std::mem::take(&mut *captured.lock().map_err(|_| VoiceError::Poisoned)?);
        Ok(samples)
    }
}

/// Encode mono samples as 16-bit PCM WAV in memory
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, VoiceError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            // Scale to the full i16 range
            writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Root-mean-square level of a buffer
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_wav_round_trips_through_hound() {
        let samples = [0.0, 0.5, -0.5, 1.0, -1.0];
        let bytes = encode_wav(&samples, 16000).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");

        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().channels, 1);
        let decoded: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(decoded, vec![0, 16383, -16383, 32767, -32767]);
    }

    #[test]
    fn test_rms() {
        assert_eq!(rms(&[]), 0.0);
        assert!((rms(&[0.5, -0.5]) - 0.5).abs() < 1e-6);
    }
}
