//! Microphone capture

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Captures mono audio from the default input device into a shared buffer
pub struct AudioCapture {
    device_name: String,
    config: StreamConfig,
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
}

impl std::fmt::Debug for AudioCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioCapture")
            .field("device", &self.device_name)
            .field("capturing", &self.is_capturing())
            .finish_non_exhaustive()
    }
}

impl AudioCapture {
    /// Open the default input device at 16kHz mono
    ///
    /// # Errors
    ///
    /// Returns error if there is no input device or it can't do 16kHz mono
    pub fn new() -> Result<Self> {
        let device = default_input()?;

        let supported = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no 16kHz mono input config".to_string()))?;

        let config = supported.with_sample_rate(SampleRate(SAMPLE_RATE)).config();
        let device_name = device.name().unwrap_or_default();

        tracing::debug!(device = %device_name, sample_rate = SAMPLE_RATE, "audio capture initialized");

        Ok(Self {
            device_name,
            config,
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
        })
    }

    /// Start filling the buffer; a no-op when already capturing
    ///
    /// # Errors
    ///
    /// Returns error if the input stream can't be started
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let buffer = Arc::clone(&self.buffer);
        let stream = default_input()?
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| tracing::error!(error = %err, "audio capture error"),
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    /// Stop capturing
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("audio capture stopped");
        }
    }

    /// Samples captured since the last call
    #[must_use]
    pub fn take_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    /// Drop anything captured so far
    pub fn clear_buffer(&self) {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
    }

    /// Whether the input stream is running
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    /// Input device name
    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

fn default_input() -> Result<cpal::Device> {
    cpal::default_host()
        .default_input_device()
        .ok_or_else(|| Error::Audio("no input device available".to_string()))
}

/// Encode mono f32 samples as a 16-bit PCM WAV file
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let pcm = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(pcm)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_header_and_length() {
        let samples = vec![0.0f32, 0.5, -0.5, 1.5];
        let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

        assert_eq!(&wav[..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        // 44-byte header plus two bytes per sample
        assert_eq!(wav.len(), 44 + samples.len() * 2);

        let reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
        let pcm: Vec<i16> = reader.into_samples().map(|s| s.unwrap()).collect();
        assert_eq!(pcm, [0, 16383, -16383, 32767]);
    }
}
