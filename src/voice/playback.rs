//! Audio playback to speakers

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::{Error, Result};

/// Sample rate for playback (matches `OpenAI` TTS output)
pub const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Plays mono audio on the default output device
#[derive(Debug, Clone)]
pub struct AudioPlayback {
    config: StreamConfig,
}

impl AudioPlayback {
    /// Open the default output device at 24kHz, mono or stereo
    ///
    /// # Errors
    ///
    /// Returns error if there is no output device or no usable config
    pub fn new() -> Result<Self> {
        let device = default_output()?;
        let rate = SampleRate(PLAYBACK_SAMPLE_RATE);

        let supports = |channels: u16| {
            device.supported_output_configs().ok()?.find(|c| {
                c.channels() == channels && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
            })
        };

        let supported = supports(1)
            .or_else(|| supports(2))
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;
        let config = supported.with_sample_rate(rate).config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self { config })
    }

    /// Decode and play MP3 bytes, blocking until done
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    pub fn play_mp3(&self, mp3: &[u8]) -> Result<()> {
        let samples = decode_mp3(mp3)?;
        self.play(samples)
    }

    /// Play mono samples at 24kHz, blocking until done
    ///
    /// # Errors
    ///
    /// Returns error if the output stream can't be started
    pub fn play(&self, samples: Vec<f32>) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let channels = usize::from(self.config.channels);
        let sample_count = samples.len();
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let stream = {
            let position = Arc::clone(&position);
            let finished = Arc::clone(&finished);
            default_output()?
                .build_output_stream(
                    &self.config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let mut pos = position.load(Ordering::Relaxed);
                        for frame in data.chunks_mut(channels) {
                            let sample = samples.get(pos).copied().unwrap_or(0.0);
                            frame.fill(sample);
                            pos = (pos + 1).min(samples.len());
                        }
                        position.store(pos, Ordering::Relaxed);
                        if pos >= samples.len() {
                            finished.store(true, Ordering::Release);
                        }
                    },
                    |err| tracing::error!(error = %err, "audio playback error"),
                    None,
                )
                .map_err(|e| Error::Audio(e.to_string()))?
        };

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let duration_ms = (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
        let deadline = Instant::now() + Duration::from_millis(duration_ms + 500);
        while !finished.load(Ordering::Acquire) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(50));
        }

        // Let the device drain its last buffer
        std::thread::sleep(Duration::from_millis(100));
        drop(stream);

        tracing::debug!(samples = sample_count, "playback complete");
        Ok(())
    }
}

fn default_output() -> Result<cpal::Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))
}

/// A sine tone at 24kHz, for speaker checks
#[must_use]
pub fn tone(frequency: f32, seconds: f32) -> Vec<f32> {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let len = (seconds.max(0.0) * PLAYBACK_SAMPLE_RATE as f32) as usize;

    #[allow(clippy::cast_precision_loss)]
    (0..len)
        .map(|i| {
            let t = i as f32 / PLAYBACK_SAMPLE_RATE as f32;
            0.2 * (std::f32::consts::TAU * frequency * t).sin()
        })
        .collect()
}

/// Decode MP3 bytes to mono f32 samples
///
/// # Errors
///
/// Returns error if the stream is not valid MP3
pub fn decode_mp3(mp3: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3));
    let mut samples = Vec::new();

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                let channels = frame.channels.max(1);
                samples.extend(frame.data.chunks(channels).map(downmix));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(samples)
}

/// Average one interleaved frame of i16 samples to a mono f32
#[allow(clippy::cast_precision_loss)]
fn downmix(frame: &[i16]) -> f32 {
    frame.iter().map(|&s| f32::from(s) / 32768.0).sum::<f32>() / frame.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_length_and_amplitude() {
        let samples = tone(440.0, 0.5);
        assert_eq!(samples.len(), 12000);
        assert!(samples.iter().all(|s| s.abs() <= 0.2 + f32::EPSILON));
    }

    #[test]
    fn test_downmix_stereo() {
        assert!((downmix(&[16384, -16384]) - 0.0).abs() < f32::EPSILON);
        assert!((downmix(&[16384]) - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_decode_empty_is_empty() {
        assert!(decode_mp3(&[]).unwrap().is_empty());
    }
}
