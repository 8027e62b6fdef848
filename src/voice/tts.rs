//! Text-to-speech via `OpenAI`

use crate::{Error, Result};

const SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";

/// Synthesizes MP3 speech from text
#[derive(Clone)]
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: String,
    model: String,
    voice: String,
    speed: f64,
}

impl std::fmt::Debug for TextToSpeech {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextToSpeech")
            .field("model", &self.model)
            .field("voice", &self.voice)
            .field("speed", &self.speed)
            .finish_non_exhaustive()
    }
}

impl TextToSpeech {
    /// Create a TTS client
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(api_key: String, model: String, voice: String, speed: f64) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            voice,
            speed,
        })
    }

    /// Synthesize `text`, returning MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the API rejects it
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f64,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post(SPEECH_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        tracing::debug!(bytes = audio.len(), "speech synthesized");
        Ok(audio.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_key() {
        let tts = TextToSpeech::new(String::new(), "tts-1".to_string(), "alloy".to_string(), 1.0);
        assert!(matches!(tts, Err(Error::Config(_))));
    }
}
