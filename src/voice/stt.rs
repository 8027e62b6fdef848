//! Speech-to-text via `OpenAI` Whisper

use crate::{Error, Result};

const TRANSCRIPTIONS_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Response from the Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Transcribes WAV audio with Whisper
#[derive(Clone)]
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: String,
    model: String,
    url: String,
}

impl std::fmt::Debug for SpeechToText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechToText")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl SpeechToText {
    /// Create a Whisper client
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for Whisper".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            url: TRANSCRIPTIONS_URL.to_string(),
        })
    }

    /// Point the client at a different transcription endpoint
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Transcribe WAV bytes to text
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the API rejects the audio
    pub async fn transcribe(&self, wav: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = wav.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(wav.to_vec())
                    .file_name("utterance.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Whisper request failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await?;
        let text = result.text.trim().to_string();
        tracing::info!(transcript = %text, "transcription complete");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_key() {
        assert!(SpeechToText::new(String::new(), "whisper-1".to_string()).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_errors() {
        let stt = SpeechToText::new("sk-test".to_string(), "whisper-1".to_string())
            .unwrap()
            .with_url("http://127.0.0.1:9/v1/audio/transcriptions");
        assert!(stt.transcribe(b"RIFF").await.is_err());
    }
}
