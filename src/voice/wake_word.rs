//! Wake word matching on transcripts

/// A spoken wake phrase such as "jarvis" or "hey jarvis"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeWord {
    words: Vec<String>,
}

impl WakeWord {
    /// Create a matcher for `phrase`
    #[must_use]
    pub fn new(phrase: &str) -> Self {
        Self {
            words: phrase.split_whitespace().map(normalize_word).collect(),
        }
    }

    /// The phrase as matched
    #[must_use]
    pub fn phrase(&self) -> String {
        self.words.join(" ")
    }

    /// Find the wake phrase in a transcript and return what follows it
    ///
    /// Matching ignores case and punctuation around words. Returns `None` if
    /// the phrase is absent, and an empty string if nothing follows it.
    #[must_use]
    pub fn strip(&self, transcript: &str) -> Option<String> {
        if self.words.is_empty() {
            return Some(transcript.trim().to_string());
        }

        let tokens: Vec<&str> = transcript.split_whitespace().collect();
        let start = tokens.windows(self.words.len()).position(|window| {
            window
                .iter()
                .zip(&self.words)
                .all(|(token, word)| normalize_word(token) == *word)
        })?;

        let rest = tokens[start + self.words.len()..].join(" ");
        let rest = rest.trim_start_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace());
        tracing::debug!(wake_word = %self.phrase(), transcript, "wake word detected");
        Some(rest.to_string())
    }
}

fn normalize_word(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase()
}
