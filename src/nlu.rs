//! Utterance classification
//!
//! A chat-completions model turns what the user said into either an action
//! (a named macro or a thing to open) or a short chat reply. The model is
//! asked for JSON only and its answer is parsed leniently.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Reply used when classification fails for any reason
pub const FALLBACK_REPLY: &str = "I got tongue-tied there. Mind asking again?";

/// Reply used when the model returns chat without text
pub const DEFAULT_REPLY: &str = "Okay.";

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Utterance {
    /// Run a macro from `actions.yaml`
    Macro {
        /// Action name
        intent: String,
    },
    /// Open a file, folder or app
    Open {
        /// Thing to open, as spoken
        target: String,
        /// Synonyms or extra words that may appear in the file name
        hints: Vec<String>,
    },
    /// An action without anything to act on
    MissingTarget,
    /// Answer conversationally
    Chat {
        /// Reply text
        reply: String,
    },
}

impl Utterance {
    /// Interpret a classifier response
    ///
    /// `is_known` decides which intent names are real macros. An action with
    /// an unknown intent falls back to its target, if any.
    #[must_use]
    pub fn parse(value: &Value, is_known: impl Fn(&str) -> bool) -> Self {
        let field = |name: &str| value.get(name).and_then(Value::as_str).map(str::trim);

        if field("mode") == Some("action") {
            if let Some(intent) = field("intent").filter(|i| is_known(i)) {
                return Self::Macro {
                    intent: intent.to_string(),
                };
            }

            return match field("target").filter(|t| !t.is_empty()) {
                Some(target) => Self::Open {
                    target: target.to_string(),
                    hints: value
                        .get("hints")
                        .and_then(Value::as_array)
                        .map(|hints| {
                            hints
                                .iter()
                                .filter_map(Value::as_str)
                                .map(str::trim)
                                .filter(|h| !h.is_empty())
                                .map(ToString::to_string)
                                .collect()
                        })
                        .unwrap_or_default(),
                },
                None => Self::MissingTarget,
            };
        }

        Self::Chat {
            reply: field("reply")
                .filter(|r| !r.is_empty())
                .unwrap_or(DEFAULT_REPLY)
                .to_string(),
        }
    }

    fn fallback() -> Self {
        Self::Chat {
            reply: FALLBACK_REPLY.to_string(),
        }
    }
}

/// Build the classifier system prompt for the given macro names
#[must_use]
pub fn system_prompt<'a>(intents: impl IntoIterator<Item = &'a str>) -> String {
    let intents: Vec<&str> = intents.into_iter().collect();
    let intents = serde_json::to_string(&intents).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"You are Jarvis, a witty, warm desktop assistant. Be friendly and lightly humorous, but always helpful and concise.
Return ONLY JSON with one of these shapes (no extra text):
{{"mode":"action","intent":"<one of INTENTS>"}}
{{"mode":"action","target":"<thing to open>","hints":["opt","synonym"]}}
{{"mode":"chat","reply":"<concise witty answer, <=80 words>"}}
INTENTS = {intents}
Rules:
- If user asks to open/launch/run/show a local app/file/folder, use mode=action.
- Prefer an exact intent from INTENTS if it matches; otherwise use target/hints.
- Otherwise use mode=chat and answer with a short, helpful, slightly witty response.
- Avoid sarcasm that could confuse; keep the joke light and optional.
"#
    )
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Chat-completions utterance classifier
#[derive(Clone)]
pub struct Classifier {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    url: String,
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("model", &self.model)
            .field("has_api_key", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl Classifier {
    /// Create a classifier for `model`
    #[must_use]
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.into(),
            url: CHAT_COMPLETIONS_URL.to_string(),
        }
    }

    /// Point the classifier at a different completions endpoint
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Classify an utterance
    ///
    /// Never fails: any transport or parse error is logged and answered with
    /// [`FALLBACK_REPLY`].
    pub async fn classify<'a>(
        &self,
        text: &str,
        intents: impl IntoIterator<Item = &'a str> + Clone,
    ) -> Utterance {
        let prompt = system_prompt(intents.clone());
        match self.complete(&prompt, text).await {
            Ok(value) => {
                let known: Vec<&str> = intents.into_iter().collect();
                let utterance = Utterance::parse(&value, |name| known.contains(&name));
                tracing::debug!(?utterance, "classified utterance");
                utterance
            }
            Err(e) => {
                tracing::warn!(error = %e, "classification failed");
                Utterance::fallback()
            }
        }
    }

    async fn complete(&self, system: &str, text: &str) -> Result<Value> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Nlu("OPENAI_API_KEY not set".to_string()))?;

        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Nlu(format!("completions API error {status}: {body}")));
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Nlu("empty completion".to_string()))?;

        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn known(name: &str) -> bool {
        name == "open_downloads"
    }

    #[test]
    fn test_parse_known_macro() {
        let u = Utterance::parse(&json!({"mode": "action", "intent": "open_downloads"}), known);
        assert_eq!(
            u,
            Utterance::Macro {
                intent: "open_downloads".to_string()
            }
        );
    }

    #[test]
    fn test_parse_open_target() {
        let u = Utterance::parse(
            &json!({"mode": "action", "target": " budget ", "hints": ["xlsx", "", 3, "finance"]}),
            known,
        );
        assert_eq!(
            u,
            Utterance::Open {
                target: "budget".to_string(),
                hints: vec!["xlsx".to_string(), "finance".to_string()],
            }
        );
    }

    #[test]
    fn test_unknown_intent_uses_target() {
        let u = Utterance::parse(
            &json!({"mode": "action", "intent": "launch_chrome", "target": "chrome"}),
            known,
        );
        assert!(matches!(u, Utterance::Open { ref target, .. } if target == "chrome"));
    }

    #[test]
    fn test_action_without_target() {
        let u = Utterance::parse(&json!({"mode": "action", "intent": "nope", "target": ""}), known);
        assert_eq!(u, Utterance::MissingTarget);
    }

    #[test]
    fn test_chat_reply_defaults() {
        assert_eq!(
            Utterance::parse(&json!({"mode": "chat", "reply": "Hi there"}), known),
            Utterance::Chat {
                reply: "Hi there".to_string()
            }
        );
        assert_eq!(
            Utterance::parse(&json!({"something": "else"}), known),
            Utterance::Chat {
                reply: DEFAULT_REPLY.to_string()
            }
        );
    }

    #[test]
    fn test_system_prompt_lists_intents() {
        let prompt = system_prompt(["open_downloads", "backup"]);
        assert!(prompt.contains(r#"INTENTS = ["open_downloads","backup"]"#));
        assert!(prompt.contains(r#"{"mode":"chat","reply":"#));
    }

    #[tokio::test]
    async fn test_classify_without_key_falls_back() {
        let classifier = Classifier::new(None, "gpt-4o-mini");
        let u = classifier.classify("open chrome", ["open_downloads"]).await;
        assert_eq!(
            u,
            Utterance::Chat {
                reply: FALLBACK_REPLY.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_classify_unreachable_endpoint_falls_back() {
        let classifier =
            Classifier::new(Some("sk-test".to_string()), "gpt-4o-mini").with_url("http://127.0.0.1:9/v1");
        let u = classifier.classify("hello", std::iter::empty()).await;
        assert!(matches!(u, Utterance::Chat { ref reply } if reply == FALLBACK_REPLY));
    }
}
