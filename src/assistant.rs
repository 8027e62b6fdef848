//! The assistant: utterance in, action or reply out
//!
//! [`Assistant::handle_text`] is the whole decision for one utterance:
//! classify it, then run a macro, resolve and open a target, or answer.
//! [`Assistant::run_voice`] wraps that in the microphone loop.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::actions::{ActionStore, launch_reason};
use crate::config::{Config, Trigger, VoiceConfig};
use crate::events::{EventBus, StatusEvent};
use crate::launch::{Launcher, SystemLauncher, open_resolved};
use crate::nlu::{Classifier, Utterance};
use crate::resolve::{ResolvedTarget, TargetResolver};
use crate::voice::{
    AudioCapture, AudioPlayback, SAMPLE_RATE, SpeechDetector, SpeechToText, TextToSpeech, WakeWord,
    samples_to_wav,
};
use crate::{Error, Result};

/// Reply when an action has nothing to open
pub const ASK_FOR_TARGET: &str = "Tell me which app, file, or folder to open.";

/// How often the voice loop drains the microphone
const TICK: Duration = Duration::from_millis(100);

/// Reply when a target could not be resolved
#[must_use]
pub fn not_found_reply(target: &str) -> String {
    format!("I couldn\u{2019}t find {target}. Give me a hint or add it to actions.yaml.")
}

/// What handling an utterance did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A macro ran
    Ran { intent: String },
    /// A target was resolved and launched
    Opened {
        target: String,
        resolved: ResolvedTarget,
    },
    /// An unresolved target was handed to the platform by name
    ShellOpened { target: String },
    /// Something to tell the user
    Say(String),
}

impl Outcome {
    /// The reply to speak, if any
    #[must_use]
    pub fn reply(&self) -> Option<&str> {
        match self {
            Self::Say(text) => Some(text),
            _ => None,
        }
    }
}

/// TTS client plus output device
#[derive(Debug, Clone)]
struct Speaker {
    tts: TextToSpeech,
    playback: AudioPlayback,
}

/// Voice-driven desktop assistant
pub struct Assistant {
    resolver: Arc<TargetResolver>,
    actions: Mutex<ActionStore>,
    classifier: Classifier,
    launcher: Arc<dyn Launcher>,
    events: EventBus,
    shell_fallback: bool,
    speaker: Option<Speaker>,
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("classifier", &self.classifier)
            .field("shell_fallback", &self.shell_fallback)
            .field("speaks", &self.speaker.is_some())
            .finish_non_exhaustive()
    }
}

impl Assistant {
    /// Create an assistant from configuration
    ///
    /// Speech output is enabled when TTS is configured, an API key is set
    /// and an output device opens; otherwise replies are only printed.
    #[must_use]
    pub fn new(config: &Config, resolver: Arc<TargetResolver>, events: EventBus) -> Self {
        let classifier = Classifier::new(config.openai_api_key.clone(), config.llm.model.clone());
        let speaker = if config.voice.tts_enabled {
            build_speaker(config)
        } else {
            None
        };

        let actions = ActionStore::load(&config.actions_path);
        tracing::info!(
            path = %config.actions_path.display(),
            actions = actions.len(),
            "actions loaded"
        );

        Self {
            resolver,
            actions: Mutex::new(actions),
            classifier,
            launcher: Arc::new(SystemLauncher),
            events,
            shell_fallback: config.resolver.shell_fallback,
            speaker,
        }
    }

    /// Create an assistant from explicit parts, without speech output
    #[must_use]
    pub fn from_parts(
        resolver: Arc<TargetResolver>,
        actions: ActionStore,
        classifier: Classifier,
        launcher: Arc<dyn Launcher>,
        events: EventBus,
    ) -> Self {
        Self {
            resolver,
            actions: Mutex::new(actions),
            classifier,
            launcher,
            events,
            shell_fallback: false,
            speaker: None,
        }
    }

    /// Hand unresolved targets to the platform opener by name
    #[must_use]
    pub const fn with_shell_fallback(mut self, enabled: bool) -> Self {
        self.shell_fallback = enabled;
        self
    }

    /// The shared target resolver
    #[must_use]
    pub fn resolver(&self) -> &Arc<TargetResolver> {
        &self.resolver
    }

    /// Re-read `actions.yaml` if it changed on disk
    pub fn reload_actions(&self) -> bool {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reload_if_changed()
    }

    fn intent_names(&self) -> Vec<String> {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .names()
            .map(ToString::to_string)
            .collect()
    }

    /// Classify and act on one utterance, then speak any reply
    pub async fn handle_text(&self, text: &str) -> Outcome {
        let text = text.trim();
        self.reload_actions();
        self.events.status(&StatusEvent::Heard {
            text: text.to_string(),
        });

        let intents = self.intent_names();
        let utterance = self
            .classifier
            .classify(text, intents.iter().map(String::as_str))
            .await;

        let outcome = self.execute(utterance).await;
        if let Some(reply) = outcome.reply() {
            self.say(reply).await;
        }
        outcome
    }

    /// Carry out a classified utterance
    pub async fn execute(&self, utterance: Utterance) -> Outcome {
        match utterance {
            Utterance::Macro { intent } => self.run_macro(intent),
            Utterance::Open { target, hints } => self.open(target, hints).await,
            Utterance::MissingTarget => Outcome::Say(ASK_FOR_TARGET.to_string()),
            Utterance::Chat { reply } => Outcome::Say(reply),
        }
    }

    fn run_macro(&self, intent: String) -> Outcome {
        let actions = self.actions.lock().unwrap_or_else(PoisonError::into_inner);
        match actions.run(&intent, self.launcher.as_ref()) {
            Ok(action) => {
                println!("[\u{2713}] Ran: {intent} \u{2192} {}", action.path);
                Outcome::Ran { intent }
            }
            Err(reply) => {
                self.events.status(&StatusEvent::Error {
                    message: reply.clone(),
                });
                Outcome::Say(reply)
            }
        }
    }

    async fn open(&self, target: String, hints: Vec<String>) -> Outcome {
        let resolver = Arc::clone(&self.resolver);
        let lookup = target.clone();
        let resolved = match tokio::task::spawn_blocking(move || resolver.resolve(&lookup, &hints)).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::error!(error = %e, target = %target, "resolver task failed");
                ResolvedTarget::NotFound
            }
        };

        tracing::info!(target = %target, resolved = %resolved, "resolved target");

        if resolved.path().is_none() {
            return self.open_unresolved(target);
        }

        match open_resolved(self.launcher.as_ref(), &resolved) {
            Ok(()) => {
                if let Some(path) = resolved.path() {
                    println!("[\u{2713}] Opened: {}", path.display());
                    self.events.status(&StatusEvent::Opened {
                        kind: resolved.kind().to_string(),
                        path: path.display().to_string(),
                    });
                }
                Outcome::Opened { target, resolved }
            }
            Err(e) => {
                tracing::warn!(error = %e, target = %target, "open failed");
                let reply = format!("Opening failed: {}", launch_reason(&e));
                self.events.status(&StatusEvent::Error {
                    message: reply.clone(),
                });
                Outcome::Say(reply)
            }
        }
    }

    fn open_unresolved(&self, target: String) -> Outcome {
        self.events.status(&StatusEvent::NotFound {
            target: target.clone(),
        });

        if self.shell_fallback {
            match self.launcher.shell_open(&target) {
                Ok(()) => {
                    tracing::info!(target = %target, "handed target to platform opener");
                    return Outcome::ShellOpened { target };
                }
                Err(e) => tracing::debug!(error = %e, target = %target, "shell open failed"),
            }
        }

        Outcome::Say(not_found_reply(&target))
    }

    /// Print a reply and speak it when speech output is available
    ///
    /// Speech failures are logged and otherwise ignored.
    pub async fn say(&self, text: &str) {
        println!("Jarvis: {text}");
        tracing::info!(reply = text, "reply");
        self.events.status(&StatusEvent::Reply {
            text: text.to_string(),
        });

        let Some(speaker) = self.speaker.clone() else {
            return;
        };
        if let Err(e) = speak(speaker, text).await {
            tracing::warn!(error = %e, "speech output failed");
        }
    }

    /// Read typed utterances from stdin until EOF or `shutdown`
    ///
    /// # Errors
    ///
    /// Returns error if stdin can't be read
    pub async fn run_text(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        tokio::pin!(shutdown);

        println!("Jarvis ready. Type a command, Ctrl+C to quit.");
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                line = lines.next_line() => match line? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => {
                        self.handle_text(&line).await;
                    }
                    None => break,
                },
            }
        }
        Ok(())
    }

    /// Listen on the microphone until `shutdown` resolves
    ///
    /// # Errors
    ///
    /// Returns error if the microphone can't be opened or no API key is set
    #[allow(clippy::future_not_send)]
    pub async fn run_voice(&self, voice: &VoiceConfig, api_key: &str, shutdown: impl Future<Output = ()>) -> Result<()> {
        let stt = SpeechToText::new(api_key.to_string(), voice.stt_model.clone())?;
        let mut capture = AudioCapture::new()?;
        let mut session = VoiceSession {
            trigger: voice.trigger,
            wake: WakeWord::new(&voice.wake_word),
            detector: SpeechDetector::new(voice.phrase_limit_secs),
            armed: voice.trigger != Trigger::Enter,
            awaiting_command: false,
        };

        // Enter on stdin arms one utterance
        let (enter_tx, mut enter_rx) = mpsc::channel::<()>(4);
        if voice.trigger == Trigger::Enter {
            tokio::spawn(async move {
                let mut lines = BufReader::new(tokio::io::stdin()).lines();
                while let Ok(Some(_)) = lines.next_line().await {
                    if enter_tx.send(()).await.is_err() {
                        break;
                    }
                }
            });
        }

        capture.start()?;
        println!("{}", session.greeting());
        tracing::info!(trigger = ?voice.trigger, wake_word = %session.wake.phrase(), "voice loop running");
        if session.armed {
            self.events.status(&StatusEvent::Listening);
        }

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                Some(()) = enter_rx.recv() => {
                    capture.clear_buffer();
                    session.arm();
                    println!("\u{1F3A4} Listening...");
                    self.events.status(&StatusEvent::Listening);
                }
                () = tokio::time::sleep(TICK) => {
                    self.reload_actions();
                    let samples = capture.take_buffer();
                    if !session.armed {
                        continue;
                    }
                    let Some(segment) = session.detector.process(&samples) else {
                        continue;
                    };
                    if let Err(e) = self.process_segment(&mut session, &stt, &segment).await {
                        tracing::error!(error = %e, "voice processing error");
                    }
                    // Drop whatever was captured while we were busy (including our own voice)
                    capture.clear_buffer();
                }
            }
        }

        capture.stop();
        Ok(())
    }

    async fn process_segment(&self, session: &mut VoiceSession, stt: &SpeechToText, segment: &[f32]) -> Result<()> {
        let wav = samples_to_wav(segment, SAMPLE_RATE)?;
        let transcript = match stt.transcribe(&wav).await {
            Ok(text) => text,
            Err(e) => {
                self.say(&format!("Transcription had a hiccup: {}", stt_reason(&e))).await;
                session.consume();
                return Ok(());
            }
        };
        println!("You (voice): {transcript}");

        match session.command(&transcript) {
            Command::Ignore => {
                tracing::debug!(transcript = %transcript, "no wake word, ignoring");
            }
            Command::Prompt => {
                self.say("Yes?").await;
                self.events.status(&StatusEvent::Listening);
            }
            Command::Run(text) => {
                self.handle_text(&text).await;
            }
        }
        Ok(())
    }
}

fn stt_reason(e: &Error) -> String {
    match e {
        Error::Stt(reason) => reason.clone(),
        other => other.to_string(),
    }
}

/// What to do with one transcript
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Ignore,
    Prompt,
    Run(String),
}

/// Trigger bookkeeping for the voice loop
struct VoiceSession {
    trigger: Trigger,
    wake: WakeWord,
    detector: SpeechDetector,
    armed: bool,
    awaiting_command: bool,
}

impl VoiceSession {
    fn greeting(&self) -> String {
        match self.trigger {
            Trigger::WakeWord => format!(
                "Jarvis ready. Say \"{}\" followed by a command. Ctrl+C to quit.",
                self.wake.phrase()
            ),
            Trigger::Always => "Jarvis ready. Just speak a command. Ctrl+C to quit.".to_string(),
            Trigger::Enter => "Jarvis ready. Press Enter, then speak one command. Ctrl+C to quit.".to_string(),
        }
    }

    fn arm(&mut self) {
        self.detector.reset();
        self.armed = true;
    }

    /// An utterance was used up; one-shot triggers disarm
    fn consume(&mut self) {
        if self.trigger == Trigger::Enter {
            self.armed = false;
        }
    }

    fn command(&mut self, transcript: &str) -> Command {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            self.consume();
            return Command::Ignore;
        }

        match self.trigger {
            Trigger::Always => Command::Run(transcript.to_string()),
            Trigger::Enter => {
                self.consume();
                Command::Run(transcript.to_string())
            }
            Trigger::WakeWord => {
                if std::mem::take(&mut self.awaiting_command) {
                    return Command::Run(transcript.to_string());
                }
                match self.wake.strip(transcript) {
                    None => Command::Ignore,
                    Some(rest) if rest.is_empty() => {
                        self.awaiting_command = true;
                        Command::Prompt
                    }
                    Some(rest) => Command::Run(rest),
                }
            }
        }
    }
}

fn build_speaker(config: &Config) -> Option<Speaker> {
    let api_key = config.openai_api_key.clone()?;
    let tts = TextToSpeech::new(
        api_key,
        config.voice.tts_model.clone(),
        config.voice.tts_voice.clone(),
        config.voice.tts_speed,
    )
    .inspect_err(|e| tracing::warn!(error = %e, "TTS unavailable"))
    .ok()?;
    let playback = AudioPlayback::new()
        .inspect_err(|e| tracing::warn!(error = %e, "no audio output, replies will be printed only"))
        .ok()?;
    Some(Speaker { tts, playback })
}

async fn speak(speaker: Speaker, text: &str) -> Result<()> {
    let mp3 = speaker.tts.synthesize(text).await?;
    tokio::task::spawn_blocking(move || speaker.playback.play_mp3(&mp3))
        .await
        .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::parse_actions;
    use crate::launch::testing::Recorder;
    use crate::resolve::{AliasTable, AppIndex, AppSnapshot, FuzzyMatcher, IndexRoots};
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn assistant(root: &Path, launcher: Arc<Recorder>) -> Assistant {
        let index = AppIndex::new();
        index.publish(AppSnapshot::from_paths([PathBuf::from("/apps/chrome.exe")]));
        let resolver = TargetResolver::from_parts(
            vec![root.to_path_buf()],
            IndexRoots::default(),
            AliasTable::with_defaults(),
            index,
            FuzzyMatcher::default(),
        );
        let actions = parse_actions("intents:\n  backup: { type: exec, path: make-backup }\n").unwrap();

        Assistant::from_parts(
            Arc::new(resolver),
            ActionStore::from_actions(actions),
            Classifier::new(None, "gpt-4o-mini"),
            launcher,
            EventBus::new(),
        )
    }

    #[tokio::test]
    async fn test_macro_runs_action() {
        let dir = TempDir::new().unwrap();
        let launcher = Arc::new(Recorder::default());
        let jarvis = assistant(dir.path(), launcher.clone());

        let outcome = jarvis
            .execute(Utterance::Macro {
                intent: "backup".to_string(),
            })
            .await;

        assert_eq!(
            outcome,
            Outcome::Ran {
                intent: "backup".to_string()
            }
        );
        assert_eq!(launcher.calls(), ["exec make-backup"]);
    }

    #[tokio::test]
    async fn test_open_resolves_and_launches() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("Budget 2024.xlsx");
        std::fs::write(&file, b"").unwrap();

        let launcher = Arc::new(Recorder::default());
        let jarvis = assistant(dir.path(), launcher.clone());
        let mut events = jarvis.events.subscribe();

        let outcome = jarvis
            .execute(Utterance::Open {
                target: "budget".to_string(),
                hints: Vec::new(),
            })
            .await;

        assert_eq!(
            outcome,
            Outcome::Opened {
                target: "budget".to_string(),
                resolved: ResolvedTarget::MatchedFile(file.clone()),
            }
        );
        assert_eq!(launcher.calls(), [format!("open {}", file.display())]);

        let event = events.recv().await.unwrap();
        assert_eq!(event["type"], "opened");
        assert_eq!(event["kind"], "matched_file");
    }

    #[tokio::test]
    async fn test_open_indexed_app() {
        let dir = TempDir::new().unwrap();
        let launcher = Arc::new(Recorder::default());
        let jarvis = assistant(dir.path(), launcher.clone());

        let outcome = jarvis
            .execute(Utterance::Open {
                target: "Chrome".to_string(),
                hints: Vec::new(),
            })
            .await;

        assert!(matches!(
            outcome,
            Outcome::Opened {
                resolved: ResolvedTarget::IndexedApp(_),
                ..
            }
        ));
        assert_eq!(launcher.calls(), ["open /apps/chrome.exe"]);
    }

    #[tokio::test]
    async fn test_not_found_reply() {
        let dir = TempDir::new().unwrap();
        let launcher = Arc::new(Recorder::default());
        let jarvis = assistant(dir.path(), launcher.clone());

        let outcome = jarvis
            .execute(Utterance::Open {
                target: "zzqxw123".to_string(),
                hints: Vec::new(),
            })
            .await;

        assert_eq!(outcome, Outcome::Say(not_found_reply("zzqxw123")));
        assert!(launcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_shell_fallback() {
        let dir = TempDir::new().unwrap();
        let launcher = Arc::new(Recorder::default());
        let jarvis = assistant(dir.path(), launcher.clone()).with_shell_fallback(true);

        let outcome = jarvis
            .execute(Utterance::Open {
                target: "zzqxw123".to_string(),
                hints: Vec::new(),
            })
            .await;

        assert_eq!(
            outcome,
            Outcome::ShellOpened {
                target: "zzqxw123".to_string()
            }
        );
        assert_eq!(launcher.calls(), ["shell zzqxw123"]);
    }

    #[tokio::test]
    async fn test_missing_target_and_chat() {
        let dir = TempDir::new().unwrap();
        let jarvis = assistant(dir.path(), Arc::new(Recorder::default()));

        assert_eq!(
            jarvis.execute(Utterance::MissingTarget).await.reply(),
            Some(ASK_FOR_TARGET)
        );
        assert_eq!(
            jarvis
                .execute(Utterance::Chat {
                    reply: "Hello!".to_string()
                })
                .await
                .reply(),
            Some("Hello!")
        );
    }

    #[tokio::test]
    async fn test_handle_text_without_key_replies() {
        let dir = TempDir::new().unwrap();
        let jarvis = assistant(dir.path(), Arc::new(Recorder::default()));

        let outcome = jarvis.handle_text("open chrome").await;
        assert_eq!(outcome.reply(), Some(crate::nlu::FALLBACK_REPLY));
    }

    fn session(trigger: Trigger) -> VoiceSession {
        VoiceSession {
            trigger,
            wake: WakeWord::new("jarvis"),
            detector: SpeechDetector::new(6.0),
            armed: trigger != Trigger::Enter,
            awaiting_command: false,
        }
    }

    #[test]
    fn test_wake_word_session() {
        let mut s = session(Trigger::WakeWord);
        assert_eq!(s.command("open chrome"), Command::Ignore);
        assert_eq!(s.command("Jarvis, open chrome"), Command::Run("open chrome".to_string()));

        // Wake word alone prompts, the next utterance is the command
        assert_eq!(s.command("Jarvis"), Command::Prompt);
        assert_eq!(s.command("open my notes"), Command::Run("open my notes".to_string()));
        assert_eq!(s.command("open my notes"), Command::Ignore);
    }

    #[test]
    fn test_enter_session_is_one_shot() {
        let mut s = session(Trigger::Enter);
        assert!(!s.armed);
        s.arm();
        assert_eq!(s.command("open chrome"), Command::Run("open chrome".to_string()));
        assert!(!s.armed);
    }

    #[test]
    fn test_always_session() {
        let mut s = session(Trigger::Always);
        assert_eq!(s.command("what time is it"), Command::Run("what time is it".to_string()));
        assert_eq!(s.command("   "), Command::Ignore);
        assert!(s.armed);
    }
}
