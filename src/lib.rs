//! Jarvis - Voice-triggered desktop assistant
//!
//! This library provides the core functionality for Jarvis:
//! - Target resolution (what does "open the budget sheet" mean on disk)
//! - Voice processing (capture, segmentation, wake word, STT, TTS)
//! - Utterance classification via a chat-completions model
//! - Action macros from `actions.yaml`
//! - A local status overlay server
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Interfaces                        │
//! │     Microphone  │  Typed text  │  Status overlay     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                    Assistant                         │
//! │   Wake word  │  STT/TTS  │  Classifier  │  Actions  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Target resolver                      │
//! │   Direct path  │  Root scan  │  App index  │  PATH  │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod actions;
pub mod api;
pub mod assistant;
pub mod config;
pub mod error;
pub mod events;
pub mod launch;
pub mod nlu;
pub mod resolve;
pub mod voice;

pub use actions::{Action, ActionStore};
pub use assistant::{Assistant, Outcome};
pub use config::Config;
pub use error::{Error, Result};
pub use events::{EventBus, StatusEvent};
pub use launch::{Launcher, SystemLauncher};
pub use nlu::{Classifier, Utterance};
pub use resolve::{AppIndex, ResolvedTarget, TargetResolver};
