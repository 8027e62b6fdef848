//! TOML configuration file loading
//!
//! Supports `~/.config/jarvis/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::Trigger;
use crate::resolve::ScorerKind;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct JarvisConfigFile {
    /// Path to the action macros file
    #[serde(default)]
    pub actions_path: Option<String>,

    /// Target resolution configuration
    #[serde(default)]
    pub resolver: ResolverFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Language model configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Status overlay server configuration
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// Target resolution configuration
#[derive(Debug, Default, Deserialize)]
pub struct ResolverFileConfig {
    /// Directories with shortcuts and documents, in priority order
    pub search_roots: Option<Vec<String>>,

    /// Directories with installed executables
    pub install_roots: Option<Vec<String>>,

    /// Extensions indexed under the search roots (e.g. ".lnk", "desktop")
    pub search_extensions: Option<Vec<String>>,

    /// Extensions indexed under the install roots
    pub install_extensions: Option<Vec<String>>,

    /// Extra spoken-name aliases, merged over the built-in table
    #[serde(default)]
    pub aliases: BTreeMap<String, Vec<String>>,

    /// Minimum fuzzy score (0-100)
    pub threshold: Option<u8>,

    /// Fuzzy scorer ("weighted" or "skim")
    pub scorer: Option<ScorerKind>,

    /// Hand unresolved targets to the platform opener
    pub shell_fallback: Option<bool>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable voice input/output
    pub enabled: Option<bool>,

    /// What starts listening for a command
    pub trigger: Option<Trigger>,

    /// Wake word (e.g. "jarvis")
    pub wake_word: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// Speak replies aloud
    pub tts_enabled: Option<bool>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f64>,

    /// Longest phrase recorded after the trigger, in seconds
    pub phrase_limit_secs: Option<f32>,
}

/// Language model configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "gpt-4o-mini")
    pub model: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
}

/// Status overlay server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Serve the overlay
    pub ui_enabled: Option<bool>,

    /// Port to listen on
    pub port: Option<u16>,

    /// Directory with the overlay's static files
    pub static_dir: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `JarvisConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> JarvisConfigFile {
    config_file_path().map_or_else(JarvisConfigFile::default, |path| load_from(&path))
}

/// Load a TOML config file from an explicit path
///
/// Missing or malformed files fall back to defaults with a warning.
pub fn load_from(path: &Path) -> JarvisConfigFile {
    if !path.exists() {
        return JarvisConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                JarvisConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            JarvisConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/jarvis/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("jarvis").join("config.toml"))
}
