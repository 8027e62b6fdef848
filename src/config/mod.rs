//! Configuration management for Jarvis
//!
//! Every setting is layered: environment variable, then the TOML file, then
//! a built-in default.

pub mod file;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::resolve::index::{INSTALL_ROOT_EXTENSIONS, SEARCH_ROOT_EXTENSIONS};
use crate::resolve::{IndexRoots, ScorerKind, expand_home, fuzzy::DEFAULT_THRESHOLD};
use crate::{Error, Result};

/// Jarvis configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Target resolution
    pub resolver: ResolverConfig,

    /// Voice capture and speech
    pub voice: VoiceConfig,

    /// Utterance classification
    pub llm: LlmConfig,

    /// Status overlay server
    pub server: ServerConfig,

    /// `OpenAI` API key (classification, Whisper and TTS)
    pub openai_api_key: Option<String>,

    /// Path to `actions.yaml`
    pub actions_path: PathBuf,
}

/// Target resolution configuration
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Directories with shortcuts and documents, in priority order
    pub search_roots: Vec<PathBuf>,

    /// Directories with installed executables
    pub install_roots: Vec<PathBuf>,

    /// Extensions indexed under the search roots, lowercase with a leading dot
    pub search_extensions: Vec<String>,

    /// Extensions indexed under the install roots, lowercase with a leading dot
    pub install_extensions: Vec<String>,

    /// Extra aliases layered over the built-in table
    pub aliases: BTreeMap<String, Vec<String>>,

    /// Minimum fuzzy score (0-100)
    pub threshold: u8,

    /// Fuzzy scorer
    pub scorer: ScorerKind,

    /// Hand unresolved targets to the platform opener
    pub shell_fallback: bool,
}

impl ResolverConfig {
    /// Roots and extensions for an application index build
    #[must_use]
    pub fn index_roots(&self) -> IndexRoots {
        IndexRoots {
            search_roots: self.search_roots.clone(),
            install_roots: self.install_roots.clone(),
            search_extensions: self.search_extensions.clone(),
            install_extensions: self.install_extensions.clone(),
        }
    }
}

impl Default for ResolverConfig {
    /// No roots, built-in aliases only, default scorer and threshold
    fn default() -> Self {
        Self {
            search_roots: Vec::new(),
            install_roots: Vec::new(),
            search_extensions: default_search_extensions(),
            install_extensions: default_install_extensions(),
            aliases: BTreeMap::new(),
            threshold: DEFAULT_THRESHOLD,
            scorer: ScorerKind::default(),
            shell_fallback: false,
        }
    }
}

/// What arms the microphone for a command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Transcripts must start with the wake word
    #[default]
    WakeWord,
    /// Every detected utterance is a command
    Always,
    /// Pressing Enter arms exactly one utterance
    Enter,
}

impl FromStr for Trigger {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "wake_word" | "wake" => Ok(Self::WakeWord),
            "always" => Ok(Self::Always),
            "enter" | "push_to_talk" => Ok(Self::Enter),
            other => Err(Error::Config(format!("unknown trigger: {other}"))),
        }
    }
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable voice input
    pub enabled: bool,

    /// What arms the microphone
    pub trigger: Trigger,

    /// Wake word for [`Trigger::WakeWord`]
    pub wake_word: String,

    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// Speak replies aloud
    pub tts_enabled: bool,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f64,

    /// Longest phrase recorded after the trigger, in seconds
    pub phrase_limit_secs: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger: Trigger::WakeWord,
            wake_word: "jarvis".to_string(),
            stt_model: "whisper-1".to_string(),
            tts_enabled: true,
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            tts_speed: 1.0,
            phrase_limit_secs: 6.0,
        }
    }
}

/// Language model configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Chat completions model
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
        }
    }
}

/// Status overlay server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Serve the overlay
    pub ui_enabled: bool,

    /// Port to listen on
    pub port: u16,

    /// Directory with the overlay's static files
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ui_enabled: true,
            port: 8787,
            static_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from the environment and `~/.config/jarvis/config.toml`
    ///
    /// # Errors
    ///
    /// Returns error if a setting is out of range or unrecognized
    pub fn load() -> Result<Self> {
        Self::from_sources(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a setting is out of range or unrecognized
    pub fn from_sources(
        fc: file::JarvisConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let defaults = VoiceConfig::default();

        // Resolver (toml > platform default)
        let threshold = fc.resolver.threshold.unwrap_or(DEFAULT_THRESHOLD);
        if threshold > 100 {
            return Err(Error::Config(format!(
                "resolver.threshold must be 0-100, got {threshold}"
            )));
        }
        let resolver = ResolverConfig {
            search_roots: fc
                .resolver
                .search_roots
                .map_or_else(default_search_roots, |roots| expand_all(&roots)),
            install_roots: fc
                .resolver
                .install_roots
                .map_or_else(default_install_roots, |roots| expand_all(&roots)),
            search_extensions: fc
                .resolver
                .search_extensions
                .map_or_else(default_search_extensions, |exts| normalize_extensions(&exts)),
            install_extensions: fc
                .resolver
                .install_extensions
                .map_or_else(default_install_extensions, |exts| normalize_extensions(&exts)),
            aliases: fc.resolver.aliases,
            threshold,
            scorer: fc.resolver.scorer.unwrap_or_default(),
            shell_fallback: fc.resolver.shell_fallback.unwrap_or(false),
        };

        // Voice (env > toml > default)
        let trigger = match env("JARVIS_TRIGGER") {
            Some(s) => s.parse()?,
            None => fc.voice.trigger.unwrap_or_default(),
        };
        let voice = VoiceConfig {
            enabled: fc.voice.enabled.unwrap_or(defaults.enabled),
            trigger,
            wake_word: fc
                .voice
                .wake_word
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .unwrap_or(defaults.wake_word),
            stt_model: env("JARVIS_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or(defaults.stt_model),
            tts_enabled: fc.voice.tts_enabled.unwrap_or(defaults.tts_enabled),
            tts_model: env("JARVIS_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or(defaults.tts_model),
            tts_voice: fc.voice.tts_voice.unwrap_or(defaults.tts_voice),
            tts_speed: fc.voice.tts_speed.unwrap_or(defaults.tts_speed).clamp(0.25, 4.0),
            phrase_limit_secs: fc
                .voice
                .phrase_limit_secs
                .filter(|s| *s > 0.0)
                .unwrap_or(defaults.phrase_limit_secs),
        };

        let llm = LlmConfig {
            model: env("JARVIS_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| LlmConfig::default().model),
        };

        // Server (env > toml > default)
        let port = match env("JARVIS_UI_PORT") {
            Some(s) => s
                .parse()
                .map_err(|e| Error::Config(format!("invalid JARVIS_UI_PORT {s:?}: {e}")))?,
            None => fc.server.port.unwrap_or(ServerConfig::default().port),
        };
        let server = ServerConfig {
            ui_enabled: fc.server.ui_enabled.unwrap_or(true),
            port,
            static_dir: fc.server.static_dir.as_deref().map(expand_home),
        };

        let actions_path = env("JARVIS_ACTIONS")
            .or(fc.actions_path)
            .map_or_else(|| PathBuf::from("actions.yaml"), |p| expand_home(&p));

        Ok(Self {
            resolver,
            voice,
            llm,
            server,
            openai_api_key: env("OPENAI_API_KEY")
                .or(fc.api_keys.openai)
                .filter(|k| !k.is_empty()),
            actions_path,
        })
    }
}

fn expand_all(roots: &[String]) -> Vec<PathBuf> {
    roots.iter().map(|r| expand_home(r.trim())).collect()
}

/// Lowercase, trim and dot-prefix configured extensions; blanks are dropped
fn normalize_extensions(exts: &[String]) -> Vec<String> {
    exts.iter()
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{e}"))
        .collect()
}

/// Desktop entries and `AppImage`s on Linux and the BSDs
const FREEDESKTOP_SEARCH_EXTENSIONS: &[&str] = &[".desktop", ".appimage"];
const FREEDESKTOP_INSTALL_EXTENSIONS: &[&str] = &[".appimage"];

const fn uses_desktop_entries() -> bool {
    cfg!(all(unix, not(target_os = "macos")))
}

/// Default index extensions for search roots on the current platform
#[must_use]
pub fn default_search_extensions() -> Vec<String> {
    let exts = if uses_desktop_entries() {
        FREEDESKTOP_SEARCH_EXTENSIONS
    } else {
        SEARCH_ROOT_EXTENSIONS
    };
    exts.iter().map(ToString::to_string).collect()
}

/// Default index extensions for install roots on the current platform
#[must_use]
pub fn default_install_extensions() -> Vec<String> {
    let exts = if uses_desktop_entries() {
        FREEDESKTOP_INSTALL_EXTENSIONS
    } else {
        INSTALL_ROOT_EXTENSIONS
    };
    exts.iter().map(ToString::to_string).collect()
}

/// Default search roots for the current platform
///
/// Desktop, documents and downloads everywhere, plus the places the OS keeps
/// application shortcuts.
#[must_use]
pub fn default_search_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();

    if let Some(user) = directories::UserDirs::new() {
        roots.extend(user.desktop_dir().map(PathBuf::from));
        if cfg!(windows) {
            roots.push(user.home_dir().join("OneDrive").join("Desktop"));
        }
        roots.extend(user.document_dir().map(PathBuf::from));
        roots.extend(user.download_dir().map(PathBuf::from));
    }

    if cfg!(windows) {
        let start_menu = ["Microsoft", "Windows", "Start Menu", "Programs"];
        if let Some(base) = directories::BaseDirs::new() {
            roots.push(start_menu.iter().fold(base.data_dir().to_path_buf(), |p, c| p.join(c)));
        }
        let program_data =
            std::env::var_os("ProgramData").map_or_else(|| PathBuf::from(r"C:\ProgramData"), PathBuf::from);
        roots.push(start_menu.iter().fold(program_data, |p, c| p.join(c)));
    } else if cfg!(target_os = "macos") {
        roots.push(PathBuf::from("/Applications"));
        if let Some(base) = directories::BaseDirs::new() {
            roots.push(base.home_dir().join("Applications"));
        }
    } else {
        if let Some(base) = directories::BaseDirs::new() {
            roots.push(base.data_dir().join("applications"));
        }
        roots.push(PathBuf::from("/usr/share/applications"));
    }

    roots
}

/// Default install roots for the current platform
#[must_use]
pub fn default_install_roots() -> Vec<PathBuf> {
    if cfg!(windows) {
        let mut roots: Vec<PathBuf> = [
            ("ProgramFiles", r"C:\Program Files"),
            ("ProgramFiles(x86)", r"C:\Program Files (x86)"),
        ]
        .iter()
        .map(|(var, fallback)| std::env::var_os(var).map_or_else(|| PathBuf::from(fallback), PathBuf::from))
        .collect();
        if let Some(base) = directories::BaseDirs::new() {
            roots.push(base.data_local_dir().join("Programs"));
        }
        roots
    } else if cfg!(target_os = "macos") {
        vec![PathBuf::from("/Applications")]
    } else {
        vec![
            PathBuf::from("/usr/bin"),
            PathBuf::from("/usr/local/bin"),
            PathBuf::from("/opt"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(file::JarvisConfigFile::default(), env_of(&[])).unwrap();
        assert_eq!(config.resolver.threshold, 70);
        assert_eq!(config.resolver.scorer, ScorerKind::Weighted);
        assert!(!config.resolver.shell_fallback);
        assert_eq!(config.resolver.search_roots, default_search_roots());
        assert_eq!(config.resolver.search_extensions, default_search_extensions());
        assert_eq!(config.voice.trigger, Trigger::WakeWord);
        assert_eq!(config.voice.wake_word, "jarvis");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.server.port, 8787);
        assert_eq!(config.actions_path, PathBuf::from("actions.yaml"));
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    fn test_env_overrides_file() {
        let fc: file::JarvisConfigFile = toml::from_str(
            r#"
actions_path = "/etc/jarvis/actions.yaml"

[llm]
model = "from-file"

[server]
port = 9000
"#,
        )
        .unwrap();

        let config = Config::from_sources(
            fc,
            env_of(&[
                ("JARVIS_LLM_MODEL", "from-env"),
                ("JARVIS_UI_PORT", "9100"),
                ("JARVIS_TRIGGER", "always"),
                ("OPENAI_API_KEY", "sk-test"),
            ]),
        )
        .unwrap();

        assert_eq!(config.llm.model, "from-env");
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.voice.trigger, Trigger::Always);
        assert_eq!(config.actions_path, PathBuf::from("/etc/jarvis/actions.yaml"));
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_configured_roots_replace_defaults() {
        let fc: file::JarvisConfigFile = toml::from_str(
            r#"
[resolver]
search_roots = ["/srv/a", " /srv/b "]
install_roots = []
"#,
        )
        .unwrap();

        let config = Config::from_sources(fc, env_of(&[])).unwrap();
        assert_eq!(
            config.resolver.search_roots,
            [PathBuf::from("/srv/a"), PathBuf::from("/srv/b")]
        );
        assert!(config.resolver.install_roots.is_empty());
    }

    #[test]
    fn test_configured_extensions_feed_index() {
        let fc: file::JarvisConfigFile = toml::from_str(
            r#"
[resolver]
search_roots = ["/srv/a"]
install_roots = ["/srv/apps"]
search_extensions = ["desktop", ".LNK", "  "]
install_extensions = [".AppImage"]
"#,
        )
        .unwrap();

        let config = Config::from_sources(fc, env_of(&[])).unwrap();
        assert_eq!(config.resolver.search_extensions, [".desktop", ".lnk"]);
        assert_eq!(config.resolver.install_extensions, [".appimage"]);

        let roots = config.resolver.index_roots();
        assert_eq!(roots.search_roots, [PathBuf::from("/srv/a")]);
        assert_eq!(roots.install_roots, [PathBuf::from("/srv/apps")]);
        assert_eq!(roots.search_extensions, [".desktop", ".lnk"]);
        assert_eq!(roots.install_extensions, [".appimage"]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_linux_indexes_desktop_entries_by_default() {
        let config = Config::from_sources(file::JarvisConfigFile::default(), env_of(&[])).unwrap();
        assert!(config.resolver.search_extensions.contains(&".desktop".to_string()));
        assert!(!config.resolver.search_extensions.contains(&".exe".to_string()));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let fc: file::JarvisConfigFile = toml::from_str("[resolver]\nthreshold = 150\n").unwrap();
        assert!(Config::from_sources(fc, env_of(&[])).is_err());

        let bad_port = env_of(&[("JARVIS_UI_PORT", "eighty")]);
        assert!(Config::from_sources(file::JarvisConfigFile::default(), bad_port).is_err());

        let bad_trigger = env_of(&[("JARVIS_TRIGGER", "clap")]);
        assert!(Config::from_sources(file::JarvisConfigFile::default(), bad_trigger).is_err());
    }

    #[test]
    fn test_trigger_parse() {
        assert_eq!("wake-word".parse::<Trigger>().unwrap(), Trigger::WakeWord);
        assert_eq!("Enter".parse::<Trigger>().unwrap(), Trigger::Enter);
    }
}
