//! Action macros from `actions.yaml`
//!
//! ```yaml
//! intents:
//!   open_downloads: { type: open, path: "~/Downloads" }
//!   start_backup:   { type: exec, path: 'robocopy "C:\Work" "D:\Backup" /MIR' }
//! ```
//!
//! The file is re-read whenever its modification time changes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::launch::Launcher;
use crate::resolve::expand_home;
use crate::{Error, Result};

/// A named macro
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// `exec` runs `path` through the shell, `open` opens it
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Command line or path
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Default, Deserialize)]
struct ActionsFile {
    #[serde(default)]
    intents: BTreeMap<String, Action>,
}

/// Parse the contents of an actions file
///
/// # Errors
///
/// Returns error if the YAML is malformed
pub fn parse_actions(content: &str) -> Result<BTreeMap<String, Action>> {
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    let file: Option<ActionsFile> = serde_yaml::from_str(content)?;
    Ok(file.unwrap_or_default().intents)
}

/// Current action table, hot-reloaded from disk
#[derive(Debug, Clone)]
pub struct ActionStore {
    path: PathBuf,
    actions: BTreeMap<String, Action>,
    modified: Option<SystemTime>,
}

impl ActionStore {
    /// Load actions from `path`
    ///
    /// A missing or invalid file gives an empty table.
    #[must_use]
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let modified = modified_time(&path);
        let actions = read_actions(&path);
        Self {
            path,
            actions,
            modified,
        }
    }

    /// Create a store that is not backed by a file
    #[must_use]
    pub fn from_actions(actions: BTreeMap<String, Action>) -> Self {
        Self {
            path: PathBuf::new(),
            actions,
            modified: None,
        }
    }

    /// Re-read the file if its modification time changed
    ///
    /// Returns true when the table was reloaded.
    pub fn reload_if_changed(&mut self) -> bool {
        if self.path.as_os_str().is_empty() {
            return false;
        }
        let modified = modified_time(&self.path);
        if modified == self.modified {
            return false;
        }

        self.modified = modified;
        self.actions = read_actions(&self.path);
        tracing::info!(
            path = %self.path.display(),
            actions = self.actions.len(),
            "reloaded actions"
        );
        true
    }

    /// Action names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    /// Look up an action
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    /// Whether an action exists
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Number of actions
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run a named action
    ///
    /// # Errors
    ///
    /// Returns a reply for the user if the action is unknown, has an
    /// unsupported type, or fails to launch
    pub fn run(&self, name: &str, launcher: &dyn Launcher) -> std::result::Result<&Action, String> {
        let Some(action) = self.get(name) else {
            return Err(format!("I don't have an action called {name} yet."));
        };

        let launched = match action.kind.as_str() {
            "exec" => launcher.run_command(&action.path),
            "open" => launcher.open_path(&expand_home(action.path.trim())),
            other => return Err(format!("Not sure how to run type '{other}'.")),
        };

        match launched {
            Ok(()) => {
                tracing::info!(action = name, path = %action.path, "ran action");
                Ok(action)
            }
            Err(e) => {
                tracing::warn!(action = name, error = %e, "action failed");
                Err(format!("That action failed: {}", launch_reason(&e)))
            }
        }
    }
}

/// The human part of a launch error
pub(crate) fn launch_reason(e: &Error) -> String {
    match e {
        Error::Launch(reason) => reason.clone(),
        other => other.to_string(),
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn read_actions(path: &Path) -> BTreeMap<String, Action> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read actions file");
            return BTreeMap::new();
        }
    };

    match parse_actions(&content) {
        Ok(actions) => {
            tracing::debug!(path = %path.display(), actions = actions.len(), "loaded actions");
            actions
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to parse actions file");
            BTreeMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launch::testing::Recorder;
    use std::time::Duration;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
intents:
  open_reports: { type: open, path: "/srv/reports" }
  backup:
    type: exec
    path: 'rsync -a "/home/me/work" /mnt/backup'
  weird: { type: teleport, path: "/moon" }
"#;

    #[test]
    fn test_parse_actions() {
        let actions = parse_actions(SAMPLE).unwrap();
        assert_eq!(actions.len(), 3);
        assert_eq!(actions["backup"].kind, "exec");
        assert_eq!(actions["open_reports"].path, "/srv/reports");
    }

    #[test]
    fn test_parse_empty_or_intentless() {
        assert!(parse_actions("").unwrap().is_empty());
        assert!(parse_actions("other: 1\n").unwrap().is_empty());
        assert!(parse_actions("intents: [unclosed").is_err());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = ActionStore::load(dir.path().join("actions.yaml"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_run_dispatches_by_type() {
        let store = ActionStore::from_actions(parse_actions(SAMPLE).unwrap());
        let launcher = Recorder::default();

        store.run("backup", &launcher).unwrap();
        store.run("open_reports", &launcher).unwrap();

        assert_eq!(
            launcher.calls(),
            ["exec rsync -a \"/home/me/work\" /mnt/backup", "open /srv/reports"]
        );
    }

    #[test]
    fn test_run_replies() {
        let store = ActionStore::from_actions(parse_actions(SAMPLE).unwrap());
        let launcher = Recorder::default();

        assert_eq!(
            store.run("lights", &launcher).unwrap_err(),
            "I don't have an action called lights yet."
        );
        assert_eq!(
            store.run("weird", &launcher).unwrap_err(),
            "Not sure how to run type 'teleport'."
        );
        assert!(launcher.calls().is_empty());

        let failing = Recorder::failing();
        assert_eq!(
            store.run("open_reports", &failing).unwrap_err(),
            "That action failed: open failed: no opener"
        );
    }

    #[test]
    fn test_reload_on_mtime_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("actions.yaml");
        std::fs::write(&path, "intents:\n  a: { type: open, path: /a }\n").unwrap();

        let mut store = ActionStore::load(&path);
        assert_eq!(store.names().collect::<Vec<_>>(), ["a"]);
        assert!(!store.reload_if_changed());

        std::fs::write(&path, "intents:\n  a: { type: open, path: /a }\n  b: { type: exec, path: ls }\n")
            .unwrap();
        let later = SystemTime::now() + Duration::from_secs(5);
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(later)
            .unwrap();

        assert!(store.reload_if_changed());
        assert_eq!(store.names().collect::<Vec<_>>(), ["a", "b"]);
        assert!(store.contains("b"));
    }
}
