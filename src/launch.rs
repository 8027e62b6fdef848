//! Launching resolved targets
//!
//! Every launch is fire-and-forget: the child is spawned detached from our
//! stdio and never waited on. Launching must happen inside a tokio runtime,
//! which reaps the dropped children.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::resolve::ResolvedTarget;
use crate::{Error, Result};

/// Process launching seam
///
/// The assistant only talks to this trait, so tests can record launches
/// instead of spawning processes.
pub trait Launcher: Send + Sync {
    /// Open a file, folder or shortcut with the platform opener
    ///
    /// # Errors
    ///
    /// Returns error if the opener could not be spawned
    fn open_path(&self, path: &Path) -> Result<()>;

    /// Start an executable directly
    ///
    /// # Errors
    ///
    /// Returns error if the process could not be spawned
    fn spawn(&self, program: &Path) -> Result<()>;

    /// Run a command line through the platform shell
    ///
    /// # Errors
    ///
    /// Returns error if the shell could not be spawned
    fn run_command(&self, command: &str) -> Result<()>;

    /// Ask the platform to open something by name
    ///
    /// # Errors
    ///
    /// Returns error if the opener could not be spawned
    fn shell_open(&self, name: &str) -> Result<()>;
}

/// Launches through the host OS
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn open_path(&self, path: &Path) -> Result<()> {
        detach(open_command(path), "open")
    }

    fn spawn(&self, program: &Path) -> Result<()> {
        detach(Command::new(program), "spawn")
    }

    fn run_command(&self, command: &str) -> Result<()> {
        detach(shell(command), "exec")
    }

    fn shell_open(&self, name: &str) -> Result<()> {
        let cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.args(["/C", "start", ""]).arg(name);
            c
        } else if cfg!(target_os = "macos") {
            let mut c = Command::new("open");
            c.arg("-a").arg(name);
            c
        } else {
            let mut c = Command::new("xdg-open");
            c.arg(name);
            c
        };
        detach(cmd, "shell open")
    }
}

/// Platform file opener
const fn opener() -> &'static str {
    if cfg!(windows) {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    }
}

/// Opener invocation for `path`
///
/// Desktop entries are launched with `gio launch`; `xdg-open` would open
/// them in an editor.
fn open_command(path: &Path) -> Command {
    let desktop_entry = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("desktop"));

    if desktop_entry && cfg!(all(unix, not(target_os = "macos"))) {
        let mut c = Command::new("gio");
        c.arg("launch").arg(path);
        c
    } else {
        let mut c = Command::new(opener());
        c.arg(path);
        c
    }
}

fn shell(command: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    }
}

fn detach(mut cmd: Command, what: &str) -> Result<()> {
    let child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| Error::Launch(format!("{what} failed: {e}")))?;

    tracing::debug!(
        program = ?cmd.as_std().get_program(),
        pid = ?child.id(),
        "launched {what}"
    );

    // Dropped without waiting; the runtime reaps it once it exits
    drop(child);
    Ok(())
}

/// Launch a resolved target
///
/// Files, folders, shortcuts and indexed apps go through the platform opener;
/// executables found on `PATH` are started directly.
///
/// # Errors
///
/// Returns error if there is nothing to open or the launch fails
pub fn open_resolved(launcher: &dyn Launcher, target: &ResolvedTarget) -> Result<()> {
    match target {
        ResolvedTarget::DirectPath(path)
        | ResolvedTarget::MatchedFile(path)
        | ResolvedTarget::IndexedApp(path) => launcher.open_path(path),
        ResolvedTarget::PathExecutable(path) => launcher.spawn(path),
        ResolvedTarget::NotFound => Err(Error::Launch("nothing to open".to_string())),
    }
}

/// Recording launcher shared by unit tests
#[cfg(test)]
pub(crate) mod testing {
    use std::path::Path;
    use std::sync::Mutex;

    use super::Launcher;
    use crate::{Error, Result};

    /// Records every launch instead of spawning anything
    #[derive(Debug, Default)]
    pub(crate) struct Recorder {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    impl Recorder {
        /// A recorder whose launches all fail
        pub(crate) fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        /// Launches so far, as `"<verb> <arg>"`
        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, verb: &str, arg: impl std::fmt::Display) -> Result<()> {
            self.calls.lock().unwrap().push(format!("{verb} {arg}"));
            if self.fail {
                return Err(Error::Launch(format!("{verb} failed: no opener")));
            }
            Ok(())
        }
    }

    impl Launcher for Recorder {
        fn open_path(&self, path: &Path) -> Result<()> {
            self.record("open", path.display())
        }
        fn spawn(&self, program: &Path) -> Result<()> {
            self.record("spawn", program.display())
        }
        fn run_command(&self, command: &str) -> Result<()> {
            self.record("exec", command)
        }
        fn shell_open(&self, name: &str) -> Result<()> {
            self.record("shell", name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::Recorder;
    use super::*;
    use std::path::PathBuf;

    #[cfg(target_os = "linux")]
    #[test]
    fn test_desktop_entries_open_with_gio() {
        let cmd = open_command(Path::new("/usr/share/applications/firefox.desktop"));
        let inner = cmd.as_std();
        assert_eq!(inner.get_program(), "gio");
        let args: Vec<_> = inner.get_args().collect();
        assert_eq!(args, ["launch", "/usr/share/applications/firefox.desktop"]);

        let cmd = open_command(Path::new("/home/me/report.pdf"));
        assert_eq!(cmd.as_std().get_program(), "xdg-open");
    }

    #[test]
    fn test_open_resolved_by_kind() {
        let launcher = Recorder::default();
        open_resolved(&launcher, &ResolvedTarget::MatchedFile(PathBuf::from("/d/a.pdf"))).unwrap();
        open_resolved(&launcher, &ResolvedTarget::IndexedApp(PathBuf::from("/p/app.exe"))).unwrap();
        open_resolved(&launcher, &ResolvedTarget::PathExecutable(PathBuf::from("/usr/bin/vim"))).unwrap();

        assert_eq!(
            launcher.calls(),
            ["open /d/a.pdf", "open /p/app.exe", "spawn /usr/bin/vim"]
        );
    }

    #[test]
    fn test_open_not_found_is_error() {
        let launcher = Recorder::default();
        let err = open_resolved(&launcher, &ResolvedTarget::NotFound).unwrap_err();
        assert!(matches!(err, Error::Launch(_)));
        assert!(launcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_missing_program_fails() {
        let err = SystemLauncher
            .spawn(Path::new("/definitely/not/a/real/program"))
            .unwrap_err();
        assert!(err.to_string().contains("spawn failed"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_command_is_fire_and_forget() {
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("ran");

        SystemLauncher
            .run_command(&format!("touch '{}'", marker.display()))
            .unwrap();

        // Returns before the child finishes; the file shows up shortly after
        for _ in 0..50 {
            if marker.exists() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("launched command never ran");
    }
}
