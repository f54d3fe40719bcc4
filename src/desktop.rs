//! Desktop notification integration
//!
//! Native notifications go through the platform's notifier command:
//! `notify-send` on Linux and BSD, `osascript` on macOS.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::config::ConsoleConfig;
use crate::error::{Result, RoombookError};

/// How a notifier executable expects its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesktopBackend {
    NotifySend(PathBuf),
    AppleScript(PathBuf),
}

impl DesktopBackend {
    /// Pick the argument style from the executable name.
    pub fn from_path(path: &Path) -> Self {
        let is_osascript = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .is_some_and(|stem| stem.eq_ignore_ascii_case("osascript"));
        if is_osascript {
            DesktopBackend::AppleScript(path.to_path_buf())
        } else {
            DesktopBackend::NotifySend(path.to_path_buf())
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            DesktopBackend::NotifySend(path) | DesktopBackend::AppleScript(path) => path,
        }
    }

    fn command(&self, title: &str, body: &str) -> Command {
        match self {
            DesktopBackend::NotifySend(path) => {
                let mut command = Command::new(path);
                command.arg("--app-name=roombook").arg(title).arg(body);
                command
            }
            DesktopBackend::AppleScript(path) => {
                let mut command = Command::new(path);
                command.arg("-e").arg(format!(
                    "display notification {} with title {}",
                    applescript_string(body),
                    applescript_string(title)
                ));
                command
            }
        }
    }
}

/// Quote text as an AppleScript string literal.
fn applescript_string(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Locate a notifier, preferring the configured one, and remember it.
pub async fn detect_notifier(config: &mut ConsoleConfig, config_path: &Path) -> Result<Option<PathBuf>> {
    if let Some(ref path) = config.notifier_path {
        if path.is_file() {
            return Ok(Some(path.clone()));
        }
    }

    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &["osascript"]
    } else if cfg!(target_os = "windows") {
        &[]
    } else {
        &["notify-send"]
    };

    for name in candidates {
        if let Ok(path) = which::which(name) {
            debug!(path = %path.display(), "found desktop notifier");
            config.notifier_path = Some(path.clone());
            config.save(config_path).await?;
            return Ok(Some(path));
        }
    }

    Ok(None)
}

/// Native notification channel backed by a notifier executable
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    backend: DesktopBackend,
}

impl DesktopNotifier {
    pub fn from_path(path: &Path) -> Self {
        Self {
            backend: DesktopBackend::from_path(path),
        }
    }

    /// Show a notification; errors when the notifier cannot run or fails.
    pub fn dispatch(&self, title: &str, body: &str) -> Result<()> {
        let output = self
            .backend
            .command(title, body)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                RoombookError::io_from_error(
                    format!("Failed to run {}", self.backend.path().display()),
                    e,
                )
            })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(RoombookError::internal(format!(
                "{} exited with {}: {}",
                self.backend.path().display(),
                output.status,
                stderr.trim()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_path() {
        assert_eq!(
            DesktopBackend::from_path(Path::new("/usr/bin/osascript")),
            DesktopBackend::AppleScript(PathBuf::from("/usr/bin/osascript"))
        );
        assert_eq!(
            DesktopBackend::from_path(Path::new("/usr/bin/notify-send")),
            DesktopBackend::NotifySend(PathBuf::from("/usr/bin/notify-send"))
        );
    }

    #[test]
    fn test_applescript_quoting() {
        assert_eq!(applescript_string(r#"Lab "A""#), r#""Lab \"A\"""#);
    }

    #[test]
    fn test_missing_executable_fails_dispatch() {
        let notifier = DesktopNotifier::from_path(Path::new("/nonexistent/notify-send"));
        assert!(notifier.dispatch("title", "body").is_err());
    }
}
