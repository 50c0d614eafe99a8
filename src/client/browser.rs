//! Opening update URLs in an external browser.

use crate::common::error::{Error, Result};
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Runs the browser for one URL and returns once it has exited.
pub trait Launcher {
    fn launch(&mut self, browser: &Path, url: &str) -> Result<()>;
}

/// Launcher spawning the browser as a child process.
#[derive(Debug, Default)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    fn launch(&mut self, browser: &Path, url: &str) -> Result<()> {
        debug!("launching {} {}", browser.display(), url);
        let status = Command::new(browser).arg(url).status().map_err(|e| Error::Browser {
            browser: browser.to_path_buf(),
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !status.success() {
            return Err(Error::Browser {
                browser: browser.to_path_buf(),
                url: url.to_string(),
                reason: format!("exited with {}", status),
            });
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_successful_exit() {
        let mut launcher = ProcessLauncher;
        launcher.launch(Path::new("true"), "http://a/").unwrap();
    }

    #[test]
    fn test_failing_exit_is_browser_error() {
        let mut launcher = ProcessLauncher;
        let err = launcher.launch(Path::new("false"), "http://a/").unwrap_err();
        assert!(matches!(err, Error::Browser { .. }));
    }

    #[test]
    fn test_missing_binary_is_browser_error() {
        let mut launcher = ProcessLauncher;
        let err = launcher
            .launch(Path::new("/nonexistent/nyfiken-browser"), "http://a/")
            .unwrap_err();
        match err {
            Error::Browser { url, .. } => assert_eq!(url, "http://a/"),
            other => panic!("Expected browser error, got {:?}", other),
        }
    }
}
