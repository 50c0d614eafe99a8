//! Program-wide settings read from `config.toml`.

use crate::common::error::{Error, Result};
use crate::common::paths::Paths;
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Seconds between two scheduled rechecks
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Seconds before a connect, read or write gives up
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Port shared by nyfikenc and nyfikend
pub const DEFAULT_PORT: u16 = 5239;

/// Mode for files nyfiken writes (owner read/write)
pub const DEFAULT_FILE_PERMS: u32 = 0o600;

/// Settings applying to every page unless a page overrides them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Seconds between scheduled scrapes
    pub interval: u64,
    /// Port for the nyfikenc/d connection
    pub port: u16,
    /// Seconds before network operations time out
    pub timeout: u64,
    /// Browser executable updates are opened with
    pub browser: Option<PathBuf>,
    /// Mail address notified when a page updates
    pub recv_mail: Option<String>,
    /// Strip functions applied before comparing pages
    pub strip_funcs: Vec<String>,
    /// Mode for files nyfiken creates
    pub file_perms: u32,
    /// Account used to send notification mail
    pub sender_mail: Option<SenderMail>,
}

/// Outgoing mail account, used by the mail notifier.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SenderMail {
    pub address: String,
    pub password: String,
    pub auth_server: String,
    pub out_server: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL_SECS,
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT_SECS,
            browser: None,
            recv_mail: None,
            strip_funcs: Vec::new(),
            file_perms: DEFAULT_FILE_PERMS,
            sender_mail: None,
        }
    }
}

impl Settings {
    /// Read settings from `path`. A missing file means defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(Error::Config {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        };
        Self::parse(&content).map_err(|reason| Error::Config {
            path: path.to_path_buf(),
            reason,
        })
    }

    fn parse(content: &str) -> std::result::Result<Self, String> {
        let settings: Settings = toml::from_str(content).map_err(|e| e.to_string())?;
        if settings.timeout == 0 {
            return Err("timeout must be at least one second".to_string());
        }
        if settings.interval == 0 {
            return Err("interval must be at least one second".to_string());
        }
        Ok(settings)
    }

    /// Daemon address; the host is always the local machine.
    pub fn daemon_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, self.port))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Configured browser, ignoring an empty string
    pub fn browser(&self) -> Option<&Path> {
        self.browser
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }
}

/// Paths plus settings, built once at startup and handed to each component.
#[derive(Debug, Clone)]
pub struct Config {
    pub paths: Paths,
    pub settings: Settings,
}

impl Config {
    /// Load settings from the layout's config file.
    pub fn load(paths: Paths) -> Result<Self> {
        let settings = Settings::load(&paths.config)?;
        Ok(Self { paths, settings })
    }
}
