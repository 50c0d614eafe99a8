//! On-disk layout under the nyfiken root directory.

use crate::common::error::{Error, Result};
use std::fs::DirBuilder;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the root directory
pub const ROOT_ENV: &str = "NYFIKEN_ROOT";

/// Mode for every directory of the layout
pub const DEFAULT_FOLDER_MODE: u32 = 0o755;

/// Every file and directory nyfikenc/d reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub root: PathBuf,
    pub config: PathBuf,
    pub pages: PathBuf,
    pub updates: PathBuf,
    pub cache: PathBuf,
    pub read: PathBuf,
    pub debug: PathBuf,
    pub debug_cache: PathBuf,
    pub debug_read: PathBuf,
}

/// Platform root: `$NYFIKEN_ROOT`, else `<config dir>/nyfiken`.
pub fn resolve_root() -> PathBuf {
    if let Some(root) = std::env::var_os(ROOT_ENV) {
        return PathBuf::from(root);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("nyfiken")
}

impl Paths {
    /// Layout under the resolved platform root
    pub fn resolve() -> Self {
        Self::from_root(resolve_root())
    }

    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let debug = root.join("debug");
        Self {
            config: root.join("config.toml"),
            pages: root.join("pages.toml"),
            updates: root.join("updates.json"),
            cache: root.join("cache"),
            read: root.join("read"),
            debug_cache: debug.join("cache"),
            debug_read: debug.join("read"),
            debug,
            root,
        }
    }

    /// Directories in creation order, parents first.
    pub fn directories(&self) -> Vec<&Path> {
        let mut dirs = vec![
            self.root.as_path(),
            self.cache.as_path(),
            self.read.as_path(),
            self.debug.as_path(),
            self.debug_cache.as_path(),
            self.debug_read.as_path(),
        ];
        for file in [&self.config, &self.pages, &self.updates] {
            if let Some(parent) = file.parent() {
                if !dirs.contains(&parent) {
                    dirs.push(parent);
                }
            }
        }
        dirs
    }

    /// Create any missing directory of the layout. Existing directories and
    /// their contents are left alone, so this runs on every start.
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in self.directories() {
            create_dir(dir)?;
        }
        Ok(())
    }
}

fn create_dir(path: &Path) -> Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DEFAULT_FOLDER_MODE);
    }

    match builder.create(path) {
        Ok(()) => {
            debug!("ensured directory {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(source) => Err(Error::Bootstrap {
            path: path.to_path_buf(),
            source,
        }),
    }
}
