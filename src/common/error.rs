//! Error kinds surfaced by the client, the daemon and the state file.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Could not connect to the daemon, or the connection broke mid-exchange.
    #[error("cannot talk to nyfikend at {addr}: {source}")]
    Transport {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The daemon answered with bytes that are not an encoded update set.
    #[error("malformed response from daemon: {0}")]
    Protocol(String),

    /// The update state file could not be read, decoded or written.
    #[error("update state {}: {reason}", path.display())]
    Persistence { path: PathBuf, reason: String },

    /// A directory of the on-disk layout could not be created.
    #[error("cannot create {}: {source}", path.display())]
    Bootstrap {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A client session was asked to run a second command.
    #[error("session already sent its command")]
    SessionUsed,

    #[error("config {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("browser {} failed on {url}: {reason}", browser.display())]
    Browser {
        browser: PathBuf,
        url: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn transport(addr: impl ToString, source: std::io::Error) -> Self {
        Error::Transport {
            addr: addr.to_string(),
            source,
        }
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
