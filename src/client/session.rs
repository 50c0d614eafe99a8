//! Client session: connect to nyfikend, send one command, act on the result.

use crate::client::browser::Launcher;
use crate::common::error::{Error, Result};
use crate::common::settings::Config;
use crate::common::updates::UpdateSet;
use crate::ipc::protocol::{read_updates, write_command, Command};
use std::fmt;
use std::io::BufReader;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// What the user asked nyfikenc to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Print every pending update
    List,
    ForceRecheck,
    ClearAll,
    /// Open every pending update in the configured browser
    OpenInBrowser,
}

impl Action {
    /// Pick one action from the command-line flags: force, then clear,
    /// then open, else list.
    pub fn from_flags(force: bool, clear: bool, open: bool) -> Self {
        if force {
            Action::ForceRecheck
        } else if clear {
            Action::ClearAll
        } else if open {
            Action::OpenInBrowser
        } else {
            Action::List
        }
    }

    pub fn command(self) -> Command {
        match self {
            Action::List | Action::OpenInBrowser => Command::Updates,
            Action::ForceRecheck => Command::ForceRecheck,
            Action::ClearAll => Command::ClearAll,
        }
    }
}

/// Result of a completed session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Pending update URLs, sorted
    Updates(Vec<String>),
    /// The daemon has nothing pending
    NoUpdates,
    /// Every update was opened
    Opened { browser: PathBuf, count: usize },
    /// Open was requested but no browser is configured
    NoBrowser { config: PathBuf },
    RecheckRequested,
    Cleared,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Updates(urls) => {
                for (i, url) in urls.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}", url)?;
                }
                Ok(())
            }
            Outcome::NoUpdates => write!(f, "Sorry, no updates :("),
            Outcome::Opened { browser, .. } => {
                write!(f, "Opening all updates with: {}", browser.display())
            }
            Outcome::NoBrowser { config } => {
                write!(f, "No browser path set in: {}", config.display())
            }
            Outcome::RecheckRequested => write!(f, "All pages will now be checked!"),
            Outcome::Cleared => write!(f, "Updates list has been cleared!"),
        }
    }
}

/// Where a session is in its single exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Start,
    Connected,
    Queried,
    CommandSent,
    Done,
    Failed,
}

/// Blocking TCP client for nyfikend.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    addr: SocketAddr,
    timeout: Duration,
}

impl DaemonClient {
    pub fn new(addr: SocketAddr, timeout: Duration) -> Self {
        Self { addr, timeout }
    }

    /// Open a connection with connect, read and write timeouts applied
    pub fn connect(&self) -> Result<TcpStream> {
        let stream = TcpStream::connect_timeout(&self.addr, self.timeout)
            .map_err(|e| Error::transport(self.addr, e))?;
        stream
            .set_read_timeout(Some(self.timeout))
            .and_then(|_| stream.set_write_timeout(Some(self.timeout)))
            .map_err(|e| Error::transport(self.addr, e))?;
        debug!("connected to {}", self.addr);
        Ok(stream)
    }

    /// Write a command on an open connection
    pub fn send(&self, stream: &mut TcpStream, command: Command) -> Result<()> {
        write_command(stream, command).map_err(|e| Error::transport(self.addr, e))?;
        debug!("sent {:?}", command.literal());
        Ok(())
    }

    /// Read the whole `updates?` response before returning anything.
    pub fn receive_updates(&self, stream: &TcpStream) -> Result<UpdateSet> {
        let mut reader = BufReader::new(stream);
        read_updates(&mut reader).map_err(|e| Error::transport(self.addr, e))?
    }
}

/// One nyfikenc invocation.
pub struct Session<L: Launcher> {
    client: DaemonClient,
    browser: Option<PathBuf>,
    config_path: PathBuf,
    launcher: L,
    state: SessionState,
}

impl<L: Launcher> Session<L> {
    /// Session against the daemon and browser named in `config`
    pub fn new(config: &Config, launcher: L) -> Self {
        let settings = &config.settings;
        Self {
            client: DaemonClient::new(settings.daemon_addr(), settings.timeout()),
            browser: settings.browser().map(PathBuf::from),
            config_path: config.paths.config.clone(),
            launcher,
            state: SessionState::Start,
        }
    }

    /// Session against an explicit daemon client
    pub fn with_client(
        client: DaemonClient,
        browser: Option<PathBuf>,
        config_path: PathBuf,
        launcher: L,
    ) -> Self {
        Self {
            client,
            browser,
            config_path,
            launcher,
            state: SessionState::Start,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Run the action to completion. Any error leaves the session `Failed`.
    pub fn run(&mut self, action: Action) -> Result<Outcome> {
        if self.state != SessionState::Start {
            return Err(Error::SessionUsed);
        }
        match self.exchange(action) {
            Ok(outcome) => {
                self.state = SessionState::Done;
                Ok(outcome)
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    fn exchange(&mut self, action: Action) -> Result<Outcome> {
        let command = action.command();
        let mut stream = self.client.connect()?;
        self.state = SessionState::Connected;

        self.client.send(&mut stream, command)?;
        if !command.expects_response() {
            let _ = stream.shutdown(Shutdown::Both);
            self.state = SessionState::CommandSent;
            return Ok(match command {
                Command::ClearAll => Outcome::Cleared,
                _ => Outcome::RecheckRequested,
            });
        }

        let updates = self.client.receive_updates(&stream)?;
        let _ = stream.shutdown(Shutdown::Both);
        self.state = SessionState::Queried;
        debug!("daemon reported {} pending updates", updates.len());

        if updates.is_empty() {
            return Ok(Outcome::NoUpdates);
        }
        match action {
            Action::OpenInBrowser => self.open_all(&updates),
            _ => Ok(Outcome::Updates(updates.urls())),
        }
    }

    /// Open updates one at a time, waiting for each browser to exit.
    fn open_all(&mut self, updates: &UpdateSet) -> Result<Outcome> {
        let Some(browser) = self.browser.clone() else {
            return Ok(Outcome::NoBrowser {
                config: self.config_path.clone(),
            });
        };
        for record in updates.sorted() {
            self.launcher.launch(&browser, &record.req_url)?;
        }
        info!("opened {} updates", updates.len());
        Ok(Outcome::Opened {
            browser,
            count: updates.len(),
        })
    }
}
