//! Commands sent by the client and the response to the update query.
//!
//! One exchange per connection: the client writes a single newline
//! terminated command. Only `updates?` is answered, with one line holding
//! the JSON encoded update set. The control commands get no reply, so the
//! client cannot tell whether the daemon acted on them.

use crate::common::error::{Error, Result};
use crate::common::updates::UpdateSet;
use std::fmt;
use std::io::{BufRead, Read, Write};
use std::str::FromStr;

pub const QUERY_UPDATES: &str = "updates?";
pub const QUERY_CLEAR_ALL: &str = "clear all!";
pub const QUERY_FORCE_RECHECK: &str = "recheck!";

/// Longest command line the daemon accepts, newline included
pub const MAX_COMMAND_LINE: usize = 64;

/// Longest `updates?` response the client accepts, newline included
pub const MAX_RESPONSE_LINE: usize = 16 * 1024 * 1024;

/// Command vocabulary understood by the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Ask for the pending update set
    Updates,
    /// Drop every pending update
    ClearAll,
    /// Check all pages now instead of waiting for the interval
    ForceRecheck,
}

impl Command {
    pub fn literal(self) -> &'static str {
        match self {
            Command::Updates => QUERY_UPDATES,
            Command::ClearAll => QUERY_CLEAR_ALL,
            Command::ForceRecheck => QUERY_FORCE_RECHECK,
        }
    }

    /// Whether the daemon answers this command
    pub fn expects_response(self) -> bool {
        matches!(self, Command::Updates)
    }

    /// Parse a received line, tolerating its line terminator.
    pub fn from_line(line: &str) -> Option<Self> {
        line.trim_end_matches(['\r', '\n']).parse().ok()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.literal())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCommand(pub String);

impl fmt::Display for UnknownCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown command {:?}", self.0)
    }
}

impl std::error::Error for UnknownCommand {}

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            QUERY_UPDATES => Ok(Command::Updates),
            QUERY_CLEAR_ALL => Ok(Command::ClearAll),
            QUERY_FORCE_RECHECK => Ok(Command::ForceRecheck),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}

/// Write one command line
pub fn write_command<W: Write>(writer: &mut W, command: Command) -> std::io::Result<()> {
    writer.write_all(command.literal().as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Encode the response to `updates?`, newline included.
pub fn encode_updates(updates: &UpdateSet) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(updates)
        .map_err(|e| Error::Protocol(format!("cannot encode updates: {}", e)))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Decode one response line.
pub fn decode_updates(line: &[u8]) -> Result<UpdateSet> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::Protocol("empty response".to_string()));
    }
    serde_json::from_slice(line).map_err(|e| Error::Protocol(e.to_string()))
}

/// Whether a line read through a `limit` byte cap stopped before its newline.
pub fn is_overlong(line: &[u8], limit: usize) -> bool {
    line.len() >= limit && line.last() != Some(&b'\n')
}

/// Read and decode the response line. I/O failures are returned as-is so
/// the caller can report them as transport errors.
pub fn read_updates<R: BufRead>(reader: &mut R) -> std::io::Result<Result<UpdateSet>> {
    read_updates_limited(reader, MAX_RESPONSE_LINE)
}

/// `read_updates` with an explicit line limit
pub fn read_updates_limited<R: BufRead>(
    reader: &mut R,
    limit: usize,
) -> std::io::Result<Result<UpdateSet>> {
    let mut line = Vec::new();
    reader.take(limit as u64).read_until(b'\n', &mut line)?;
    if is_overlong(&line, limit) {
        return Ok(Err(Error::Protocol(format!(
            "response longer than {} bytes",
            limit
        ))));
    }
    Ok(decode_updates(&line))
}
