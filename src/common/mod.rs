//! Types and utilities shared between client and daemon.

pub mod error;
pub mod logging;
pub mod paths;
pub mod persistence;
pub mod settings;
pub mod updates;
