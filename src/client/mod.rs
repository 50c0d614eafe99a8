//! Client side: one connection, one command, one action.

pub mod browser;
pub mod session;
