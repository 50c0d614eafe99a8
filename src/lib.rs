//! Client/daemon pair that tracks which watched pages changed since the
//! last time the user looked.

pub mod client;
pub mod common;
pub mod daemon;
pub mod ipc;

pub use common::error::{Error, Result};
