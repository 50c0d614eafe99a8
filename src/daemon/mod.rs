//! Long-running daemon owning the pending-update set.

pub mod scheduler;
pub mod server;
pub mod state;
