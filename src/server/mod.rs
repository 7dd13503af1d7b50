//! Listener hosting for the node.
//!
//! Resolves the bind address, runs one listener per handler and stops them
//! all when the process is told to terminate.

mod address;
mod service;
mod signal;

pub use address::*;
pub use service::*;
pub use signal::wait_for_termination;
