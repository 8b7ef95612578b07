//! Session logic for the DSerial bus
//!
//! Board-agnostic master and client state machines on top of the
//! `dserial-protocol` wire format:
//!
//! - Master session: round-robin polling, queued writes, timeout and retry
//! - Client session: answers READ/WRITE/PING addressed to it
//! - Discovery: blocking startup probe that builds the master's roster
//! - Session configuration and link statistics
//!
//! Nothing runs in the background. Both roles make progress only inside
//! `pump()`, which the application calls from its main loop.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod config;
pub mod error;
pub mod link;
pub mod roster;
pub mod session;
pub mod stats;

#[cfg(any(test, feature = "std"))]
pub mod sim;

pub use config::{ConfigError, SessionConfig, MAX_CLIENTS};
pub use error::SessionError;
pub use link::{Link, Received};
pub use roster::Roster;
pub use session::{ClientSession, ClientState, MasterSession, MasterState};
pub use stats::LinkStats;
