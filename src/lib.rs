//! Asterisk Monitor - terminal dashboard for Asterisk PBX hosts
//!
//! Polls the local PBX and operating system through shell commands and presents
//! process health, calls, peers, logs, diagnostics, security posture, backups and
//! a live debug capture in a single keyboard-driven terminal UI.

pub mod config;
pub mod core;
pub mod error;
pub mod protocols;
pub mod services;
pub mod testing;
pub mod ui;
pub mod utils;

pub use error::{Error, Result};

/// Monitor version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
