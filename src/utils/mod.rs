//! Shared utilities

pub mod logger;

pub use logger::{setup_logging, LogTarget};
