//! Text protocols spoken by the monitored PBX

pub mod asterisk_cli;

pub use asterisk_cli::{ChannelRecord, PeerCounts, ServiceState};
