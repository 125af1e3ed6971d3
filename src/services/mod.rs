//! Services module for the Asterisk monitor

pub mod executor;
pub mod collector;
pub mod classifier;
pub mod event_log;
pub mod debug;
pub mod diagnostics;
pub mod security;
pub mod backup;
pub mod logs;
pub mod alerts;

pub use executor::{CommandExecutor, CommandResult, CommandStatus, ShellExecutor};
pub use collector::{SnapshotCollector, SnapshotSource, SystemSnapshot};
pub use classifier::{FilterPreset, LogLevel, Severity};
pub use event_log::{BoundedEventBuffer, EventSink, ProblemLog};
pub use debug::{DebugEvent, DebugMode, DebugSession, SessionState};
pub use diagnostics::{CheckSummary, DiagnosticKind, DiagnosticPlan, DiagnosticsRunner};
pub use security::{ScanKind, SecurityScanner, SecurityScore};
pub use backup::{BackupManager, OperationReport};
pub use logs::{LogQuery, LogViewer};
pub use alerts::AlertBuffer;
