//! `filament/core/log` sink (spec.md §4.6): the host forwards whatever a
//! module publishes on the reserved log topic to a pluggable
//! [`TelemetrySink`], stamped with the committing process's trace
//! context.

use crate::timeline::TraceContext;
use crate::types::ProcessId;
use core::fmt;

/// Severity level for a log record, ordered least to most severe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Fine-grained tracing, off by default.
    Trace,
    /// Development-time diagnostics.
    Debug,
    /// General informational messages.
    #[default]
    Info,
    /// A recoverable anomaly.
    Warn,
    /// A module or kernel error.
    Error,
}

impl LogLevel {
    /// The level's name, as printed.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record en route to a [`TelemetrySink`].
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// The process that committed this record.
    pub process: ProcessId,
    /// Severity.
    pub level: LogLevel,
    /// The message body, decoded from the event's `Value` payload.
    pub message: String,
    /// Trace context carried on the committing event.
    pub trace: TraceContext,
}

/// Where `filament/core/log` events go. Implementations must not block
/// the Weave cycle that calls them (spec.md §4.6: log forwarding is
/// best-effort and must not affect determinism).
pub trait TelemetrySink: Send + Sync {
    /// Emits one record.
    fn emit(&self, record: &LogRecord);
}

/// Discards every record. The default when no sink is configured.
#[derive(Debug, Default)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn emit(&self, _record: &LogRecord) {}
}

/// Forwards records to `tracing` when the `tracing-integration` feature
/// is enabled, and to stdout otherwise.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl TelemetrySink for StdoutSink {
    #[cfg(feature = "tracing-integration")]
    fn emit(&self, record: &LogRecord) {
        match record.level {
            LogLevel::Trace => tracing::trace!(process = %record.process, trace_id = %record.trace.trace_id, "{}", record.message),
            LogLevel::Debug => tracing::debug!(process = %record.process, trace_id = %record.trace.trace_id, "{}", record.message),
            LogLevel::Info => tracing::info!(process = %record.process, trace_id = %record.trace.trace_id, "{}", record.message),
            LogLevel::Warn => tracing::warn!(process = %record.process, trace_id = %record.trace.trace_id, "{}", record.message),
            LogLevel::Error => tracing::error!(process = %record.process, trace_id = %record.trace.trace_id, "{}", record.message),
        }
    }

    #[cfg(not(feature = "tracing-integration"))]
    fn emit(&self, record: &LogRecord) {
        println!("[{}] {} {}", record.level, record.process, record.message);
    }
}
