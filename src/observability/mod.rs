//! Structured logging and trace-context propagation (spec.md §4.6
//! `filament/core/log`, ambient observability stack).

pub mod log;

pub use log::{LogLevel, LogRecord, NoopSink, StdoutSink, TelemetrySink};
