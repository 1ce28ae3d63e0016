//! # Diagnostics
//!
//! Lifecycle operations report warnings and errors through a sink injected at
//! construction rather than through a logger argument on every call.

use parking_lot::Mutex;
use tracing::Level;

/// Destination of diagnostic events.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, level: Level, message: &str);
}

/// Default sink: forwards to `tracing` with the configured logger name.
#[derive(Debug, Clone)]
pub struct TracingSink {
    logger: String,
}

impl TracingSink {
    pub fn new(logger: impl Into<String>) -> Self {
        Self {
            logger: logger.into(),
        }
    }
}

impl DiagnosticSink for TracingSink {
    fn emit(&self, level: Level, message: &str) {
        let logger = self.logger.as_str();
        match level {
            Level::ERROR => tracing::error!(logger, "[part-storage] {}", message),
            Level::WARN => tracing::warn!(logger, "[part-storage] {}", message),
            Level::INFO => tracing::info!(logger, "[part-storage] {}", message),
            Level::DEBUG => tracing::debug!(logger, "[part-storage] {}", message),
            _ => tracing::trace!(logger, "[part-storage] {}", message),
        }
    }
}

/// One captured event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticEvent {
    pub level: Level,
    pub message: String,
}

/// Sink that keeps every event in memory for assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().clone()
    }

    /// Events at exactly `level`.
    pub fn at_level(&self, level: Level) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.level == level)
            .cloned()
            .collect()
    }

    /// Whether any event at `level` contains `needle`.
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.events
            .lock()
            .iter()
            .any(|e| e.level == level && e.message.contains(needle))
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl DiagnosticSink for RecordingSink {
    fn emit(&self, level: Level, message: &str) {
        self.events.lock().push(DiagnosticEvent {
            level,
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::new();
        sink.emit(Level::WARN, "Directory store/x already exists");
        sink.emit(Level::ERROR, "Cannot remove");

        assert_eq!(sink.events().len(), 2);
        assert!(sink.contains(Level::WARN, "already exists"));
        assert!(!sink.contains(Level::ERROR, "already exists"));
        assert_eq!(sink.at_level(Level::ERROR).len(), 1);

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_tracing_sink_does_not_panic_without_subscriber() {
        let sink = TracingSink::new("DataPartStorage");
        sink.emit(Level::INFO, "no subscriber installed");
    }
}
