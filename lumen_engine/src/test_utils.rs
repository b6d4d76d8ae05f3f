/// Shared helpers for unit tests

use std::sync::{Arc, Mutex};

use crate::log::{LogEntry, LogSeverity, Logger};

/// Logger recording every entry it receives
#[derive(Clone, Default)]
pub struct CapturingLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl CapturingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Entries logged under `source` (other tests may log concurrently)
    pub fn entries_from(&self, source: &str) -> Vec<LogEntry> {
        self.entries.lock().unwrap().iter().filter(|e| e.source == source).cloned().collect()
    }

    pub fn count_at(&self, source: &str, severity: LogSeverity) -> usize {
        self.entries_from(source).iter().filter(|e| e.severity == severity).count()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries.lock().unwrap().iter().any(|e| e.message.contains(needle))
    }
}

impl Logger for CapturingLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

/// Minimal SPIR-V header (magic, version 1.0, generator, bound, schema)
pub fn spirv_header() -> Vec<u8> {
    [crate::resource::SPIRV_MAGIC, 0x0001_0000, 0, 1, 0]
        .iter()
        .flat_map(|w| w.to_le_bytes())
        .collect()
}
