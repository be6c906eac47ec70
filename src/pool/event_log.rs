use std::collections::VecDeque;

use crate::models::log_entry::LogEntry;

pub const LOG_CAPACITY: usize = 5;

/// Rolling log, newest entry first.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: VecDeque<LogEntry>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(LOG_CAPACITY + 1),
        }
    }

    pub fn append(&mut self, message: impl Into<String>) {
        self.push(LogEntry::now(message.into()));
    }

    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(LOG_CAPACITY);
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
