use std::collections::VecDeque;

use crate::frame::FrameTick;

/// One traced occurrence inside the render loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub frame_index: u64,
    pub kind: &'static str,
    pub message: String,
}

/// Bounded trace of what the render loop did, tagged with frame indices.
///
/// Every entry is mirrored to `tracing` at debug level. When full, the oldest
/// entry is discarded so a long-running loop keeps constant memory.
#[derive(Debug)]
pub struct Journal {
    entries: VecDeque<JournalEntry>,
    max_entries: usize,
}

impl Default for Journal {
    fn default() -> Self {
        Self::with_max_entries(Self::DEFAULT_MAX_ENTRIES)
    }
}

impl Journal {
    pub const DEFAULT_MAX_ENTRIES: usize = 1024;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn record(&mut self, tick: FrameTick, kind: &'static str, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(frame = tick.index, kind, "{message}");
        if self.entries.len() == self.max_entries {
            self.entries.pop_front();
        }
        self.entries.push_back(JournalEntry {
            frame_index: tick.index,
            kind,
            message,
        });
    }

    pub fn entries(&self) -> impl Iterator<Item = &JournalEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a JournalEntry> + 'a {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    pub fn drain(&mut self) -> Vec<JournalEntry> {
        self.entries.drain(..).collect()
    }
}
