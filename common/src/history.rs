use crate::types::HistoryEntry;

/// 60 slots: five minutes of data at the default 5 s sampling cadence.
pub const HISTORY_CAPACITY: usize = 60;

/// Fixed-capacity ring of chart samples. A slot whose timestamp is 0 has never been
/// written and is left out of every export.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    slots: [HistoryEntry; HISTORY_CAPACITY],
    next: usize,
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self {
            slots: [HistoryEntry::default(); HISTORY_CAPACITY],
            next: 0,
        }
    }

    /// Writes into the oldest slot.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.slots[self.next] = entry;
        self.next = (self.next + 1) % HISTORY_CAPACITY;
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_used()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Valid entries, oldest first.
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        (0..HISTORY_CAPACITY)
            .map(|offset| self.slots[(self.next + offset) % HISTORY_CAPACITY])
            .filter(HistoryEntry::is_used)
            .collect()
    }
}
