use std::collections::VecDeque;

use crate::canvas::ImageBuffer;
use crate::error::EditError;

// ============================================================================
// HISTORY ENTRY
// ============================================================================

/// A committed image state plus the name of the edit that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryEntry {
    pub buffer: ImageBuffer,
    pub label: Option<String>,
}

impl HistoryEntry {
    pub fn new(buffer: ImageBuffer, label: impl Into<String>) -> Self {
        Self {
            buffer,
            label: Some(label.into()),
        }
    }

    pub fn unlabelled(buffer: ImageBuffer) -> Self {
        Self { buffer, label: None }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn memory_size(&self) -> usize {
        self.buffer.memory_bytes()
    }
}

// ============================================================================
// HISTORY MANAGER - bounded undo/redo stacks of committed snapshots
// ============================================================================

/// Undo/redo history with a step limit and an optional memory cap.
///
/// The top of the undo stack is always the current committed state, so undo
/// needs at least two entries.  The oldest entries are evicted first.
pub struct HistoryManager {
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: VecDeque<HistoryEntry>,
    capacity: usize,
    /// Optional memory cap in bytes.
    max_memory_bytes: Option<usize>,
    /// Running memory total across both stacks.
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(25)
    }
}

impl HistoryManager {
    /// `capacity` below 1 is raised to 1: there is always a current state.
    pub fn new(capacity: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            capacity: capacity.max(1),
            max_memory_bytes: None,
            total_memory: 0,
        }
    }

    pub fn with_memory_limit(mut self, max_bytes: Option<usize>) -> Self {
        self.set_memory_limit(max_bytes);
        self
    }

    pub fn set_memory_limit(&mut self, max_bytes: Option<usize>) {
        self.max_memory_bytes = max_bytes;
        self.prune();
    }

    /// Record a new committed state.  Redo history is dropped.
    pub fn push(&mut self, entry: HistoryEntry) {
        for dropped in self.redo_stack.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(dropped.memory_size());
        }

        self.total_memory += entry.memory_size();
        self.undo_stack.push_back(entry);

        self.prune();
    }

    /// Step back one state and return the state to restore.
    pub fn undo(&mut self) -> Result<&HistoryEntry, EditError> {
        if !self.can_undo() {
            return Err(EditError::EmptyHistory);
        }
        let top = self.undo_stack.pop_back().ok_or(EditError::EmptyHistory)?;
        self.redo_stack.push_back(top);
        self.undo_stack.back().ok_or(EditError::EmptyHistory)
    }

    /// Re-apply the most recently undone state and return it.
    pub fn redo(&mut self) -> Result<&HistoryEntry, EditError> {
        let entry = self.redo_stack.pop_back().ok_or(EditError::EmptyHistory)?;
        self.undo_stack.push_back(entry);
        self.undo_stack.back().ok_or(EditError::EmptyHistory)
    }

    /// Undo `steps` times (0 = stay put), stopping early at the oldest state.
    pub fn undo_to(&mut self, steps: usize) -> Result<&HistoryEntry, EditError> {
        if steps > 0 && !self.can_undo() {
            return Err(EditError::EmptyHistory);
        }
        for _ in 0..steps {
            if !self.can_undo() {
                break;
            }
            if let Some(top) = self.undo_stack.pop_back() {
                self.redo_stack.push_back(top);
            }
        }
        self.current().ok_or(EditError::EmptyHistory)
    }

    pub fn can_undo(&self) -> bool {
        self.undo_stack.len() > 1
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Drop everything and start over from `initial` (new image loaded).
    pub fn reset(&mut self, initial: HistoryEntry) {
        self.clear();
        self.total_memory = initial.memory_size();
        self.undo_stack.push_back(initial);
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.total_memory = 0;
    }

    /// The current committed state.
    pub fn current(&self) -> Option<&HistoryEntry> {
        self.undo_stack.back()
    }

    pub fn current_label(&self) -> Option<&str> {
        self.current().and_then(|e| e.label())
    }

    pub fn undo_description(&self) -> Option<&str> {
        if self.can_undo() { self.current_label() } else { None }
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().and_then(|e| e.label())
    }

    /// Get all undo labels (most recent first)
    pub fn undo_history(&self) -> Vec<String> {
        self.undo_stack
            .iter()
            .rev()
            .map(|e| e.label().unwrap_or("Unnamed").to_string())
            .collect()
    }

    /// Undo stack, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.undo_stack.iter()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Get the current memory usage of the history (O(1) via cached total)
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    /// Prune old entries to stay within limits
    fn prune(&mut self) {
        while self.undo_stack.len() > self.capacity {
            if let Some(removed) = self.undo_stack.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
            }
        }

        if let Some(max_bytes) = self.max_memory_bytes {
            while self.total_memory > max_bytes && self.undo_stack.len() > 1 {
                if let Some(removed) = self.undo_stack.pop_front() {
                    self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tag: u8) -> HistoryEntry {
        let buf = ImageBuffer::from_raw(1, 1, 1, vec![tag]).unwrap();
        HistoryEntry::new(buf, format!("{}", tag as char))
    }

    fn labels(h: &HistoryManager) -> Vec<String> {
        h.entries().map(|e| e.label().unwrap_or_default().to_string()).collect()
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let mut h = HistoryManager::new(5);
        h.reset(entry(b'0'));
        for tag in b"ABCDEF" {
            h.push(entry(*tag));
        }
        assert_eq!(labels(&h), ["B", "C", "D", "E", "F"]);
        assert!(h.can_undo());
        assert_eq!(h.undo_len(), 5);
    }

    #[test]
    fn push_beyond_capacity_keeps_recent_in_order() {
        let mut h = HistoryManager::new(3);
        for tag in b"abcd" {
            h.push(entry(*tag));
        }
        assert_eq!(labels(&h), ["b", "c", "d"]);
    }

    #[test]
    fn reset_disables_undo_and_redo() {
        let mut h = HistoryManager::new(4);
        h.reset(entry(b'0'));
        h.push(entry(b'A'));
        h.undo().unwrap();
        assert!(h.can_redo());
        h.reset(entry(b'1'));
        assert!(!h.can_undo());
        assert!(!h.can_redo());
        assert_eq!(h.current_label(), Some("1"));
    }

    #[test]
    fn undo_never_pops_the_last_state() {
        let mut h = HistoryManager::new(4);
        assert!(matches!(h.undo(), Err(EditError::EmptyHistory)));
        h.reset(entry(b'0'));
        assert!(matches!(h.undo(), Err(EditError::EmptyHistory)));
        assert_eq!(h.undo_len(), 1);
    }

    #[test]
    fn undo_then_redo_walks_the_stacks() {
        let mut h = HistoryManager::new(4);
        h.reset(entry(b'0'));
        h.push(entry(b'A'));
        h.push(entry(b'B'));

        assert_eq!(h.undo().unwrap().label(), Some("A"));
        assert_eq!(h.undo().unwrap().label(), Some("0"));
        assert!(!h.can_undo());
        assert_eq!(h.redo_description(), Some("A"));

        assert_eq!(h.redo().unwrap().label(), Some("A"));
        assert_eq!(h.redo().unwrap().label(), Some("B"));
        assert!(matches!(h.redo(), Err(EditError::EmptyHistory)));
    }

    #[test]
    fn push_after_undo_clears_redo() {
        let mut h = HistoryManager::new(4);
        h.reset(entry(b'0'));
        h.push(entry(b'A'));
        h.undo().unwrap();
        h.push(entry(b'B'));
        assert!(!h.can_redo());
        assert_eq!(labels(&h), ["0", "B"]);
    }

    #[test]
    fn undo_to_stops_at_the_oldest_state() {
        let mut h = HistoryManager::new(8);
        h.reset(entry(b'0'));
        for tag in b"ABC" {
            h.push(entry(*tag));
        }
        assert_eq!(h.undo_to(2).unwrap().label(), Some("A"));
        assert_eq!(h.undo_to(10).unwrap().label(), Some("0"));
        assert_eq!(h.redo_len(), 3);
        assert!(matches!(h.undo_to(1), Err(EditError::EmptyHistory)));
        assert_eq!(h.undo_to(0).unwrap().label(), Some("0"));
    }

    #[test]
    fn memory_cap_evicts_but_keeps_current() {
        let mut h = HistoryManager::new(10).with_memory_limit(Some(2));
        h.reset(entry(b'0'));
        h.push(entry(b'A'));
        h.push(entry(b'B'));
        assert_eq!(labels(&h), ["A", "B"]);
        assert_eq!(h.memory_usage(), 2);

        h.set_memory_limit(Some(0));
        assert_eq!(labels(&h), ["B"]);
    }

    #[test]
    fn zero_capacity_still_holds_a_current_state() {
        let mut h = HistoryManager::new(0);
        assert_eq!(h.capacity(), 1);
        h.reset(entry(b'0'));
        h.push(entry(b'A'));
        assert_eq!(labels(&h), ["A"]);
        assert!(!h.can_undo());
    }

    #[test]
    fn undo_history_lists_most_recent_first() {
        let mut h = HistoryManager::new(4);
        h.reset(HistoryEntry::unlabelled(entry(b'0').buffer));
        h.push(entry(b'A'));
        assert_eq!(h.undo_history(), ["A", "Unnamed"]);
        assert_eq!(h.undo_description(), Some("A"));
    }
}
