//! Snapshot-based undo/redo history.

use crate::entity::{Shape, Stroke};
use crate::pages::{PageBook, PageDrawing};
use crate::store::EntityStore;
use serde::{Deserialize, Serialize};

/// A complete, independently owned copy of the drawing.
///
/// `strokes`/`shapes` are the live store at capture time. While a document
/// backdrop is active `pages` also holds every page's drawing, and it is the
/// authoritative part of the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub strokes: Vec<Stroke>,
    #[serde(default)]
    pub shapes: Vec<Shape>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<PageDrawing>,
}

impl Snapshot {
    /// Deep-copy the live store (and page book, when paging).
    pub fn capture(store: &EntityStore, book: &PageBook) -> Self {
        Self {
            strokes: store.strokes.clone(),
            shapes: store.shapes.clone(),
            pages: book.collect(store),
        }
    }

    /// Snapshot of a store without pages.
    pub fn of_store(store: &EntityStore) -> Self {
        Self {
            strokes: store.strokes.clone(),
            shapes: store.shapes.clone(),
            pages: Vec::new(),
        }
    }

    /// Content equality.
    ///
    /// Paged snapshots compare their page sets only, so that viewing another
    /// page does not count as a change.
    pub fn same_content(&self, other: &Snapshot) -> bool {
        if self.pages.is_empty() && other.pages.is_empty() {
            self.strokes == other.strokes && self.shapes == other.shapes
        } else {
            self.pages == other.pages
        }
    }

    /// Write this snapshot into the live store and page book.
    pub fn restore_into(&self, store: &mut EntityStore, book: &mut PageBook) {
        if book.is_enabled() {
            if self.pages.is_empty() && !(self.strokes.is_empty() && self.shapes.is_empty()) {
                // Sent by a peer that was not paging yet; treat it as the current page.
                book.restore(store, &[]);
                store.replace_all(self.strokes.clone(), self.shapes.clone());
            } else {
                book.restore(store, &self.pages);
            }
        } else {
            store.replace_all(self.strokes.clone(), self.shapes.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty() && self.shapes.is_empty() && self.pages.is_empty()
    }
}

/// Outcome of an undo or redo request.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryMove {
    /// The cursor moved; `snapshot` is the state at the new step.
    Moved { step: usize, snapshot: Snapshot },
    /// Nothing older to go back to.
    AtOldest,
    /// Nothing newer to go forward to.
    AtNewest,
}

/// Ordered list of snapshots with a cursor.
///
/// Never empty; `step` always indexes a valid entry.
/// Most snapshots kept. Committing past this drops the oldest ones.
pub const MAX_HISTORY: usize = 50;

#[derive(Debug, Clone)]
pub struct HistoryManager {
    entries: Vec<Snapshot>,
    step: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryManager {
    /// Start with a single empty snapshot.
    pub fn new() -> Self {
        Self {
            entries: vec![Snapshot::default()],
            step: 0,
        }
    }

    /// Back to a single empty snapshot at step 0.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.entries.push(Snapshot::default());
        self.step = 0;
    }

    /// Drop everything after the cursor, append `snapshot` and move to it.
    pub fn commit(&mut self, snapshot: Snapshot) -> usize {
        self.entries.truncate(self.step + 1);
        self.entries.push(snapshot);
        self.trim();
        self.step = self.entries.len() - 1;
        self.step
    }

    /// Drop the oldest snapshots beyond [`MAX_HISTORY`], keeping the cursor on
    /// the same snapshot where it survives.
    fn trim(&mut self) {
        let overflow = self.entries.len().saturating_sub(MAX_HISTORY);
        if overflow > 0 {
            self.entries.drain(..overflow);
            self.step = self.step.saturating_sub(overflow);
        }
    }

    /// Commit only if `snapshot` differs in content from the current step.
    pub fn commit_if_changed(&mut self, snapshot: Snapshot) -> Option<usize> {
        if self.current().same_content(&snapshot) {
            return None;
        }
        Some(self.commit(snapshot))
    }

    /// Step back one snapshot.
    pub fn undo(&mut self) -> HistoryMove {
        if self.step == 0 {
            return HistoryMove::AtOldest;
        }
        self.step -= 1;
        HistoryMove::Moved {
            step: self.step,
            snapshot: self.entries[self.step].clone(),
        }
    }

    /// Step forward one snapshot.
    pub fn redo(&mut self) -> HistoryMove {
        if self.step + 1 >= self.entries.len() {
            return HistoryMove::AtNewest;
        }
        self.step += 1;
        HistoryMove::Moved {
            step: self.step,
            snapshot: self.entries[self.step].clone(),
        }
    }

    /// Take over a peer's snapshot at `step` without replaying anything.
    ///
    /// Entries after `step` are kept so a later redo from either side still
    /// lines up. If `step` lies beyond this history the snapshot becomes the
    /// new tail.
    pub fn adopt(&mut self, step: usize, snapshot: Snapshot) -> usize {
        if step < self.entries.len() {
            self.entries[step] = snapshot;
            self.step = step;
        } else {
            log::debug!(
                "adopting step {} beyond local history of {} entries",
                step,
                self.entries.len()
            );
            self.entries.push(snapshot);
            self.trim();
            self.step = self.entries.len() - 1;
        }
        self.step
    }

    /// Replace the whole history. An empty list resets; an out-of-range step
    /// is clamped to the tail.
    pub fn replace(&mut self, entries: Vec<Snapshot>, step: usize) {
        if entries.is_empty() {
            self.reset();
            return;
        }
        if step >= entries.len() {
            log::warn!("history step {} out of range for {} entries", step, entries.len());
        }
        self.step = step.min(entries.len() - 1);
        self.entries = entries;
        self.trim();
    }

    pub fn current(&self) -> &Snapshot {
        &self.entries[self.step]
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn entries(&self) -> &[Snapshot] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn can_undo(&self) -> bool {
        self.step > 0
    }

    pub fn can_redo(&self) -> bool {
        self.step + 1 < self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    fn snapshot_with(ids: &[&str]) -> Snapshot {
        let mut store = EntityStore::new();
        for id in ids {
            store.add_stroke(Stroke::begin((*id).into(), Point::new(0.0, 0.0), "#000", 1.0));
        }
        Snapshot::of_store(&store)
    }

    #[test]
    fn test_new_history() {
        let history = HistoryManager::new();
        assert_eq!(history.len(), 1);
        assert_eq!(history.step(), 0);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_commit_drops_oldest_past_cap() {
        let mut history = HistoryManager::new();
        let mut last = 0;
        for i in 0..60 {
            let ids: Vec<String> = (0..=i).map(|n| format!("s{}", n)).collect();
            let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
            last = history.commit(snapshot_with(&refs));
        }
        assert_eq!(history.len(), MAX_HISTORY);
        assert_eq!(last, MAX_HISTORY - 1);
        assert_eq!(history.step(), MAX_HISTORY - 1);
        assert_eq!(history.current().strokes.len(), 60);
        // Oldest survivor is the commit that held eleven strokes.
        assert_eq!(history.entries()[0].strokes.len(), 11);
        assert!(!history.can_redo());

        while history.can_undo() {
            history.undo();
        }
        assert_eq!(history.step(), 0);
        assert_eq!(history.current().strokes.len(), 11);
    }

    #[test]
    fn test_replace_keeps_newest() {
        let mut history = HistoryManager::new();
        let entries: Vec<Snapshot> = (0..MAX_HISTORY + 5).map(|_| Snapshot::default()).collect();
        history.replace(entries, MAX_HISTORY + 4);
        assert_eq!(history.len(), MAX_HISTORY);
        assert_eq!(history.step(), MAX_HISTORY - 1);
    }

    #[test]
    fn test_commit_advances() {
        let mut history = HistoryManager::new();
        assert_eq!(history.commit(snapshot_with(&["a"])), 1);
        assert_eq!(history.commit(snapshot_with(&["a", "b"])), 2);
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_commit_if_changed_skips_equal() {
        let mut history = HistoryManager::new();
        assert_eq!(history.commit_if_changed(Snapshot::default()), None);
        assert_eq!(history.commit_if_changed(snapshot_with(&["a"])), Some(1));
        assert_eq!(history.commit_if_changed(snapshot_with(&["a"])), None);
    }

    #[test]
    fn test_undo_redo_boundaries() {
        let mut history = HistoryManager::new();
        assert_eq!(history.undo(), HistoryMove::AtOldest);
        assert_eq!(history.redo(), HistoryMove::AtNewest);

        history.commit(snapshot_with(&["a"]));
        match history.undo() {
            HistoryMove::Moved { step, snapshot } => {
                assert_eq!(step, 0);
                assert!(snapshot.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(history.undo(), HistoryMove::AtOldest);
    }

    #[test]
    fn test_redo_after_undo_is_identity() {
        let mut history = HistoryManager::new();
        history.commit(snapshot_with(&["a"]));
        history.commit(snapshot_with(&["a", "b"]));
        let before = history.current().clone();

        history.undo();
        match history.redo() {
            HistoryMove::Moved { step, snapshot } => {
                assert_eq!(step, 2);
                assert_eq!(snapshot, before);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_commit_truncates_redo() {
        let mut history = HistoryManager::new();
        history.commit(snapshot_with(&["a"]));
        history.commit(snapshot_with(&["a", "b"]));
        history.undo();
        history.commit(snapshot_with(&["a", "c"]));
        assert_eq!(history.len(), 3);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_adopt_within_and_beyond() {
        let mut history = HistoryManager::new();
        history.commit(snapshot_with(&["a"]));

        assert_eq!(history.adopt(0, Snapshot::default()), 0);
        assert!(history.can_redo());

        assert_eq!(history.adopt(7, snapshot_with(&["z"])), 2);
        assert_eq!(history.current(), &snapshot_with(&["z"]));
    }

    #[test]
    fn test_replace_clamps_and_resets() {
        let mut history = HistoryManager::new();
        history.replace(vec![Snapshot::default(), snapshot_with(&["a"])], 9);
        assert_eq!(history.step(), 1);

        history.replace(Vec::new(), 0);
        assert_eq!(history.len(), 1);
        assert_eq!(history.step(), 0);
    }

    #[test]
    fn test_snapshot_is_independent_copy() {
        let mut store = EntityStore::new();
        store.add_stroke(Stroke::begin("a".into(), Point::new(0.0, 0.0), "#000", 1.0));
        let snapshot = Snapshot::of_store(&store);
        store.append_point("a", 9.0, 9.0);
        assert_eq!(snapshot.strokes[0].points, vec![0.0, 0.0]);
    }
}
