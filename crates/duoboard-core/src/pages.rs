//! Per-page drawings for paginated document backdrops.

use crate::store::EntityStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// First page number of a document.
pub const FIRST_PAGE: u32 = 1;

/// The drawing that belongs to one document page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDrawing {
    pub page: u32,
    #[serde(flatten)]
    pub drawing: EntityStore,
}

/// Drawings of every page except the one currently loaded in the live store.
///
/// Only enabled while a document backdrop is active. When disabled there is a
/// single implicit page and the book stays empty.
#[derive(Debug, Clone, Default)]
pub struct PageBook {
    enabled: bool,
    current: u32,
    stashed: BTreeMap<u32, EntityStore>,
}

impl PageBook {
    pub fn new() -> Self {
        Self {
            enabled: false,
            current: FIRST_PAGE,
            stashed: BTreeMap::new(),
        }
    }

    /// Drop all stashed pages and return to the first page.
    pub fn reset(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.current = FIRST_PAGE;
        self.stashed.clear();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    /// Page number to stamp on outgoing messages.
    pub fn current_tag(&self) -> Option<u32> {
        self.enabled.then_some(self.current)
    }

    /// Move the live store to the stash and load `target` into it.
    /// Returns false if paging is disabled or `target` is already current.
    pub fn switch(&mut self, store: &mut EntityStore, target: u32) -> bool {
        if !self.enabled || target == self.current {
            return false;
        }
        let leaving = std::mem::take(store);
        if !leaving.is_empty() {
            self.stashed.insert(self.current, leaving);
        }
        *store = self.stashed.remove(&target).unwrap_or_default();
        self.current = target;
        true
    }

    /// Stashed drawing for a page other than the current one.
    pub fn stashed_mut(&mut self, page: u32) -> &mut EntityStore {
        self.stashed.entry(page).or_default()
    }

    /// Every non-empty page, the live one included, ordered by page number.
    pub fn collect(&self, store: &EntityStore) -> Vec<PageDrawing> {
        if !self.enabled {
            return Vec::new();
        }
        let mut pages: BTreeMap<u32, &EntityStore> = self
            .stashed
            .iter()
            .filter(|(_, d)| !d.is_empty())
            .map(|(p, d)| (*p, d))
            .collect();
        if !store.is_empty() {
            pages.insert(self.current, store);
        }
        pages
            .into_iter()
            .map(|(page, drawing)| PageDrawing {
                page,
                drawing: drawing.clone(),
            })
            .collect()
    }

    /// Load a full page set: the current page goes into `store`, the rest
    /// into the stash.
    pub fn restore(&mut self, store: &mut EntityStore, pages: &[PageDrawing]) {
        self.stashed.clear();
        store.clear();
        for page in pages {
            if page.page == self.current {
                *store = page.drawing.clone();
            } else {
                self.stashed.insert(page.page, page.drawing.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Stroke;
    use kurbo::Point;

    fn store_with(id: &str) -> EntityStore {
        let mut store = EntityStore::new();
        store.add_stroke(Stroke::begin(id.into(), Point::new(0.0, 0.0), "#000", 1.0));
        store
    }

    #[test]
    fn test_disabled_book_ignores_switch() {
        let mut book = PageBook::new();
        let mut store = store_with("a");
        assert!(!book.switch(&mut store, 2));
        assert_eq!(store.len(), 1);
        assert!(book.collect(&store).is_empty());
        assert_eq!(book.current_tag(), None);
    }

    #[test]
    fn test_switch_stashes_and_loads() {
        let mut book = PageBook::new();
        book.reset(true);
        let mut store = store_with("a");

        assert!(book.switch(&mut store, 2));
        assert!(store.is_empty());
        assert_eq!(book.current_tag(), Some(2));

        store.add_stroke(Stroke::begin("b".into(), Point::new(1.0, 1.0), "#000", 1.0));
        assert!(book.switch(&mut store, 1));
        assert!(store.contains("a"));

        let pages = book.collect(&store);
        assert_eq!(pages.iter().map(|p| p.page).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_restore_splits_current_page() {
        let mut book = PageBook::new();
        book.reset(true);
        let pages = vec![
            PageDrawing { page: 1, drawing: store_with("a") },
            PageDrawing { page: 3, drawing: store_with("c") },
        ];
        let mut store = EntityStore::new();
        book.restore(&mut store, &pages);
        assert!(store.contains("a"));
        assert!(book.stashed_mut(3).contains("c"));
        assert_eq!(book.collect(&store), pages);
    }
}
