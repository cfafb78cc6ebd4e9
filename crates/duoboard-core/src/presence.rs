//! Remote cursor presence.

use kurbo::Point;
use std::collections::HashMap;

/// Last known pointer of a remote participant. Never part of history.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCursor {
    pub peer_id: String,
    pub position: Point,
    pub color: String,
    pub display_name: String,
}

/// Upsert-on-receive map of remote cursors keyed by peer id.
///
/// Entries are not expired here; whoever notices a disconnect removes them.
#[derive(Debug, Clone, Default)]
pub struct PresenceTracker {
    cursors: HashMap<String, RemoteCursor>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the cursor for `cursor.peer_id`.
    pub fn upsert(&mut self, cursor: RemoteCursor) {
        self.cursors.insert(cursor.peer_id.clone(), cursor);
    }

    pub fn remove(&mut self, peer_id: &str) -> Option<RemoteCursor> {
        self.cursors.remove(peer_id)
    }

    pub fn get(&self, peer_id: &str) -> Option<&RemoteCursor> {
        self.cursors.get(peer_id)
    }

    pub fn cursors(&self) -> &HashMap<String, RemoteCursor> {
        &self.cursors
    }

    pub fn clear(&mut self) {
        self.cursors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(peer: &str, x: f64) -> RemoteCursor {
        RemoteCursor {
            peer_id: peer.into(),
            position: Point::new(x, 0.0),
            color: "#f00".into(),
            display_name: peer.to_uppercase(),
        }
    }

    #[test]
    fn test_upsert_overwrites() {
        let mut presence = PresenceTracker::new();
        presence.upsert(cursor("bob", 1.0));
        presence.upsert(cursor("bob", 2.0));
        assert_eq!(presence.cursors().len(), 1);
        assert_eq!(presence.get("bob").unwrap().position, Point::new(2.0, 0.0));
    }

    #[test]
    fn test_remove() {
        let mut presence = PresenceTracker::new();
        presence.upsert(cursor("bob", 1.0));
        assert!(presence.remove("bob").is_some());
        assert!(presence.remove("bob").is_none());
    }
}
