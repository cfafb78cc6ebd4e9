//! In-process transport linking two engines, for tests and local sessions.

use super::{Transport, TransportError, TransportEvent};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

type Mailbox = Rc<RefCell<VecDeque<TransportEvent>>>;

/// One end of an in-memory link.
///
/// Both ends share a connected flag; each end's outbox is the other end's
/// inbox.
pub struct MemoryTransport {
    peer_id: String,
    remote_id: String,
    connected: Rc<Cell<bool>>,
    inbox: Mailbox,
    outbox: Mailbox,
}

impl MemoryTransport {
    /// Create a connected pair. Each side starts with `Connected` and a
    /// `PeerJoined` for the other side waiting in its inbox.
    pub fn pair(a: impl Into<String>, b: impl Into<String>) -> (MemoryTransport, MemoryTransport) {
        let a = a.into();
        let b = b.into();
        let connected = Rc::new(Cell::new(true));
        let a_inbox: Mailbox = Rc::default();
        let b_inbox: Mailbox = Rc::default();

        let left = MemoryTransport {
            peer_id: a.clone(),
            remote_id: b.clone(),
            connected: connected.clone(),
            inbox: a_inbox.clone(),
            outbox: b_inbox.clone(),
        };
        let right = MemoryTransport {
            peer_id: b,
            remote_id: a,
            connected,
            inbox: b_inbox,
            outbox: a_inbox,
        };
        left.announce();
        right.announce();
        (left, right)
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn remote_id(&self) -> &str {
        &self.remote_id
    }

    /// Take the link down; both sides are told the other left.
    pub fn disconnect(&self) {
        if !self.connected.replace(false) {
            return;
        }
        self.inbox.borrow_mut().push_back(TransportEvent::PeerLeft {
            peer_id: self.remote_id.clone(),
        });
        self.inbox.borrow_mut().push_back(TransportEvent::Disconnected);
        self.outbox.borrow_mut().push_back(TransportEvent::PeerLeft {
            peer_id: self.peer_id.clone(),
        });
        self.outbox.borrow_mut().push_back(TransportEvent::Disconnected);
    }

    /// Bring the link back up; both sides see the other join again.
    pub fn reconnect(&self) {
        if self.connected.replace(true) {
            return;
        }
        self.announce();
        self.outbox.borrow_mut().push_back(TransportEvent::Connected);
        self.outbox.borrow_mut().push_back(TransportEvent::PeerJoined {
            peer_id: self.peer_id.clone(),
        });
    }

    /// Number of undelivered inbound events.
    pub fn pending(&self) -> usize {
        self.inbox.borrow().len()
    }

    fn announce(&self) {
        let mut inbox = self.inbox.borrow_mut();
        inbox.push_back(TransportEvent::Connected);
        inbox.push_back(TransportEvent::PeerJoined {
            peer_id: self.remote_id.clone(),
        });
    }
}

impl Transport for MemoryTransport {
    fn is_connected(&self) -> bool {
        self.connected.get()
    }

    fn send(&mut self, peer_id: &str, channel: &str, data: &str) -> Result<(), TransportError> {
        if !self.connected.get() {
            return Err(TransportError::NotConnected);
        }
        if peer_id != self.remote_id {
            return Err(TransportError::UnknownPeer(peer_id.to_string()));
        }
        self.outbox.borrow_mut().push_back(TransportEvent::Message {
            from: self.peer_id.clone(),
            channel: channel.to_string(),
            data: data.to_string(),
        });
        Ok(())
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        self.inbox.borrow_mut().drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_announces_each_other() {
        let (mut a, mut b) = MemoryTransport::pair("a", "b");
        assert_eq!(
            a.poll(),
            vec![TransportEvent::Connected, TransportEvent::PeerJoined { peer_id: "b".into() }]
        );
        assert_eq!(b.poll().len(), 2);
        assert!(a.poll().is_empty());
    }

    #[test]
    fn test_send_delivers_to_other_side() {
        let (mut a, mut b) = MemoryTransport::pair("a", "b");
        b.poll();
        a.send("b", "whiteboard", "hello").unwrap();
        assert_eq!(
            b.poll(),
            vec![TransportEvent::Message {
                from: "a".into(),
                channel: "whiteboard".into(),
                data: "hello".into(),
            }]
        );
    }

    #[test]
    fn test_send_errors() {
        let (mut a, _b) = MemoryTransport::pair("a", "b");
        assert_eq!(a.send("c", "whiteboard", "x"), Err(TransportError::UnknownPeer("c".into())));
        a.disconnect();
        assert!(!a.is_connected());
        assert_eq!(a.send("b", "whiteboard", "x"), Err(TransportError::NotConnected));
    }

    #[test]
    fn test_disconnect_and_reconnect_notify_both() {
        let (mut a, mut b) = MemoryTransport::pair("a", "b");
        a.poll();
        b.poll();

        a.disconnect();
        assert!(b.poll().contains(&TransportEvent::PeerLeft { peer_id: "a".into() }));
        assert!(!b.is_connected());

        b.reconnect();
        assert!(a.poll().contains(&TransportEvent::PeerJoined { peer_id: "b".into() }));
        assert!(a.is_connected());
    }
}
