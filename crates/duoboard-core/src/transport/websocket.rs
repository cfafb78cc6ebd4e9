//! Native transport over the WebSocket relay.

use super::relay::{RelayClientMessage, RelayServerMessage};
use super::{ConnectionState, Transport, TransportError, TransportEvent};
use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tungstenite::{Message, connect};
use url::Url;

/// Commands sent to the socket thread.
enum WsCommand {
    Send(String),
    Close,
}

/// Relay client running on a background thread.
///
/// Sends are queued to the thread; inbound events are collected and drained
/// with [`Transport::poll`].
pub struct RelayTransport {
    peer_id: String,
    state: ConnectionState,
    events: Vec<TransportEvent>,
    cmd_tx: Option<Sender<WsCommand>>,
    event_rx: Option<Receiver<TransportEvent>>,
    _thread: Option<JoinHandle<()>>,
}

impl RelayTransport {
    /// Create a disconnected client that will join as `peer_id`.
    pub fn new(peer_id: impl Into<String>) -> Self {
        Self {
            peer_id: peer_id.into(),
            state: ConnectionState::Disconnected,
            events: Vec::new(),
            cmd_tx: None,
            event_rx: None,
            _thread: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Connect to the relay at `url` and join `room`.
    pub fn connect(&mut self, url: &str, room: &str) -> Result<(), TransportError> {
        if self.cmd_tx.is_some() {
            return Err(TransportError::Connect("already connected".to_string()));
        }

        let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
            return Err(TransportError::InvalidUrl(format!(
                "unsupported scheme: {}",
                parsed.scheme()
            )));
        }

        let join = serde_json::to_string(&RelayClientMessage::Join {
            room: room.to_string(),
            peer_id: self.peer_id.clone(),
        })
        .map_err(|e| TransportError::Send(e.to_string()))?;

        self.state = ConnectionState::Connecting;
        let (cmd_tx, cmd_rx) = channel::<WsCommand>();
        let (event_tx, event_rx) = channel::<TransportEvent>();
        let url = url.to_string();

        let handle = thread::spawn(move || {
            log::info!("relay thread: connecting to {}", url);
            let (mut socket, response) = match connect(&url) {
                Ok(ok) => ok,
                Err(e) => {
                    log::error!("relay connection failed: {}", e);
                    let _ = event_tx.send(TransportEvent::Error {
                        message: format!("connection failed: {}", e),
                    });
                    let _ = event_tx.send(TransportEvent::Disconnected);
                    return;
                }
            };
            log::info!("relay connected, status: {}", response.status());

            match socket.get_mut() {
                tungstenite::stream::MaybeTlsStream::Plain(tcp) => {
                    let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
                    let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
                }
                #[allow(unreachable_patterns)]
                _ => log::debug!("non-plain stream, relying on default timeouts"),
            }

            if let Err(e) = socket.send(Message::Text(join)) {
                log::error!("relay join failed: {}", e);
                let _ = event_tx.send(TransportEvent::Error {
                    message: format!("join failed: {}", e),
                });
                let _ = event_tx.send(TransportEvent::Disconnected);
                return;
            }
            let _ = event_tx.send(TransportEvent::Connected);

            loop {
                match cmd_rx.try_recv() {
                    Ok(WsCommand::Send(msg)) => {
                        if let Err(e) = socket.send(Message::Text(msg)) {
                            log::error!("relay send error: {}", e);
                            break;
                        }
                    }
                    Ok(WsCommand::Close) => {
                        let leave = serde_json::to_string(&RelayClientMessage::Leave).unwrap_or_default();
                        let _ = socket.send(Message::Text(leave));
                        let _ = socket.close(None);
                        break;
                    }
                    Err(TryRecvError::Disconnected) => break,
                    Err(TryRecvError::Empty) => {}
                }

                match socket.read() {
                    Ok(Message::Text(txt)) => match serde_json::from_str::<RelayServerMessage>(&txt) {
                        Ok(msg) => {
                            for event in msg.into_events() {
                                let _ = event_tx.send(event);
                            }
                        }
                        Err(e) => log::warn!("unparseable relay message: {}", e),
                    },
                    Ok(Message::Ping(data)) => {
                        let _ = socket.send(Message::Pong(data));
                    }
                    Ok(Message::Close(_)) => {
                        log::info!("relay closed the connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(tungstenite::Error::Io(ref e))
                        if e.kind() == std::io::ErrorKind::WouldBlock
                            || e.kind() == std::io::ErrorKind::TimedOut =>
                    {
                        continue;
                    }
                    Err(e) => {
                        log::error!("relay read error: {}", e);
                        break;
                    }
                }
            }

            log::info!("relay thread exiting");
            let _ = event_tx.send(TransportEvent::Disconnected);
        });

        self.cmd_tx = Some(cmd_tx);
        self.event_rx = Some(event_rx);
        self._thread = Some(handle);
        Ok(())
    }

    /// Leave the room and close the socket.
    pub fn disconnect(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(WsCommand::Close);
        }
        self.event_rx = None;
        self._thread = None;
        self.state = ConnectionState::Disconnected;
    }
}

impl Transport for RelayTransport {
    fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    fn send(&mut self, peer_id: &str, channel: &str, data: &str) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let tx = self.cmd_tx.as_ref().ok_or(TransportError::NotConnected)?;
        let msg = serde_json::to_string(&RelayClientMessage::Send {
            to: peer_id.to_string(),
            channel: channel.to_string(),
            data: data.to_string(),
        })
        .map_err(|e| TransportError::Send(e.to_string()))?;
        tx.send(WsCommand::Send(msg))
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        let mut thread_done = false;
        if let Some(ref rx) = self.event_rx {
            while let Ok(event) = rx.try_recv() {
                match &event {
                    TransportEvent::Connected => self.state = ConnectionState::Connected,
                    TransportEvent::Disconnected => {
                        self.state = ConnectionState::Disconnected;
                        thread_done = true;
                    }
                    TransportEvent::Error { .. } => self.state = ConnectionState::Error,
                    _ => {}
                }
                self.events.push(event);
            }
        }
        // The socket thread sends `Disconnected` last on every exit path, so
        // the channels are dead and `connect` may start over.
        if thread_done {
            self.cmd_tx = None;
            self.event_rx = None;
            self._thread = None;
        }
        std::mem::take(&mut self.events)
    }
}

impl Drop for RelayTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_urls() {
        let mut transport = RelayTransport::new("alice");
        assert!(matches!(
            transport.connect("not a url", "room"),
            Err(TransportError::InvalidUrl(_))
        ));
        assert!(matches!(
            transport.connect("http://localhost:3030/ws", "room"),
            Err(TransportError::InvalidUrl(_))
        ));
        assert_eq!(transport.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_send_before_connect() {
        let mut transport = RelayTransport::new("alice");
        assert!(!transport.is_connected());
        assert_eq!(
            transport.send("bob", "whiteboard", "{}"),
            Err(TransportError::NotConnected)
        );
        assert!(transport.poll().is_empty());
    }

    #[test]
    fn test_reconnect_after_failed_connect() {
        let mut transport = RelayTransport::new("alice");
        // Nothing listens on port 1, so the socket thread gives up quickly.
        transport.connect("ws://127.0.0.1:1/ws", "room").unwrap();
        assert_eq!(transport.state(), ConnectionState::Connecting);

        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        let mut events = Vec::new();
        while !events.contains(&TransportEvent::Disconnected) {
            assert!(std::time::Instant::now() < deadline, "connect never failed");
            events.extend(transport.poll());
            thread::sleep(Duration::from_millis(10));
        }
        assert!(matches!(events[0], TransportEvent::Error { .. }));
        assert_eq!(transport.state(), ConnectionState::Disconnected);

        assert!(transport.connect("ws://127.0.0.1:1/ws", "room").is_ok());
        assert_eq!(transport.state(), ConnectionState::Connecting);
        transport.disconnect();
    }
}
