//! Sync engine: applies local gestures, broadcasts them to the peer and
//! applies the peer's messages to the local store and history.

use crate::backdrop::{Backdrop, BackdropError, BackdropKind, BackdropLayout, BackdropNegotiator, PageDimensions};
use crate::config::EngineConfig;
use crate::entity::{
    Entity, EntityId, EntityRef, Geometry, Participant, Shape, ShapeKind, ShapePatch, Stroke, new_entity_id,
};
use crate::history::{HistoryManager, HistoryMove, Snapshot};
use crate::pages::PageBook;
use crate::presence::{PresenceTracker, RemoteCursor};
use crate::protocol::{self, Message, Payload, ProtocolError};
use crate::store::EntityStore;
use crate::throttle::Throttle;
use crate::transport::{Transport, TransportEvent};
use kurbo::{Point, Size};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

/// Drawing tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Pointer moves only report the cursor.
    #[default]
    None,
    Pen,
    Line,
    Circle,
    Ellipse,
    Rectangle,
    Triangle,
}

impl Tool {
    /// Shape kind produced by this tool, if it draws a parametric shape.
    pub fn shape_kind(self) -> Option<ShapeKind> {
        match self {
            Tool::Line => Some(ShapeKind::Line),
            Tool::Circle => Some(ShapeKind::Circle),
            Tool::Ellipse => Some(ShapeKind::Ellipse),
            Tool::Rectangle => Some(ShapeKind::Rectangle),
            Tool::Triangle => Some(ShapeKind::Triangle),
            Tool::None | Tool::Pen => None,
        }
    }
}

/// Tool and style captured when a gesture begins.
///
/// Callers pass the selection as it is at pointer-down; later changes to the
/// UI selection do not affect a gesture already in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSettings {
    pub tool: Tool,
    pub color: String,
    pub stroke_width: f64,
    #[serde(default)]
    pub fill: Option<String>,
}

impl ToolSettings {
    pub const DEFAULT_STROKE_WIDTH: f64 = 5.0;

    pub fn new(tool: Tool, color: impl Into<String>) -> Self {
        Self {
            tool,
            color: color.into(),
            stroke_width: Self::DEFAULT_STROKE_WIDTH,
            fill: None,
        }
    }

    pub fn with_stroke_width(mut self, stroke_width: f64) -> Self {
        self.stroke_width = stroke_width;
        self
    }

    pub fn with_fill(mut self, fill: impl Into<String>) -> Self {
        self.fill = Some(fill.into());
        self
    }
}

/// Gesture state: idle, or drawing one entity.
#[derive(Debug, Clone, Default)]
enum Gesture {
    #[default]
    Idle,
    Active {
        id: EntityId,
        /// `None` for strokes.
        shape: Option<ShapeKind>,
    },
}

/// Notifications for the rendering side, drained with [`SyncEngine::take_events`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    HistoryChanged { can_undo: bool, can_redo: bool },
    /// The store changed; re-read strokes and shapes.
    DrawingChanged,
    PresenceChanged,
    BackdropChanged(BackdropKind),
    BackdropDimensionsChanged(BackdropLayout),
    PeerConnected(String),
    PeerDisconnected(String),
}

/// Owns the drawing state of one peer and keeps it in sync with the other.
///
/// Single-threaded and event driven: every method runs to completion on the
/// caller's thread. Sends are fire-and-forget; when there is no peer or the
/// transport is down, edits stay local and the next full-state broadcast
/// reconciles.
pub struct SyncEngine<T: Transport> {
    config: EngineConfig,
    local: Participant,
    remote: Option<String>,
    transport: T,
    store: EntityStore,
    history: HistoryManager,
    pages: PageBook,
    backdrop: BackdropNegotiator,
    presence: PresenceTracker,
    gesture: Gesture,
    cursor_throttle: Throttle,
    state_throttle: Throttle,
    state_pending: bool,
    events: Vec<EngineEvent>,
}

impl<T: Transport> SyncEngine<T> {
    pub fn new(config: EngineConfig, local: Participant, transport: T) -> Self {
        let cursor_throttle = Throttle::new(config.cursor_interval());
        let state_throttle = Throttle::new(config.state_interval());
        Self {
            config,
            local,
            remote: None,
            transport,
            store: EntityStore::new(),
            history: HistoryManager::new(),
            pages: PageBook::new(),
            backdrop: BackdropNegotiator::new(),
            presence: PresenceTracker::new(),
            gesture: Gesture::Idle,
            cursor_throttle,
            state_throttle,
            state_pending: false,
            events: Vec::new(),
        }
    }

    // --- Read-only views ---

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn local(&self) -> &Participant {
        &self.local
    }

    pub fn remote_peer(&self) -> Option<&str> {
        self.remote.as_deref()
    }

    /// Live strokes and shapes of the current page.
    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn strokes(&self) -> &[Stroke] {
        self.store.strokes()
    }

    pub fn shapes(&self) -> &[Shape] {
        self.store.shapes()
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn cursors(&self) -> &HashMap<String, RemoteCursor> {
        self.presence.cursors()
    }

    pub fn backdrop(&self) -> &Backdrop {
        self.backdrop.active()
    }

    pub fn backdrop_layout(&self) -> Option<&BackdropLayout> {
        self.backdrop.layout()
    }

    /// Canvas extent for the current page, once the backdrop is measured.
    pub fn canvas_extent(&self) -> Option<Size> {
        self.backdrop.layout().map(|l| l.extent(self.pages.current()))
    }

    pub fn current_page(&self) -> u32 {
        self.pages.current()
    }

    /// Whether a gesture is in progress.
    pub fn is_drawing(&self) -> bool {
        matches!(self.gesture, Gesture::Active { .. })
    }

    /// Full copy of the drawing, as a history commit would record it.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.store, &self.pages)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Drain pending notifications.
    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    // --- Local gestures ---

    /// Begin a gesture with the tool selected at this instant.
    /// Returns the id of the new entity, or `None` when the tool draws nothing.
    pub fn pointer_down(&mut self, point: Point, settings: &ToolSettings) -> Option<EntityId> {
        if self.is_drawing() {
            log::debug!("pointer down during an active gesture; finishing it first");
            self.pointer_up();
        }

        let id = new_entity_id(&self.local.id);
        let (entity, shape) = match settings.tool {
            Tool::None => return None,
            Tool::Pen => (
                Entity::Stroke(Stroke::begin(id.clone(), point, settings.color.clone(), settings.stroke_width)),
                None,
            ),
            tool => {
                let kind = tool.shape_kind()?;
                (
                    Entity::Shape(Shape::begin(
                        id.clone(),
                        kind,
                        point,
                        settings.color.clone(),
                        settings.stroke_width,
                        settings.fill.clone(),
                    )),
                    Some(kind),
                )
            }
        };

        self.store.insert(entity.clone());
        self.gesture = Gesture::Active { id: id.clone(), shape };
        self.send(Payload::Draw { entity });
        self.events.push(EngineEvent::DrawingChanged);
        Some(id)
    }

    /// Extend the active entity, or report the cursor when nothing changed.
    pub fn pointer_move(&mut self, point: Point) {
        let changed = match &self.gesture {
            Gesture::Idle => false,
            Gesture::Active { id, shape: None } => {
                let moved = self.store.stroke(id).is_some_and(|s| s.last_point() != Some(point));
                moved && self.store.append_point(id, point.x, point.y)
            }
            Gesture::Active { id, shape: Some(_) } => match self.store.shape(id) {
                Some(shape) => {
                    let geometry = Geometry::spanning(shape.kind(), shape.anchor(), point);
                    geometry != shape.geometry && self.store.update_shape(id, &ShapePatch::geometry(geometry))
                }
                None => false,
            },
        };
        let updated = match &self.gesture {
            Gesture::Active { id, .. } if changed => self.store.get(id),
            _ => None,
        };

        match updated {
            Some(entity) => {
                self.send(Payload::Update { entity });
                self.events.push(EngineEvent::DrawingChanged);
            }
            None => self.send_cursor(point),
        }
    }

    /// Finish the gesture and commit history if the drawing changed.
    /// Returns the new history step when a commit happened.
    pub fn pointer_up(&mut self) -> Option<usize> {
        let Gesture::Active { id, shape } = std::mem::take(&mut self.gesture) else {
            return None;
        };

        // A click with a shape tool leaves nothing visible behind.
        if shape.is_some() && self.store.shape(&id).is_some_and(|s| s.geometry.is_degenerate()) {
            self.store.remove(&id);
            self.send(Payload::Erase { entity: EntityRef { id } });
            self.events.push(EngineEvent::DrawingChanged);
        }

        self.commit()
    }

    /// Remove one entity from the current page.
    pub fn erase(&mut self, id: &str) -> bool {
        if self.is_drawing() {
            self.pointer_up();
        }
        let Some(entity) = self.store.remove(id) else {
            return false;
        };
        self.send(Payload::Erase { entity: entity.to_ref() });
        self.events.push(EngineEvent::DrawingChanged);
        self.commit();
        true
    }

    /// Empty the current page and push the result to the peer right away.
    pub fn clear(&mut self) {
        self.gesture = Gesture::Idle;
        if self.store.is_empty() {
            return;
        }
        self.store.clear();
        self.events.push(EngineEvent::DrawingChanged);
        if self.history.commit_if_changed(self.snapshot()).is_some() {
            self.notify_history();
        }
        self.send_state();
        self.state_pending = false;
    }

    pub fn undo(&mut self) -> HistoryMove {
        if self.is_drawing() {
            self.pointer_up();
        }
        let result = self.history.undo();
        self.after_local_move(&result, true);
        result
    }

    pub fn redo(&mut self) -> HistoryMove {
        if self.is_drawing() {
            self.pointer_up();
        }
        let result = self.history.redo();
        self.after_local_move(&result, false);
        result
    }

    /// Load another page of a document backdrop. Local only.
    pub fn go_to_page(&mut self, page: u32) -> bool {
        if self.is_drawing() {
            self.pointer_up();
        }
        if !self.pages.switch(&mut self.store, page) {
            return false;
        }
        self.events.push(EngineEvent::DrawingChanged);
        if let Some(layout) = self.backdrop.layout() {
            self.events.push(EngineEvent::BackdropDimensionsChanged(layout.clone()));
        }
        true
    }

    // --- Backdrop ---

    /// Switch backdrop. Clears the drawing and history on success.
    ///
    /// Re-selecting the backdrop that is already showing (same kind and URL)
    /// changes nothing and sends nothing; the peer ignores such a repeat too.
    pub fn set_backdrop(&mut self, backdrop: Backdrop) -> Result<(), BackdropError> {
        if backdrop.kind() == self.backdrop.kind() && backdrop.url() == self.backdrop.active().url() {
            log::debug!("{:?} backdrop already active", backdrop.kind());
            return Ok(());
        }
        self.backdrop.activate(backdrop)?;
        self.reset_drawing();
        let active = self.backdrop.active();
        let payload = Payload::Backdrop {
            kind: active.kind(),
            url: active.url().map(str::to_string),
        };
        self.events.push(EngineEvent::BackdropChanged(self.backdrop.kind()));
        self.send(payload);
        Ok(())
    }

    /// Show an uploaded image behind the drawing.
    pub fn set_image_backdrop(&mut self, url: impl Into<String>) -> Result<(), BackdropError> {
        self.set_backdrop(Backdrop::image(url))
    }

    /// Show an uploaded paginated document behind the drawing.
    pub fn set_document_backdrop(&mut self, url: impl Into<String>) -> Result<(), BackdropError> {
        self.set_backdrop(Backdrop::document(url))
    }

    /// A live screen share started; it replaces whatever backdrop was active.
    pub fn start_screen_share(&mut self) -> Result<(), BackdropError> {
        self.set_backdrop(Backdrop::screen_share())
    }

    /// The live screen share ended. No-op unless one is active.
    pub fn stop_screen_share(&mut self) -> Result<(), BackdropError> {
        if self.backdrop.kind() != BackdropKind::ScreenShare {
            return Ok(());
        }
        self.set_backdrop(Backdrop::None)
    }

    pub fn clear_backdrop(&mut self) -> Result<(), BackdropError> {
        self.set_backdrop(Backdrop::None)
    }

    /// The rendering side measured the backdrop (image natural size, document
    /// page sizes, or live video size). Shares the layout with the peer.
    pub fn backdrop_measured(
        &mut self,
        size: Size,
        pages: Vec<PageDimensions>,
    ) -> Result<BackdropLayout, BackdropError> {
        let layout = self.backdrop.measured(size, pages)?;
        self.events.push(EngineEvent::BackdropDimensionsChanged(layout.clone()));
        self.send(Payload::from_layout(&layout));
        Ok(layout)
    }

    /// Dimensions-ready callback from the screen-share component.
    pub fn screen_share_dimensions(&mut self, size: Size) -> Result<BackdropLayout, BackdropError> {
        if self.backdrop.kind() != BackdropKind::ScreenShare {
            return Err(BackdropError::NothingActive);
        }
        self.backdrop_measured(size, Vec::new())
    }

    // --- Peers ---

    /// The remote peer became reachable. Pushes our backdrop and drawing to
    /// it if we have any.
    pub fn peer_connected(&mut self, peer_id: &str) {
        if peer_id == self.local.id {
            return;
        }
        if let Some(previous) = self.remote.as_deref().filter(|p| *p != peer_id) {
            log::warn!("peer {} replaces {}; only two editors are supported", peer_id, previous);
        }
        self.remote = Some(peer_id.to_string());
        self.cursor_throttle.reset();
        self.events.push(EngineEvent::PeerConnected(peer_id.to_string()));

        let active = self.backdrop.active().clone();
        if active != Backdrop::None {
            self.send(Payload::Backdrop {
                kind: active.kind(),
                url: active.url().map(str::to_string),
            });
            if let Some(layout) = self.backdrop.layout().cloned() {
                self.send(Payload::from_layout(&layout));
            }
        }
        if self.history.len() > 1 || !self.snapshot().is_empty() {
            self.send_state();
            self.state_pending = false;
        }
    }

    /// The remote peer went away; forget it and its cursor.
    pub fn peer_disconnected(&mut self, peer_id: &str) {
        if self.remote.as_deref() == Some(peer_id) {
            self.remote = None;
        }
        if self.presence.remove(peer_id).is_some() {
            self.events.push(EngineEvent::PresenceChanged);
        }
        self.events.push(EngineEvent::PeerDisconnected(peer_id.to_string()));
    }

    // --- Inbound ---

    /// Poll the transport and apply everything it delivered.
    pub fn pump(&mut self) {
        for event in self.transport.poll() {
            self.handle_event(event);
        }
    }

    /// Apply a single transport event.
    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => log::debug!("transport connected"),
            TransportEvent::Disconnected => log::debug!("transport disconnected; editing locally"),
            TransportEvent::PeerJoined { peer_id } => self.peer_connected(&peer_id),
            TransportEvent::PeerLeft { peer_id } => self.peer_disconnected(&peer_id),
            TransportEvent::Message { from, channel, data } => {
                if channel != self.config.channel {
                    log::debug!("ignoring {}-byte message from {} on channel {}", data.len(), from, channel);
                    return;
                }
                self.receive(&data);
            }
            TransportEvent::Error { message } => log::warn!("transport error: {}", message),
        }
    }

    /// Decode and apply one inbound protocol message. Never re-broadcasts.
    pub fn receive(&mut self, text: &str) {
        match protocol::decode(text) {
            Ok(message) => self.apply(message),
            Err(ProtocolError::UnknownAction(action)) => {
                log::warn!("discarding message with unknown action {:?}", action)
            }
            Err(e) => log::warn!("discarding malformed message: {}", e),
        }
    }

    /// Apply a decoded message from the peer.
    pub fn apply(&mut self, message: Message) {
        if message.author_id == self.local.id {
            log::debug!("ignoring echoed {} message", message.action());
            return;
        }
        if message.payload.is_drawing() && message.backdrop_kind != self.backdrop.kind() {
            log::debug!(
                "{} message for {:?} backdrop while {:?} is active",
                message.action(),
                message.backdrop_kind,
                self.backdrop.kind()
            );
        }

        let Message {
            author_id,
            author_name,
            color,
            page,
            payload,
            ..
        } = message;

        match payload {
            Payload::Draw { entity } => {
                let on_current = self.is_current_page(page);
                if self.store_for(page).insert(entity) && on_current {
                    self.events.push(EngineEvent::DrawingChanged);
                }
            }
            Payload::Update { entity } => {
                let on_current = self.is_current_page(page);
                if self.store_for(page).replace(entity) && on_current {
                    self.events.push(EngineEvent::DrawingChanged);
                }
            }
            Payload::Erase { entity } => {
                let on_current = self.is_current_page(page);
                if self.store_for(page).remove(&entity.id).is_some() && on_current {
                    self.events.push(EngineEvent::DrawingChanged);
                }
            }
            Payload::Undo { snapshot, history_step } | Payload::Redo { snapshot, history_step } => {
                self.restore_remote(&snapshot);
                self.history.adopt(history_step, snapshot);
                self.events.push(EngineEvent::DrawingChanged);
                self.notify_history();
            }
            Payload::State {
                snapshot,
                history_step,
                history,
            } => {
                self.restore_remote(&snapshot);
                match history {
                    Some(entries) => self.history.replace(entries, history_step),
                    None => {
                        self.history.adopt(history_step, snapshot);
                    }
                }
                self.events.push(EngineEvent::DrawingChanged);
                self.notify_history();
            }
            Payload::Cursor { position } => {
                self.presence.upsert(RemoteCursor {
                    peer_id: author_id,
                    position,
                    color,
                    display_name: author_name,
                });
                self.events.push(EngineEvent::PresenceChanged);
            }
            Payload::Backdrop { kind, url } => {
                if kind == self.backdrop.kind() && url.as_deref() == self.backdrop.active().url() {
                    log::debug!("{:?} backdrop from {} already active", kind, author_id);
                    return;
                }
                let applied = Backdrop::from_wire(kind, url).and_then(|b| self.backdrop.activate(b));
                match applied {
                    Ok(()) => {
                        self.reset_drawing();
                        self.events.push(EngineEvent::BackdropChanged(kind));
                    }
                    Err(e) => log::warn!("ignoring {:?} backdrop from {}: {}", kind, author_id, e),
                }
            }
            Payload::BackdropTransition {
                kind,
                width,
                height,
                page_dimensions,
            } => {
                let layout = BackdropLayout {
                    kind,
                    width,
                    height,
                    page_dimensions: page_dimensions.unwrap_or_default(),
                };
                self.backdrop.apply_layout(layout.clone());
                self.events.push(EngineEvent::BackdropDimensionsChanged(layout));
            }
        }
    }

    /// Send a deferred full-state broadcast once its window has passed.
    /// Call periodically (e.g. once per frame).
    pub fn tick(&mut self) {
        if !self.state_pending || self.is_drawing() {
            return;
        }
        if self.state_throttle.try_acquire(Instant::now()) {
            self.state_pending = false;
            self.send_state();
        }
    }

    /// Whether a throttled full-state broadcast is waiting for [`Self::tick`].
    pub fn has_pending_state(&self) -> bool {
        self.state_pending
    }

    // --- Internals ---

    fn is_current_page(&self, page: Option<u32>) -> bool {
        match page {
            Some(p) if self.pages.is_enabled() => p == self.pages.current(),
            _ => true,
        }
    }

    /// Store a remote edit lands in: the live store, or a stashed page.
    fn store_for(&mut self, page: Option<u32>) -> &mut EntityStore {
        if self.is_current_page(page) {
            &mut self.store
        } else {
            // is_current_page only returns false for Some(page) while paging.
            self.pages.stashed_mut(page.unwrap_or_default())
        }
    }

    /// Restore a peer's snapshot, keeping any entity we are drawing right now.
    fn restore_remote(&mut self, snapshot: &Snapshot) {
        let active = match &self.gesture {
            Gesture::Active { id, .. } => self.store.get(id),
            Gesture::Idle => None,
        };
        snapshot.restore_into(&mut self.store, &mut self.pages);
        if let Some(entity) = active {
            if !self.store.contains(entity.id()) {
                self.store.insert(entity);
            }
        }
    }

    /// Commit the live state if it changed, then schedule a full-state broadcast.
    fn commit(&mut self) -> Option<usize> {
        let step = self.history.commit_if_changed(self.snapshot())?;
        self.notify_history();
        self.broadcast_state();
        Some(step)
    }

    fn after_local_move(&mut self, result: &HistoryMove, undo: bool) {
        let HistoryMove::Moved { step, snapshot } = result else {
            log::debug!("{} at history boundary", if undo { "undo" } else { "redo" });
            return;
        };
        snapshot.restore_into(&mut self.store, &mut self.pages);
        let (snapshot, history_step) = (snapshot.clone(), *step);
        self.send(if undo {
            Payload::Undo { snapshot, history_step }
        } else {
            Payload::Redo { snapshot, history_step }
        });
        self.events.push(EngineEvent::DrawingChanged);
        self.notify_history();
    }

    /// Back to an empty drawing with a single empty history entry.
    fn reset_drawing(&mut self) {
        self.gesture = Gesture::Idle;
        self.store.clear();
        self.pages.reset(self.backdrop.kind() == BackdropKind::Document);
        self.history.reset();
        self.state_pending = false;
        self.events.push(EngineEvent::DrawingChanged);
        self.notify_history();
    }

    fn notify_history(&mut self) {
        self.events.push(EngineEvent::HistoryChanged {
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        });
    }

    fn send_cursor(&mut self, position: Point) {
        if self.remote.is_none() {
            return;
        }
        if self.cursor_throttle.try_acquire(Instant::now()) {
            self.send(Payload::Cursor { position });
        }
    }

    fn broadcast_state(&mut self) {
        if self.remote.is_none() {
            return;
        }
        if self.state_throttle.try_acquire(Instant::now()) {
            self.state_pending = false;
            self.send_state();
        } else {
            log::debug!("full-state broadcast deferred by throttle");
            self.state_pending = true;
        }
    }

    fn send_state(&mut self) {
        let payload = Payload::State {
            snapshot: self.snapshot(),
            history_step: self.history.step(),
            history: self.config.share_history.then(|| self.history.entries().to_vec()),
        };
        self.send(payload);
    }

    /// Encode and hand a payload to the transport. Failures are logged only.
    fn send(&mut self, payload: Payload) {
        let Some(peer) = self.remote.as_deref() else {
            log::trace!("no peer; keeping {} local", payload.action());
            return;
        };
        if !self.transport.is_connected() {
            log::debug!("transport not connected; keeping {} local", payload.action());
            return;
        }
        let message = Message::new(&self.local, self.backdrop.kind(), self.pages.current_tag(), payload);
        match protocol::encode(&message) {
            Ok(text) => {
                if let Err(e) = self.transport.send(peer, &self.config.channel, &text) {
                    log::warn!("failed to send {}: {}", message.action(), e);
                }
            }
            Err(e) => log::error!("failed to encode {}: {}", message.action(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use std::time::Duration;

    type Engine = SyncEngine<MemoryTransport>;

    fn connected_pair(config: EngineConfig) -> (Engine, Engine) {
        let (ta, tb) = MemoryTransport::pair("alice", "bob");
        let mut a = SyncEngine::new(config.clone(), Participant::new("alice", "Alice", "#e91e63"), ta);
        let mut b = SyncEngine::new(config, Participant::new("bob", "Bob", "#2196f3"), tb);
        a.pump();
        b.pump();
        a.take_events();
        b.take_events();
        (a, b)
    }

    fn pen() -> ToolSettings {
        ToolSettings::new(Tool::Pen, "#000000").with_stroke_width(3.0)
    }

    fn draw_stroke(engine: &mut Engine, points: &[(f64, f64)]) -> EntityId {
        let (x, y) = points[0];
        let id = engine.pointer_down(Point::new(x, y), &pen()).unwrap();
        for &(x, y) in &points[1..] {
            engine.pointer_move(Point::new(x, y));
        }
        engine.pointer_up();
        id
    }

    #[test]
    fn test_stroke_reaches_peer() {
        let (mut a, mut b) = connected_pair(EngineConfig::default());
        draw_stroke(&mut a, &[(0.0, 0.0), (5.0, 5.0), (10.0, 5.0)]);

        b.pump();
        assert_eq!(b.strokes().len(), 1);
        assert_eq!(b.strokes()[0].points, vec![0.0, 0.0, 5.0, 5.0, 10.0, 5.0]);
        assert_eq!(b.snapshot(), a.snapshot());
        assert_eq!(b.history().step(), 1);
        assert!(b.can_undo());
    }

    #[test]
    fn test_remote_edits_are_not_rebroadcast() {
        let (mut a, mut b) = connected_pair(EngineConfig::default());
        draw_stroke(&mut a, &[(0.0, 0.0), (1.0, 1.0)]);
        b.pump();
        assert_eq!(a.transport().pending(), 0);
    }

    #[test]
    fn test_circle_radius_from_drag() {
        let (mut a, mut b) = connected_pair(EngineConfig::default());
        let circle = ToolSettings::new(Tool::Circle, "#ff0000");
        a.pointer_down(Point::new(10.0, 10.0), &circle).unwrap();
        a.pointer_move(Point::new(10.0, 40.0));
        assert_eq!(a.pointer_up(), Some(1));
        assert!(a.can_undo());
        assert!(!a.can_redo());

        b.pump();
        assert_eq!(b.shapes().len(), 1);
        assert_eq!(b.shapes()[0].geometry, Geometry::Circle { radius: 30.0 });
        assert_eq!((b.shapes()[0].x, b.shapes()[0].y), (10.0, 10.0));
    }

    #[test]
    fn test_shape_click_leaves_nothing() {
        let (mut a, mut b) = connected_pair(EngineConfig::default());
        let rect = ToolSettings::new(Tool::Rectangle, "#000000");
        a.pointer_down(Point::new(20.0, 20.0), &rect).unwrap();
        assert_eq!(a.pointer_up(), None);
        assert!(a.shapes().is_empty());
        assert_eq!(a.history().len(), 1);

        b.pump();
        assert!(b.shapes().is_empty());
    }

    #[test]
    fn test_idle_pointer_sends_throttled_cursor() {
        let (mut a, mut b) = connected_pair(EngineConfig::default());
        let none = ToolSettings::new(Tool::None, "#000000");
        assert_eq!(a.pointer_down(Point::new(1.0, 1.0), &none), None);
        a.pointer_move(Point::new(1.0, 1.0));
        a.pointer_move(Point::new(2.0, 2.0));
        a.pointer_move(Point::new(3.0, 3.0));
        assert_eq!(b.transport().pending(), 1);

        b.pump();
        let cursor = &b.cursors()["alice"];
        assert_eq!(cursor.position, Point::new(1.0, 1.0));
        assert_eq!(cursor.display_name, "Alice");
        assert!(b.take_events().contains(&EngineEvent::PresenceChanged));
        assert!(b.snapshot().is_empty());
    }

    #[test]
    fn test_undo_redo_propagate() {
        let (mut a, mut b) = connected_pair(EngineConfig::default());
        draw_stroke(&mut a, &[(0.0, 0.0), (4.0, 4.0)]);
        b.pump();

        assert!(matches!(a.undo(), HistoryMove::Moved { step: 0, .. }));
        assert!(a.strokes().is_empty());
        b.pump();
        assert!(b.strokes().is_empty());
        assert_eq!(b.history().step(), 0);
        assert!(b.can_redo());

        assert!(matches!(a.redo(), HistoryMove::Moved { step: 1, .. }));
        b.pump();
        assert_eq!(b.strokes().len(), 1);
        assert_eq!(a.redo(), HistoryMove::AtNewest);
    }

    #[test]
    fn test_undo_at_oldest_sends_nothing() {
        let (mut a, b) = connected_pair(EngineConfig::default());
        assert_eq!(a.undo(), HistoryMove::AtOldest);
        assert_eq!(b.transport().pending(), 0);
    }

    #[test]
    fn test_history_events() {
        let (mut a, _b) = connected_pair(EngineConfig::default());
        draw_stroke(&mut a, &[(0.0, 0.0), (1.0, 0.0)]);
        let events = a.take_events();
        assert!(events.contains(&EngineEvent::HistoryChanged {
            can_undo: true,
            can_redo: false
        }));
        assert!(events.contains(&EngineEvent::DrawingChanged));
    }

    #[test]
    fn test_state_broadcast_is_deferred_then_flushed() {
        let config = EngineConfig {
            state_interval_ms: 30,
            ..EngineConfig::default()
        };
        let (mut a, mut b) = connected_pair(config);
        draw_stroke(&mut a, &[(0.0, 0.0), (1.0, 1.0)]);
        assert!(!a.has_pending_state());
        draw_stroke(&mut a, &[(5.0, 5.0), (6.0, 6.0)]);
        assert!(a.has_pending_state());

        a.tick();
        assert!(a.has_pending_state());
        std::thread::sleep(Duration::from_millis(40));
        a.tick();
        assert!(!a.has_pending_state());

        b.pump();
        assert_eq!(b.snapshot(), a.snapshot());
        assert_eq!(b.history().len(), 3);
    }

    #[test]
    fn test_remote_state_keeps_active_gesture() {
        let (mut a, mut b) = connected_pair(EngineConfig::default());
        draw_stroke(&mut b, &[(50.0, 50.0), (60.0, 60.0)]);

        let mine = a.pointer_down(Point::new(0.0, 0.0), &pen()).unwrap();
        a.pump();
        assert_eq!(a.strokes().len(), 2);
        assert!(a.store().contains(&mine));
        assert!(a.is_drawing());

        a.pointer_move(Point::new(3.0, 3.0));
        a.pointer_up();
        b.pump();
        assert_eq!(b.strokes().len(), 2);
    }

    #[test]
    fn test_erase() {
        let (mut a, mut b) = connected_pair(EngineConfig::default());
        let id = draw_stroke(&mut a, &[(0.0, 0.0), (1.0, 1.0)]);
        assert!(a.erase(&id));
        assert!(!a.erase("missing"));
        assert!(a.strokes().is_empty());
        assert_eq!(a.history().len(), 3);

        b.pump();
        assert!(b.strokes().is_empty());
    }

    #[test]
    fn test_clear_bypasses_state_throttle() {
        let (mut a, mut b) = connected_pair(EngineConfig::default());
        draw_stroke(&mut a, &[(0.0, 0.0), (1.0, 1.0)]);
        draw_stroke(&mut a, &[(2.0, 2.0), (3.0, 3.0)]);
        assert!(a.has_pending_state());

        a.clear();
        assert!(!a.has_pending_state());
        b.pump();
        assert!(b.snapshot().is_empty());
        assert_eq!(b.history().step(), a.history().step());
    }

    #[test]
    fn test_backdrop_switch_clears_both_sides() {
        let (mut a, mut b) = connected_pair(EngineConfig::default());
        draw_stroke(&mut a, &[(0.0, 0.0), (1.0, 1.0)]);
        b.pump();
        b.take_events();

        a.set_image_backdrop("https://files.example/board.png").unwrap();
        assert!(a.strokes().is_empty());
        assert_eq!(a.history().len(), 1);

        b.pump();
        assert_eq!(b.backdrop().kind(), BackdropKind::Image);
        assert_eq!(b.backdrop().url(), Some("https://files.example/board.png"));
        assert!(b.strokes().is_empty());
        assert!(!b.can_undo());
        assert!(b.take_events().contains(&EngineEvent::BackdropChanged(BackdropKind::Image)));
    }

    #[test]
    fn test_reselecting_active_backdrop_keeps_drawing() {
        let (mut a, mut b) = connected_pair(EngineConfig::default());
        a.set_image_backdrop("https://files.example/board.png").unwrap();
        draw_stroke(&mut a, &[(0.0, 0.0), (5.0, 5.0)]);
        b.pump();
        assert_eq!(b.strokes().len(), 1);
        let step = a.history().step();
        a.take_events();

        a.set_image_backdrop("https://files.example/board.png").unwrap();
        assert_eq!(a.strokes().len(), 1);
        assert_eq!(a.history().step(), step);
        assert!(a.take_events().is_empty());

        b.pump();
        assert_eq!(b.strokes().len(), 1);
        assert_eq!(a.snapshot(), b.snapshot());

        a.start_screen_share().unwrap();
        b.pump();
        a.start_screen_share().unwrap();
        a.clear_backdrop().unwrap();
        b.pump();
        assert_eq!(b.backdrop().kind(), BackdropKind::None);
        assert_eq!(a.snapshot(), b.snapshot());
    }

    #[test]
    fn test_screen_share_blocks_other_backdrops() {
        let (mut a, mut b) = connected_pair(EngineConfig::default());
        a.start_screen_share().unwrap();
        assert_eq!(
            a.set_document_backdrop("https://files.example/deck.pdf"),
            Err(BackdropError::ScreenShareActive)
        );
        b.pump();
        assert_eq!(b.backdrop().kind(), BackdropKind::ScreenShare);
        assert_eq!(
            b.set_image_backdrop("https://files.example/a.png"),
            Err(BackdropError::ScreenShareActive)
        );

        a.stop_screen_share().unwrap();
        b.pump();
        assert_eq!(b.backdrop().kind(), BackdropKind::None);
        b.set_image_backdrop("https://files.example/a.png").unwrap();
    }

    #[test]
    fn test_measured_layout_reaches_peer() {
        let (mut a, mut b) = connected_pair(EngineConfig::default());
        a.set_image_backdrop("https://files.example/board.png").unwrap();
        let layout = a.backdrop_measured(Size::new(800.0, 600.0), Vec::new()).unwrap();
        assert_eq!(layout.kind, BackdropKind::Image);

        b.pump();
        assert_eq!(b.canvas_extent(), Some(Size::new(800.0, 600.0)));
        assert!(b.take_events().contains(&EngineEvent::BackdropDimensionsChanged(layout)));
    }

    #[test]
    fn test_screen_share_dimensions_need_active_share() {
        let (mut a, _b) = connected_pair(EngineConfig::default());
        assert_eq!(
            a.screen_share_dimensions(Size::new(1280.0, 720.0)),
            Err(BackdropError::NothingActive)
        );
        a.start_screen_share().unwrap();
        assert!(a.screen_share_dimensions(Size::new(1280.0, 720.0)).is_ok());
        assert_eq!(a.canvas_extent(), Some(Size::new(1280.0, 720.0)));
    }

    #[test]
    fn test_document_pages_sync() {
        let (mut a, mut b) = connected_pair(EngineConfig::default());
        assert!(!a.go_to_page(2));
        a.set_document_backdrop("https://files.example/deck.pdf").unwrap();
        b.pump();

        draw_stroke(&mut a, &[(0.0, 0.0), (1.0, 1.0)]);
        assert!(a.go_to_page(2));
        assert!(a.strokes().is_empty());
        draw_stroke(&mut a, &[(7.0, 7.0), (8.0, 8.0)]);
        assert!(a.go_to_page(1));
        assert_eq!(a.strokes().len(), 1);

        b.pump();
        assert_eq!(b.current_page(), 1);
        assert_eq!(b.strokes().len(), 1);
        assert!(b.go_to_page(2));
        assert_eq!(b.strokes().len(), 1);
        assert_eq!(b.strokes()[0].points[0], 7.0);
    }

    #[test]
    fn test_late_peer_receives_existing_drawing() {
        let (ta, tb) = MemoryTransport::pair("alice", "bob");
        let mut a = SyncEngine::new(EngineConfig::default(), Participant::new("alice", "Alice", "#e91e63"), ta);
        let mut b = SyncEngine::new(EngineConfig::default(), Participant::new("bob", "Bob", "#2196f3"), tb);

        draw_stroke(&mut a, &[(0.0, 0.0), (2.0, 2.0)]);
        assert_eq!(a.remote_peer(), None);

        a.pump();
        assert_eq!(a.remote_peer(), Some("bob"));
        b.pump();
        assert_eq!(b.snapshot(), a.snapshot());
        assert_eq!(a.transport().pending(), 0);
    }

    #[test]
    fn test_disconnect_drops_cursor() {
        let (mut a, mut b) = connected_pair(EngineConfig::default());
        a.pointer_move(Point::new(9.0, 9.0));
        b.pump();
        assert_eq!(b.cursors().len(), 1);

        a.transport().disconnect();
        b.pump();
        assert!(b.cursors().is_empty());
        assert_eq!(b.remote_peer(), None);

        draw_stroke(&mut b, &[(0.0, 0.0), (1.0, 1.0)]);
        assert_eq!(b.strokes().len(), 1);
    }

    #[test]
    fn test_bad_input_is_ignored() {
        let (_a, mut b) = connected_pair(EngineConfig::default());
        b.receive("not json");
        b.receive(r##"{"action":"laser","authorId":"alice","authorName":"Alice","color":"#000"}"##);
        b.receive(r##"{"action":"draw","authorId":"alice","authorName":"Alice","color":"#000","entity":{"id":"x"}}"##);
        b.handle_event(TransportEvent::Message {
            from: "alice".into(),
            channel: "chat".into(),
            data: "{}".into(),
        });
        assert!(b.snapshot().is_empty());
        assert!(b.take_events().is_empty());
    }

    #[test]
    fn test_own_echo_is_ignored() {
        let (mut a, _b) = connected_pair(EngineConfig::default());
        let stroke = Stroke::begin("alice-1-abc".into(), Point::new(0.0, 0.0), "#000", 2.0);
        let echo = Message::new(a.local(), BackdropKind::None, None, Payload::Draw { entity: stroke.into() });
        a.apply(echo);
        assert!(a.strokes().is_empty());
    }
}
