//! Room session: one participant's view of a drawing room.
//!
//! DESIGN
//! ======
//! The session is a synchronous state machine in the sans-IO style. Callers
//! feed it signaling events and clock ticks; it drives its [`Signaling`]
//! client, keeps the action log, and queues [`Notice`]s for the drawing
//! surface and feedback collaborators. No call blocks or awaits a peer.
//!
//! LINKS
//! =====
//! Every connection the session knows about is a link keyed by
//! [`ConnectionId`]. The [`ConnectionRegistry`] holds the newest open link per
//! identity as its broadcast target.
//!
//! A duplicate in the same direction is a reconnect: the older link is closed.
//! Crossed dials (one inbound, one outbound) both stay open and readable, since
//! each end picks its target on its own. When the target closes while another
//! open link to the same identity remains, the target falls back to it and the
//! peer is not reported as left.
//!
//! SYNC
//! ====
//! A non-host asks every newly opened link for the full log and remembers the
//! request id on the link. Only a `Done` whose `parent_id` matches that id is
//! adopted, once; any other full-state reply is dropped.
//!
//! TIMER
//! =====
//! The only deadline is the host election timeout. The owner of the session
//! sleeps until [`RoomSession::poll_timeout`] and then calls
//! [`RoomSession::handle_timeout`].

use std::collections::{HashMap, VecDeque};

use frames::Frame;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::action::{DrawingAction, Feedback};
use crate::action_log::{ActionLog, LogChange};
use crate::config::SessionConfig;
use crate::election::{ElectionCommand, ElectionEvent, HostElection, Role};
use crate::protocol::{self, PeerMessage};
use crate::registry::ConnectionRegistry;
use crate::room::{PeerIdentity, RoomCode, host_identity};
use crate::signaling::{ConnectionId, SignalEvent, Signaling, SignalingError};

/// Where an applied action came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote(PeerIdentity),
}

/// Something the drawing surface or feedback collaborator should react to.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    RoleSettled(Role),
    PeerJoined(PeerIdentity),
    PeerLeft(PeerIdentity),
    /// An action reshaped the log. `feedback` is the cue to play, if any.
    Applied { action: DrawingAction, origin: Origin, feedback: Option<Feedback> },
    /// The log was adopted wholesale from a peer.
    Replaced { len: usize },
    /// Non-fatal signaling problem for a transient notification.
    SignalingError(String),
}

impl Notice {
    #[must_use]
    pub fn feedback(&self) -> Option<Feedback> {
        match self {
            Self::PeerJoined(_) => Some(Feedback::Join),
            Self::Applied { feedback, .. } => *feedback,
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Link {
    remote: PeerIdentity,
    inbound: bool,
    open: bool,
    /// Id of the sync request sent on this link and not yet answered.
    awaiting_sync: Option<String>,
}

impl Link {
    fn new(remote: PeerIdentity, inbound: bool) -> Self {
        Self { remote, inbound, open: false, awaiting_sync: None }
    }
}

pub struct RoomSession<S: Signaling> {
    room: RoomCode,
    config: SessionConfig,
    signaling: S,
    election: HostElection,
    registry: ConnectionRegistry,
    log: ActionLog,
    links: HashMap<ConnectionId, Link>,
    /// Outbound link to the host identity while the election waits on it.
    host_link: Option<ConnectionId>,
    deadline: Option<Instant>,
    notices: VecDeque<Notice>,
    closed: bool,
}

impl<S: Signaling> RoomSession<S> {
    #[must_use]
    pub fn new(room: RoomCode, config: SessionConfig, signaling: S) -> Self {
        Self {
            election: HostElection::new(host_identity(&room)),
            room,
            config,
            signaling,
            registry: ConnectionRegistry::new(),
            log: ActionLog::new(),
            links: HashMap::new(),
            host_link: None,
            deadline: None,
            notices: VecDeque::new(),
            closed: false,
        }
    }

    /// Begin the host election.
    pub fn start(&mut self, now: Instant) {
        info!(room = %self.room, "session: joining room");
        let commands = self.election.start();
        self.execute(commands, now);
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn room(&self) -> &RoomCode {
        &self.room
    }

    /// Settled role, or `None` while the election runs.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.election.role()
    }

    /// Connected peers in join order.
    #[must_use]
    pub fn peers(&self) -> Vec<PeerIdentity> {
        self.registry.list()
    }

    #[must_use]
    pub fn actions(&self) -> &[DrawingAction] {
        self.log.actions()
    }

    #[must_use]
    pub fn identity(&self) -> Option<&PeerIdentity> {
        self.election.identity()
    }

    #[must_use]
    pub fn election(&self) -> &HostElection {
        &self.election
    }

    #[must_use]
    pub fn signaling(&self) -> &S {
        &self.signaling
    }

    pub fn signaling_mut(&mut self) -> &mut S {
        &mut self.signaling
    }

    /// When [`handle_timeout`](Self::handle_timeout) should next be called.
    #[must_use]
    pub fn poll_timeout(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn next_notice(&mut self) -> Option<Notice> {
        self.notices.pop_front()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // =========================================================================
    // LOCAL OPERATIONS
    // =========================================================================

    /// Apply `action` locally, then broadcast it. Never waits on peers.
    /// Returns how many peers accepted the send.
    pub fn submit_action(&mut self, action: DrawingAction) -> usize {
        if self.closed {
            debug!(kind = action.kind(), "session: closed; dropping local action");
            return 0;
        }
        let change = self.log.apply(action.clone());
        if change == LogChange::Undone(None) {
            debug!("session: nothing to undo");
            return 0;
        }
        let frame = self.stamp(protocol::action(&action));
        self.push_applied(action, Origin::Local);
        self.registry.broadcast(&mut self.signaling, &frames::encode_frame(&frame))
    }

    pub fn clear(&mut self) -> usize {
        self.submit_action(DrawingAction::Clear)
    }

    pub fn undo_last(&mut self) -> usize {
        self.submit_action(DrawingAction::Undo)
    }

    /// Leave the room. Every link is dropped and later events are ignored.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        info!(room = %self.room, peers = self.registry.len(), "session: leaving room");
        self.signaling.destroy();
        self.drop_links();
        self.deadline = None;
        self.closed = true;
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    /// Fire the election deadline if it has passed.
    pub fn handle_timeout(&mut self, now: Instant) {
        if self.closed || self.deadline.is_none_or(|deadline| now < deadline) {
            return;
        }
        self.deadline = None;
        let inbound_links = self.links.values().filter(|link| link.inbound && link.open).count();
        self.step(ElectionEvent::Timeout { inbound_links }, now);
    }

    pub fn handle_signal(&mut self, event: SignalEvent, now: Instant) {
        if self.closed {
            debug!(?event, "session: closed; ignoring signal");
            return;
        }
        match event {
            SignalEvent::Opened { identity } => self.step(ElectionEvent::Opened(identity), now),
            SignalEvent::Error(error) => self.step(ElectionEvent::SignalingFailed(error), now),
            SignalEvent::Incoming { conn, remote } => {
                self.links.insert(conn, Link::new(remote, true));
                self.link_opened(conn);
            }
            SignalEvent::ConnectionOpened { conn } => {
                if !self.links.contains_key(&conn) {
                    debug!(%conn, "session: open for unknown connection");
                    return;
                }
                self.link_opened(conn);
                if self.host_link == Some(conn) {
                    self.host_link = None;
                    self.step(ElectionEvent::HostLinkOpened, now);
                }
            }
            SignalEvent::ConnectionError { conn, error } => self.link_failed(conn, error, now),
            SignalEvent::ConnectionClosed { conn } => self.link_failed(conn, SignalingError::Disconnected, now),
            SignalEvent::Data { conn, bytes } => self.on_data(conn, &bytes),
        }
    }

    fn step(&mut self, event: ElectionEvent, now: Instant) {
        let commands = self.election.step(event);
        self.execute(commands, now);
    }

    fn execute(&mut self, commands: Vec<ElectionCommand>, now: Instant) {
        for command in commands {
            match command {
                ElectionCommand::Open(identity) => self.signaling.open(&identity),
                ElectionCommand::Connect(remote) => {
                    let conn = self.signaling.connect(&remote);
                    self.links.insert(conn, Link::new(remote, false));
                    self.host_link = Some(conn);
                }
                ElectionCommand::ArmTimer => self.deadline = Some(now + self.config.election_timeout),
                ElectionCommand::CancelTimer => self.deadline = None,
                ElectionCommand::Destroy => {
                    self.signaling.destroy();
                    self.drop_links();
                }
                ElectionCommand::Settled(role) => {
                    info!(room = %self.room, ?role, identity = ?self.election.identity(), "session: role settled");
                    self.notices.push_back(Notice::RoleSettled(role));
                }
                ElectionCommand::Notify(error) => self.notices.push_back(Notice::SignalingError(error.to_string())),
            }
        }
    }

    // =========================================================================
    // LINKS
    // =========================================================================

    fn link_opened(&mut self, conn: ConnectionId) {
        let Some(link) = self.links.get_mut(&conn) else {
            return;
        };
        link.open = true;
        let remote = link.remote.clone();
        let inbound = link.inbound;

        match self.registry.add(remote.clone(), conn) {
            Some(previous) => self.supersede(previous, conn, inbound),
            None => {
                let host = remote.is_host_identity();
                info!(%remote, %conn, inbound, host, peers = self.registry.len(), "session: peer joined");
                self.notices.push_back(Notice::PeerJoined(remote));
            }
        }

        if self.role() != Some(Role::Host) {
            let request = protocol::request_full_state();
            if let Some(link) = self.links.get_mut(&conn) {
                link.awaiting_sync = Some(request.id.clone());
            }
            self.send(conn, request);
        }
    }

    /// `conn` replaced `previous` as the broadcast target for one identity.
    fn supersede(&mut self, previous: ConnectionId, conn: ConnectionId, inbound: bool) {
        let reconnect = self.links.get(&previous).is_some_and(|old| old.inbound == inbound);
        if reconnect {
            debug!(%previous, %conn, "session: closing link replaced by reconnect");
            self.links.remove(&previous);
            self.signaling.close(previous);
        } else {
            debug!(%previous, %conn, "session: crossed link stays readable");
        }
    }

    fn link_failed(&mut self, conn: ConnectionId, error: SignalingError, now: Instant) {
        let Some(link) = self.links.remove(&conn) else {
            debug!(%conn, %error, "session: event for unknown connection");
            return;
        };

        let target = self.registry.connection(&link.remote) == Some(conn);
        let fallback = self
            .links
            .iter()
            .filter(|(_, other)| other.open && other.remote == link.remote)
            .map(|(id, _)| *id)
            .max();

        match (target, fallback) {
            (true, Some(fallback)) => {
                self.registry.retarget(conn, fallback);
                debug!(remote = %link.remote, %conn, %fallback, "session: target fell back to remaining link");
            }
            (true, None) => {
                self.registry.remove(&link.remote);
                info!(remote = %link.remote, %conn, peers = self.registry.len(), "session: peer left");
                self.notices.push_back(Notice::PeerLeft(link.remote.clone()));
            }
            (false, _) if link.open => debug!(remote = %link.remote, %conn, "session: superseded link closed"),
            (false, _) => debug!(remote = %link.remote, %conn, %error, "session: connect failed"),
        }

        if self.host_link == Some(conn) {
            self.host_link = None;
            self.step(ElectionEvent::HostLinkFailed(error), now);
        }
    }

    /// Forget every link. Identities in the registry are reported as left.
    fn drop_links(&mut self) {
        for peer in self.registry.drain() {
            self.notices.push_back(Notice::PeerLeft(peer));
        }
        self.links.clear();
        self.host_link = None;
    }

    // =========================================================================
    // REPLICATION
    // =========================================================================

    fn on_data(&mut self, conn: ConnectionId, bytes: &[u8]) {
        let Some(remote) = self.links.get(&conn).filter(|link| link.open).map(|link| link.remote.clone()) else {
            debug!(%conn, "session: data on unknown connection");
            return;
        };

        let inbound = match protocol::decode(bytes) {
            Ok(inbound) => inbound,
            Err(error) => {
                warn!(%remote, %conn, %error, "session: dropping malformed message");
                return;
            }
        };
        if let Some(room) = inbound.frame.room.as_deref() {
            if room != self.room.as_str() {
                warn!(%remote, %room, expected = %self.room, "session: message for another room");
                return;
            }
        }

        match inbound.message {
            None => debug!(
                %remote,
                namespace = inbound.frame.prefix(),
                syscall = %inbound.frame.syscall,
                "session: ignoring unknown syscall"
            ),
            Some(PeerMessage::RequestFullState) => {
                let reply = protocol::full_state(&inbound.frame, self.log.actions());
                self.send(conn, reply);
                let others: Vec<PeerIdentity> = self.registry.list().into_iter().filter(|peer| *peer != remote).collect();
                if !others.is_empty() {
                    self.send(conn, protocol::roster(&others));
                }
                debug!(%remote, actions = self.log.len(), others = others.len(), "session: answered sync");
            }
            Some(PeerMessage::FullState { actions }) => {
                let awaited = self.links.get(&conn).and_then(|link| link.awaiting_sync.as_ref());
                let solicited =
                    self.role() != Some(Role::Host) && awaited.is_some() && awaited == inbound.frame.parent_id.as_ref();
                if !solicited {
                    debug!(%remote, %conn, parent = ?inbound.frame.parent_id, "session: dropping unsolicited full state");
                    return;
                }
                if let Some(link) = self.links.get_mut(&conn) {
                    link.awaiting_sync = None;
                }
                let len = actions.len();
                self.log.replace(actions);
                info!(%remote, len, "session: adopted full state");
                self.notices.push_back(Notice::Replaced { len });
            }
            Some(PeerMessage::Action { action }) => {
                self.log.apply(action.clone());
                self.push_applied(action, Origin::Remote(remote));
            }
            Some(PeerMessage::Roster { peers }) => self.connect_missing(&peers),
        }
    }

    /// Dial every listed identity we have no link to yet.
    fn connect_missing(&mut self, peers: &[PeerIdentity]) {
        for peer in peers {
            let own = self.identity() == Some(peer);
            let known = self.links.values().any(|link| &link.remote == peer);
            if own || known {
                continue;
            }
            debug!(%peer, "session: dialing roster peer");
            let conn = self.signaling.connect(peer);
            self.links.insert(conn, Link::new(peer.clone(), false));
        }
    }

    fn push_applied(&mut self, action: DrawingAction, origin: Origin) {
        debug!(kind = action.kind(), ?origin, len = self.log.len(), "session: applied action");
        let feedback = action.feedback();
        self.notices.push_back(Notice::Applied { action, origin, feedback });
    }

    /// Tag an outbound frame with this room and our identity.
    fn stamp(&self, frame: Frame) -> Frame {
        let frame = frame.with_room(self.room.as_str());
        match self.identity() {
            Some(identity) => frame.with_from(identity.as_str()),
            None => frame,
        }
    }

    fn send(&mut self, conn: ConnectionId, frame: Frame) {
        let bytes = frames::encode_frame(&self.stamp(frame));
        if let Err(error) = self.signaling.send(conn, bytes) {
            debug!(%conn, %error, "session: send skipped");
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
