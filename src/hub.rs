//! In-process signaling service.
//!
//! DESIGN
//! ======
//! `LocalHub` stands in for a real signaling broker when every participant
//! lives in one process: the demo binary and end-to-end tests. It keeps the
//! two guarantees the election depends on: identity registration is
//! first-come-first-served with a distinguishable `UnavailableId` error, and
//! messages on one connection arrive in send order.
//!
//! Each client gets an unbounded event channel. Every connection has two
//! ends, one per participant, each with its own [`ConnectionId`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::room::PeerIdentity;
use crate::signaling::{ConnectionId, SignalEvent, Signaling, SignalingError};

type ClientId = u64;

struct Client {
    tx: mpsc::UnboundedSender<SignalEvent>,
    identity: Option<PeerIdentity>,
}

struct End {
    owner: ClientId,
    remote_end: ConnectionId,
}

#[derive(Default)]
struct HubState {
    next_client: ClientId,
    next_conn: u64,
    clients: HashMap<ClientId, Client>,
    registrations: HashMap<PeerIdentity, ClientId>,
    ends: HashMap<ConnectionId, End>,
}

impl HubState {
    fn alloc_conn(&mut self) -> ConnectionId {
        self.next_conn += 1;
        ConnectionId(self.next_conn)
    }

    /// Deliver to a client. A dropped receiver means the client is gone.
    fn deliver(&self, client: ClientId, event: SignalEvent) -> bool {
        self.clients.get(&client).is_some_and(|c| c.tx.send(event).is_ok())
    }

    /// Tear down both ends of `conn`, telling the other side.
    fn hang_up(&mut self, conn: ConnectionId) {
        let Some(end) = self.ends.remove(&conn) else {
            return;
        };
        if let Some(remote) = self.ends.remove(&end.remote_end) {
            self.deliver(remote.owner, SignalEvent::ConnectionClosed { conn: end.remote_end });
        }
    }

    fn unregister(&mut self, client: ClientId) {
        let owned: Vec<ConnectionId> =
            self.ends.iter().filter(|(_, end)| end.owner == client).map(|(conn, _)| *conn).collect();
        for conn in owned {
            self.hang_up(conn);
        }
        if let Some(identity) = self.clients.get_mut(&client).and_then(|c| c.identity.take()) {
            self.registrations.remove(&identity);
            debug!(%identity, "hub: identity released");
        }
    }
}

/// Shared handle to one in-process signaling service.
#[derive(Clone, Default)]
pub struct LocalHub {
    state: Arc<Mutex<HubState>>,
}

impl LocalHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach a new client. Its events arrive on the returned receiver.
    #[must_use]
    pub fn client(&self) -> (LocalSignaling, mpsc::UnboundedReceiver<SignalEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        state.next_client += 1;
        let id = state.next_client;
        state.clients.insert(id, Client { tx, identity: None });
        (LocalSignaling { hub: self.clone(), client: id }, rx)
    }

    /// Identities currently registered, sorted.
    #[must_use]
    pub fn registered(&self) -> Vec<PeerIdentity> {
        let mut identities: Vec<PeerIdentity> = self.lock().registrations.keys().cloned().collect();
        identities.sort();
        identities
    }
}

/// One participant's view of a [`LocalHub`].
pub struct LocalSignaling {
    hub: LocalHub,
    client: ClientId,
}

impl LocalSignaling {
    fn identity(&self) -> Option<PeerIdentity> {
        self.hub.lock().clients.get(&self.client).and_then(|c| c.identity.clone())
    }
}

impl Signaling for LocalSignaling {
    fn open(&mut self, identity: &PeerIdentity) {
        let mut state = self.hub.lock();
        let taken = state.registrations.get(identity).is_some_and(|holder| *holder != self.client);
        let event = if taken {
            debug!(%identity, "hub: identity already registered");
            SignalEvent::Error(SignalingError::UnavailableId(identity.clone()))
        } else {
            let previous = state.clients.get_mut(&self.client).and_then(|c| c.identity.replace(identity.clone()));
            if let Some(previous) = previous.filter(|previous| previous != identity) {
                state.registrations.remove(&previous);
            }
            state.registrations.insert(identity.clone(), self.client);
            info!(%identity, "hub: identity registered");
            SignalEvent::Opened { identity: identity.clone() }
        };
        state.deliver(self.client, event);
    }

    fn connect(&mut self, remote: &PeerIdentity) -> ConnectionId {
        let local_identity = self.identity();
        let mut state = self.hub.lock();
        let conn = state.alloc_conn();

        let Some(local_identity) = local_identity else {
            state.deliver(self.client, SignalEvent::ConnectionError { conn, error: SignalingError::Disconnected });
            return conn;
        };
        let Some(&acceptor) = state.registrations.get(remote) else {
            let error = SignalingError::PeerUnavailable(remote.clone());
            state.deliver(self.client, SignalEvent::ConnectionError { conn, error });
            return conn;
        };

        let accepted = state.alloc_conn();
        state.ends.insert(conn, End { owner: self.client, remote_end: accepted });
        state.ends.insert(accepted, End { owner: acceptor, remote_end: conn });
        debug!(from = %local_identity, to = %remote, %conn, %accepted, "hub: connection opened");

        state.deliver(acceptor, SignalEvent::Incoming { conn: accepted, remote: local_identity });
        state.deliver(self.client, SignalEvent::ConnectionOpened { conn });
        conn
    }

    fn send(&mut self, conn: ConnectionId, bytes: Vec<u8>) -> Result<(), SignalingError> {
        let state = self.hub.lock();
        let Some(end) = state.ends.get(&conn).filter(|end| end.owner == self.client) else {
            return Err(SignalingError::Disconnected);
        };
        let Some(remote) = state.ends.get(&end.remote_end) else {
            return Err(SignalingError::Disconnected);
        };
        if state.deliver(remote.owner, SignalEvent::Data { conn: end.remote_end, bytes }) {
            Ok(())
        } else {
            Err(SignalingError::Disconnected)
        }
    }

    fn close(&mut self, conn: ConnectionId) {
        let mut state = self.hub.lock();
        if state.ends.get(&conn).is_some_and(|end| end.owner == self.client) {
            state.hang_up(conn);
        }
    }

    fn destroy(&mut self) {
        self.hub.lock().unregister(self.client);
    }
}

impl Drop for LocalSignaling {
    fn drop(&mut self) {
        let mut state = self.hub.lock();
        state.unregister(self.client);
        state.clients.remove(&self.client);
    }
}

#[cfg(test)]
#[path = "hub_test.rs"]
mod tests;
