//! Connection registry: the live set of peers, independent of role.
//!
//! Holds one broadcast target per remote identity, in join order. A second
//! connection from the same identity replaces the first; the superseded link
//! is not closed here, the session decides what to do with it.

use tracing::debug;

use crate::room::PeerIdentity;
use crate::signaling::{ConnectionId, Signaling};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    peer: PeerIdentity,
    conn: ConnectionId,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: Vec<Entry>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an open connection. Returns the connection it replaced, if
    /// the identity was already present.
    pub fn add(&mut self, peer: PeerIdentity, conn: ConnectionId) -> Option<ConnectionId> {
        let replaced = self
            .entries
            .iter()
            .position(|e| e.peer == peer)
            .map(|idx| self.entries.remove(idx).conn);
        self.entries.push(Entry { peer, conn });
        replaced
    }

    /// Remove a peer by identity.
    pub fn remove(&mut self, peer: &PeerIdentity) -> Option<ConnectionId> {
        let idx = self.entries.iter().position(|e| &e.peer == peer)?;
        Some(self.entries.remove(idx).conn)
    }

    /// Move the entry targeting `from` over to `to`, keeping its join
    /// position. A superseded `from` matches nothing.
    pub fn retarget(&mut self, from: ConnectionId, to: ConnectionId) -> Option<PeerIdentity> {
        let entry = self.entries.iter_mut().find(|e| e.conn == from)?;
        entry.conn = to;
        Some(entry.peer.clone())
    }

    /// Connected identities in join order.
    #[must_use]
    pub fn list(&self) -> Vec<PeerIdentity> {
        self.entries.iter().map(|e| e.peer.clone()).collect()
    }

    #[must_use]
    pub fn connection(&self, peer: &PeerIdentity) -> Option<ConnectionId> {
        self.entries.iter().find(|e| &e.peer == peer).map(|e| e.conn)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry, returning the identities that were present.
    pub fn drain(&mut self) -> Vec<PeerIdentity> {
        self.entries.drain(..).map(|e| e.peer).collect()
    }

    /// Send `bytes` to every registered connection. Connections that refuse
    /// the send are skipped. Returns how many accepted it.
    pub fn broadcast<S: Signaling + ?Sized>(&self, signaling: &mut S, bytes: &[u8]) -> usize {
        let mut delivered = 0;
        for entry in &self.entries {
            match signaling.send(entry.conn, bytes.to_vec()) {
                Ok(()) => delivered += 1,
                Err(error) => debug!(peer = %entry.peer, conn = %entry.conn, %error, "registry: skipped closed connection"),
            }
        }
        delivered
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
