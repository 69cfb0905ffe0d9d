//! Signaling capability: the external peer-discovery and handshake service.
//!
//! ARCHITECTURE
//! ============
//! The session never talks to a network directly. It issues non-blocking calls
//! on a [`Signaling`] implementation and later receives the outcomes as
//! [`SignalEvent`]s, in whatever order the service delivers them. Swapping the
//! implementation (in-process hub, WebRTC broker, test double) never touches
//! election or replication logic.

use std::fmt;

use crate::room::PeerIdentity;

/// Handle for one data connection, unique per signaling client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalingError {
    /// Registration refused because another participant holds the identity.
    #[error("identity {0} is already taken")]
    UnavailableId(PeerIdentity),
    /// Connect target is not registered with the service.
    #[error("peer {0} is not reachable")]
    PeerUnavailable(PeerIdentity),
    #[error("signaling transport error: {0}")]
    Network(String),
    /// The connection or registration is gone.
    #[error("disconnected")]
    Disconnected,
}

/// Outcome reported by the signaling service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalEvent {
    /// Registration under `identity` succeeded.
    Opened { identity: PeerIdentity },
    /// Registration or service-level failure.
    Error(SignalingError),
    /// A remote participant opened a connection to us. Already open.
    Incoming { conn: ConnectionId, remote: PeerIdentity },
    /// An outbound connection from [`Signaling::connect`] is open.
    ConnectionOpened { conn: ConnectionId },
    ConnectionError { conn: ConnectionId, error: SignalingError },
    ConnectionClosed { conn: ConnectionId },
    /// One message, delivered in send order per connection.
    Data { conn: ConnectionId, bytes: Vec<u8> },
}

/// Non-blocking signaling client. Every call returns immediately; results
/// arrive later as [`SignalEvent`]s.
pub trait Signaling {
    /// Register under `identity`. Answered by `Opened` or `Error`.
    fn open(&mut self, identity: &PeerIdentity);

    /// Start an outbound connection. Answered by `ConnectionOpened` or
    /// `ConnectionError` carrying the returned id.
    fn connect(&mut self, remote: &PeerIdentity) -> ConnectionId;

    /// Send one message on an open connection.
    ///
    /// # Errors
    ///
    /// Returns [`SignalingError::Disconnected`] if the connection is not open.
    fn send(&mut self, conn: ConnectionId, bytes: Vec<u8>) -> Result<(), SignalingError>;

    fn close(&mut self, conn: ConnectionId);

    /// Drop the registration and every connection under it. Closed
    /// connections are not reported back.
    fn destroy(&mut self);
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use std::collections::HashSet;

    use super::*;

    /// A call made on [`RecordingSignaling`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Open(PeerIdentity),
        Connect(PeerIdentity, ConnectionId),
        Send(ConnectionId, Vec<u8>),
        Close(ConnectionId),
        Destroy,
    }

    /// Signaling double that records every call and hands out sequential ids.
    #[derive(Debug, Default)]
    pub struct RecordingSignaling {
        pub calls: Vec<Call>,
        /// Sends to these connections fail with `Disconnected`.
        pub refused: HashSet<ConnectionId>,
        next_conn: u64,
    }

    impl RecordingSignaling {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Payloads sent on `conn`, in order.
        #[must_use]
        pub fn sent_to(&self, conn: ConnectionId) -> Vec<Vec<u8>> {
            self.calls
                .iter()
                .filter_map(|call| match call {
                    Call::Send(c, bytes) if *c == conn => Some(bytes.clone()),
                    _ => None,
                })
                .collect()
        }

        pub fn take_calls(&mut self) -> Vec<Call> {
            std::mem::take(&mut self.calls)
        }
    }

    impl Signaling for RecordingSignaling {
        fn open(&mut self, identity: &PeerIdentity) {
            self.calls.push(Call::Open(identity.clone()));
        }

        fn connect(&mut self, remote: &PeerIdentity) -> ConnectionId {
            self.next_conn += 1;
            let conn = ConnectionId(1000 + self.next_conn);
            self.calls.push(Call::Connect(remote.clone(), conn));
            conn
        }

        fn send(&mut self, conn: ConnectionId, bytes: Vec<u8>) -> Result<(), SignalingError> {
            if self.refused.contains(&conn) {
                return Err(SignalingError::Disconnected);
            }
            self.calls.push(Call::Send(conn, bytes));
            Ok(())
        }

        fn close(&mut self, conn: ConnectionId) {
            self.calls.push(Call::Close(conn));
        }

        fn destroy(&mut self) {
            self.calls.push(Call::Destroy);
        }
    }
}
