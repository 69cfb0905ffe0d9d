//! Host election: decides whether a joining participant hosts the room.
//!
//! DESIGN
//! ======
//! There is no arbiter. The signaling service's first-come-first-served
//! identity registration is the only uniqueness primitive: whoever registers
//! `host-<ROOM>` is host. A participant first registers a random identity and
//! dials the host identity. If the dial fails, or nobody answers within the
//! election timeout, it drops its identity and tries to claim the host
//! identity itself. Losing that claim means a host appeared in the meantime,
//! so it re-registers under a fresh random identity and dials again.
//!
//! The machine is pure: it consumes [`ElectionEvent`]s and returns
//! [`ElectionCommand`]s. The session executes the commands against its
//! signaling client and owns the wall-clock deadline.
//!
//! ```text
//! Idle ─▶ SelfRegistering ─▶ JoiningAsPeer ─(ack / inbound at timeout)─▶ Peer
//!              ▲                   │ dial error / timeout
//!              │ identity taken    ▼
//!              └────────────── Recovering ─(host id registered)─▶ Host
//! ```
//!
//! `Host` and an acknowledged `JoiningAsPeer` are terminal for the session.

use tracing::{debug, info, warn};

use crate::room::PeerIdentity;
use crate::signaling::SignalingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Peer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElectionState {
    Idle,
    SelfRegistering { identity: PeerIdentity },
    /// `acknowledged` flips once the host link opens (or inbound links exist
    /// at timeout); from then on the state is terminal.
    JoiningAsPeer { identity: PeerIdentity, acknowledged: bool },
    /// Registering (or waiting to retry registering) the host identity.
    Recovering,
    Host,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElectionEvent {
    Start,
    /// Registration under this identity succeeded.
    Opened(PeerIdentity),
    /// Registration failure or service-level transport error.
    SignalingFailed(SignalingError),
    /// The outbound link to the host identity opened.
    HostLinkOpened,
    HostLinkFailed(SignalingError),
    /// The election deadline passed. `inbound_links` counts connections that
    /// other participants opened to us meanwhile.
    Timeout { inbound_links: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElectionCommand {
    Open(PeerIdentity),
    Connect(PeerIdentity),
    ArmTimer,
    CancelTimer,
    /// Drop the current registration and all its connections.
    Destroy,
    Settled(Role),
    /// Surface a non-fatal signaling problem to the user.
    Notify(SignalingError),
}

pub struct HostElection {
    host: PeerIdentity,
    state: ElectionState,
    /// Host-identity claims lost to another participant.
    collisions: u32,
}

impl HostElection {
    #[must_use]
    pub fn new(host: PeerIdentity) -> Self {
        Self { host, state: ElectionState::Idle, collisions: 0 }
    }

    #[must_use]
    pub fn state(&self) -> &ElectionState {
        &self.state
    }

    #[must_use]
    pub fn collisions(&self) -> u32 {
        self.collisions
    }

    /// Role once settled; `None` while the election is still running.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        match self.state {
            ElectionState::Host => Some(Role::Host),
            ElectionState::JoiningAsPeer { acknowledged: true, .. } => Some(Role::Peer),
            _ => None,
        }
    }

    /// The identity this participant is registering or registered under.
    #[must_use]
    pub fn identity(&self) -> Option<&PeerIdentity> {
        match &self.state {
            ElectionState::SelfRegistering { identity } | ElectionState::JoiningAsPeer { identity, .. } => {
                Some(identity)
            }
            ElectionState::Recovering | ElectionState::Host => Some(&self.host),
            ElectionState::Idle => None,
        }
    }

    /// Start with a freshly generated identity.
    pub fn start(&mut self) -> Vec<ElectionCommand> {
        self.step_with(ElectionEvent::Start, PeerIdentity::random)
    }

    pub fn step(&mut self, event: ElectionEvent) -> Vec<ElectionCommand> {
        self.step_with(event, PeerIdentity::random)
    }

    /// Advance the machine. `fresh` supplies new random identities so tests
    /// can pin them.
    pub fn step_with(&mut self, event: ElectionEvent, fresh: impl FnOnce() -> PeerIdentity) -> Vec<ElectionCommand> {
        use ElectionCommand as C;
        use ElectionEvent as E;

        let state = std::mem::replace(&mut self.state, ElectionState::Idle);
        let (next, commands) = match (state, event) {
            (ElectionState::Idle, E::Start) => {
                let identity = fresh();
                debug!(%identity, "election: registering self identity");
                (ElectionState::SelfRegistering { identity: identity.clone() }, vec![C::Open(identity)])
            }

            // PHASE: SELF REGISTRATION
            (ElectionState::SelfRegistering { identity }, E::Opened(opened)) if opened == identity => {
                if identity == self.host {
                    info!(%identity, "election: own identity is the host identity");
                    (ElectionState::Host, vec![C::Settled(Role::Host)])
                } else {
                    debug!(%identity, host = %self.host, "election: dialing host");
                    (
                        ElectionState::JoiningAsPeer { identity, acknowledged: false },
                        vec![C::Connect(self.host.clone()), C::ArmTimer],
                    )
                }
            }
            (ElectionState::SelfRegistering { identity }, E::SignalingFailed(error)) => {
                warn!(%identity, %error, "election: self registration failed; claiming host");
                (ElectionState::Recovering, vec![C::Notify(error), C::Destroy, C::Open(self.host.clone())])
            }

            // PHASE: WAITING FOR THE HOST
            (ElectionState::JoiningAsPeer { identity, acknowledged: false }, E::HostLinkOpened) => {
                info!(%identity, host = %self.host, "election: joined as peer");
                (
                    ElectionState::JoiningAsPeer { identity, acknowledged: true },
                    vec![C::CancelTimer, C::Settled(Role::Peer)],
                )
            }
            (ElectionState::JoiningAsPeer { identity, acknowledged: false }, E::HostLinkFailed(error)) => {
                info!(%identity, %error, "election: host unreachable; claiming host");
                (ElectionState::Recovering, vec![C::CancelTimer, C::Destroy, C::Open(self.host.clone())])
            }
            (ElectionState::JoiningAsPeer { identity, acknowledged: false }, E::Timeout { inbound_links }) => {
                if inbound_links > 0 {
                    info!(%identity, inbound_links, "election: no host answer but peers connected; staying peer");
                    (ElectionState::JoiningAsPeer { identity, acknowledged: true }, vec![C::Settled(Role::Peer)])
                } else {
                    info!(%identity, "election: host did not answer in time; claiming host");
                    (ElectionState::Recovering, vec![C::Destroy, C::Open(self.host.clone())])
                }
            }

            // PHASE: CLAIMING THE HOST IDENTITY
            (ElectionState::Recovering, E::Opened(opened)) if opened == self.host => {
                info!(host = %self.host, collisions = self.collisions, "election: became host");
                (ElectionState::Host, vec![C::Settled(Role::Host)])
            }
            (ElectionState::Recovering, E::SignalingFailed(SignalingError::UnavailableId(_))) => {
                self.collisions += 1;
                let identity = fresh();
                info!(%identity, collisions = self.collisions, "election: host identity taken; rejoining as peer");
                (
                    ElectionState::SelfRegistering { identity: identity.clone() },
                    vec![C::Destroy, C::Open(identity)],
                )
            }
            (ElectionState::Recovering, E::SignalingFailed(error)) => {
                warn!(%error, "election: host claim failed; retrying after timeout");
                (ElectionState::Recovering, vec![C::Notify(error), C::ArmTimer])
            }
            (ElectionState::Recovering, E::Timeout { .. }) => {
                (ElectionState::Recovering, vec![C::Destroy, C::Open(self.host.clone())])
            }

            // PHASE: SETTLED
            (settled @ (ElectionState::Host | ElectionState::JoiningAsPeer { .. }), E::SignalingFailed(error)) => {
                warn!(%error, "election: signaling error after election");
                (settled, vec![C::Notify(error)])
            }

            (state, event) => {
                debug!(?state, ?event, "election: ignoring event");
                (state, Vec::new())
            }
        };

        self.state = next;
        commands
    }
}

#[cfg(test)]
#[path = "election_test.rs"]
mod tests;
