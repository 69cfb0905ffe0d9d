//! Room addressing: room codes, peer identities, and the reserved host identity.
//!
//! DESIGN
//! ======
//! Participants never talk before election, so they must agree on which
//! signaling identity means "the host of this room" from the room code alone.
//! `host_identity` is that agreement: a pure string transform every
//! participant computes locally.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of characters in a room code.
pub const ROOM_CODE_LEN: usize = 6;

/// Prefix of the identity reserved for the host of a room.
pub const HOST_PREFIX: &str = "host-";

/// Prefix of ordinary per-session identities.
pub const USER_PREFIX: &str = "user-";

const USER_SUFFIX_LEN: usize = 7;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("invalid room code {0:?}: expected {ROOM_CODE_LEN} ASCII letters or digits")]
    InvalidCode(String),
}

// =============================================================================
// ROOM CODE
// =============================================================================

/// Case-insensitive room code, normalized to uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Parse a user-supplied room code.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::InvalidCode`] unless the trimmed input is exactly
    /// six ASCII alphanumerics.
    pub fn parse(raw: &str) -> Result<Self, RoomError> {
        let trimmed = raw.trim();
        let valid = trimmed.len() == ROOM_CODE_LEN && trimmed.chars().all(|c| c.is_ascii_alphanumeric());
        if !valid {
            return Err(RoomError::InvalidCode(raw.to_owned()));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = RoomError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

// =============================================================================
// PEER IDENTITY
// =============================================================================

/// Signaling endpoint name of one participant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerIdentity(String);

impl PeerIdentity {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Fresh per-session identity: `user-` followed by seven base-36 characters.
    #[must_use]
    pub fn random() -> Self {
        let mut rng = rand::rng();
        let suffix: String = (0..USER_SUFFIX_LEN)
            .map(|_| char::from(BASE36[rng.random_range(0..BASE36.len())]))
            .collect();
        Self(format!("{USER_PREFIX}{suffix}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is some room's reserved host identity.
    #[must_use]
    pub fn is_host_identity(&self) -> bool {
        self.0.starts_with(HOST_PREFIX)
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The identity reserved for whoever hosts `room`.
#[must_use]
pub fn host_identity(room: &RoomCode) -> PeerIdentity {
    PeerIdentity(format!("{HOST_PREFIX}{}", room.as_str()))
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
