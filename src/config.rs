//! Session configuration parsed from environment variables.

use std::time::Duration;

use crate::room::{RoomCode, RoomError};

pub const DEFAULT_ELECTION_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_PARTICIPANTS: usize = 3;
pub const DEFAULT_ROOM: &str = "DRAW01";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {key}: {source}")]
    Room {
        key: &'static str,
        #[source]
        source: RoomError,
    },
    #[error("{key} must be a positive integer, got {value:?}")]
    NotPositive { key: &'static str, value: String },
}

/// Knobs for one participant's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long a joining participant waits for the host before claiming it.
    pub election_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { election_timeout: Duration::from_millis(DEFAULT_ELECTION_TIMEOUT_MS) }
    }
}

impl SessionConfig {
    /// Build from the environment.
    ///
    /// Optional:
    /// - `DRAWMESH_ELECTION_TIMEOUT_MS`: default 3000
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotPositive`] for a zero or non-numeric timeout.
    pub fn from_env() -> Result<Self, ConfigError> {
        let timeout_ms = env_positive("DRAWMESH_ELECTION_TIMEOUT_MS", DEFAULT_ELECTION_TIMEOUT_MS)?;
        Ok(Self { election_timeout: Duration::from_millis(timeout_ms) })
    }
}

/// Settings for the in-process demo room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoConfig {
    pub room: RoomCode,
    pub participants: usize,
    pub session: SessionConfig,
}

impl DemoConfig {
    /// Build from the environment.
    ///
    /// Optional:
    /// - `DRAWMESH_ROOM`: six-character room code, default `DRAW01`
    /// - `DRAWMESH_PARTICIPANTS`: default 3
    /// - everything [`SessionConfig::from_env`] reads
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for an invalid room code or count.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_room = std::env::var("DRAWMESH_ROOM").unwrap_or_else(|_| DEFAULT_ROOM.to_owned());
        let room = RoomCode::parse(&raw_room).map_err(|source| ConfigError::Room { key: "DRAWMESH_ROOM", source })?;
        let participants = env_positive("DRAWMESH_PARTICIPANTS", DEFAULT_PARTICIPANTS)?;
        Ok(Self { room, participants, session: SessionConfig::from_env()? })
    }
}

fn env_positive<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let Ok(raw) = std::env::var(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Ok(value),
        _ => Err(ConfigError::NotPositive { key, value: raw }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
