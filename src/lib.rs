//! drawmesh: peer-to-peer shared drawing rooms.
//!
//! DESIGN
//! ======
//! Participants in a room form a full mesh of data connections brokered by a
//! signaling service. One of them holds the reserved host identity and
//! answers state sync for newcomers; otherwise every participant is equal.
//! Each keeps its own [`action_log::ActionLog`] and replicates edits to every
//! peer it is connected to.
//!
//! LAYERS
//! ======
//! - `room`, `action`, `action_log`: plain data
//! - `election`, `registry`, `protocol`: pure state and wire mapping
//! - `session`: composes them over a [`signaling::Signaling`] client
//! - `driver`, `hub`: tokio runtime glue and an in-process signaling service

pub mod action;
pub mod action_log;
pub mod config;
pub mod driver;
pub mod election;
pub mod hub;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod session;
pub mod signaling;

pub use action::{DrawingAction, Feedback};
pub use config::{ConfigError, DemoConfig, SessionConfig};
pub use driver::{SessionHandle, Snapshot, join_local, spawn_session};
pub use election::Role;
pub use room::{PeerIdentity, RoomCode, host_identity};
pub use session::{Notice, Origin, RoomSession};
