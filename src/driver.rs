//! Session driver: runs one [`RoomSession`] on a tokio task.
//!
//! DESIGN
//! ======
//! A single `select!` loop owns the session and multiplexes:
//! - signaling events from the service
//! - user commands from the [`SessionHandle`]
//! - the election deadline (`sleep_until`)
//!
//! After every wake-up the queued notices are forwarded to the notice
//! channel. Forwarding is best-effort: a full channel drops the notice.
//!
//! LIFECYCLE
//! =========
//! 1. `spawn_session` starts the election and enters the loop
//! 2. Commands mutate the session; replies go back over oneshot channels
//! 3. `Shutdown`, a dropped handle, or a closed event stream → leave the room

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info};

use crate::action::DrawingAction;
use crate::config::SessionConfig;
use crate::election::Role;
use crate::hub::LocalHub;
use crate::room::{PeerIdentity, RoomCode};
use crate::session::{Notice, RoomSession};
use crate::signaling::{SignalEvent, Signaling};

const COMMAND_BUFFER: usize = 64;
const NOTICE_BUFFER: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("session task has stopped")]
    Closed,
}

/// Point-in-time view of a running session.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub identity: Option<PeerIdentity>,
    pub role: Option<Role>,
    pub peers: Vec<PeerIdentity>,
    pub actions: Vec<DrawingAction>,
}

enum Command {
    Submit(DrawingAction),
    Clear,
    Undo,
    Snapshot(oneshot::Sender<Snapshot>),
    Shutdown,
}

/// Control side of a running session.
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    async fn send(&self, command: Command) -> Result<(), DriverError> {
        self.commands.send(command).await.map_err(|_| DriverError::Closed)
    }

    /// # Errors
    ///
    /// Returns [`DriverError::Closed`] once the session task has stopped.
    pub async fn submit(&self, action: DrawingAction) -> Result<(), DriverError> {
        self.send(Command::Submit(action)).await
    }

    /// # Errors
    ///
    /// Returns [`DriverError::Closed`] once the session task has stopped.
    pub async fn clear(&self) -> Result<(), DriverError> {
        self.send(Command::Clear).await
    }

    /// # Errors
    ///
    /// Returns [`DriverError::Closed`] once the session task has stopped.
    pub async fn undo(&self) -> Result<(), DriverError> {
        self.send(Command::Undo).await
    }

    /// # Errors
    ///
    /// Returns [`DriverError::Closed`] once the session task has stopped.
    pub async fn snapshot(&self) -> Result<Snapshot, DriverError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx)).await?;
        rx.await.map_err(|_| DriverError::Closed)
    }

    /// Leave the room and wait for the task to finish.
    pub async fn shutdown(self) {
        if self.send(Command::Shutdown).await.is_err() {
            debug!("driver: session already stopped");
        }
        if let Err(error) = self.task.await {
            debug!(%error, "driver: session task ended abnormally");
        }
    }
}

/// Run `session` on its own task. Returns the control handle and the
/// stream of notices.
///
/// The notice channel holds 256 entries. A consumer that falls further
/// behind loses notices, `Applied` included, so a drawing surface that must
/// mirror the log should redraw from [`SessionHandle::snapshot`] rather than
/// replay notices alone.
pub fn spawn_session<S>(
    session: RoomSession<S>,
    events: mpsc::UnboundedReceiver<SignalEvent>,
) -> (SessionHandle, mpsc::Receiver<Notice>)
where
    S: Signaling + Send + 'static,
{
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (notice_tx, notice_rx) = mpsc::channel(NOTICE_BUFFER);
    let task = tokio::spawn(run_session(session, events, command_rx, notice_tx));
    (SessionHandle { commands: command_tx, task }, notice_rx)
}

/// Join `room` through an in-process hub.
#[must_use]
pub fn join_local(hub: &LocalHub, room: RoomCode, config: SessionConfig) -> (SessionHandle, mpsc::Receiver<Notice>) {
    let (signaling, events) = hub.client();
    spawn_session(RoomSession::new(room, config, signaling), events)
}

// =============================================================================
// LOOP
// =============================================================================

async fn run_session<S: Signaling>(
    mut session: RoomSession<S>,
    mut events: mpsc::UnboundedReceiver<SignalEvent>,
    mut commands: mpsc::Receiver<Command>,
    notices: mpsc::Sender<Notice>,
) {
    session.start(Instant::now());
    forward_notices(&mut session, &notices);

    loop {
        let deadline = session.poll_timeout();
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    info!(room = %session.room(), "driver: signaling stream closed");
                    break;
                };
                session.handle_signal(event, Instant::now());
            }
            command = commands.recv() => {
                match command {
                    Some(Command::Submit(action)) => {
                        session.submit_action(action);
                    }
                    Some(Command::Clear) => {
                        session.clear();
                    }
                    Some(Command::Undo) => {
                        session.undo_last();
                    }
                    Some(Command::Snapshot(reply)) => {
                        let snapshot = Snapshot {
                            identity: session.identity().cloned(),
                            role: session.role(),
                            peers: session.peers(),
                            actions: session.actions().to_vec(),
                        };
                        // Caller gave up waiting.
                        if reply.send(snapshot).is_err() {
                            debug!("driver: snapshot receiver dropped");
                        }
                    }
                    Some(Command::Shutdown) | None => break,
                }
            }
            () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                session.handle_timeout(Instant::now());
            }
        }
        forward_notices(&mut session, &notices);
    }

    session.shutdown();
    forward_notices(&mut session, &notices);
}

fn forward_notices<S: Signaling>(session: &mut RoomSession<S>, notices: &mpsc::Sender<Notice>) {
    while let Some(notice) = session.next_notice() {
        if let Err(error) = notices.try_send(notice) {
            debug!(%error, "driver: notice dropped");
        }
    }
}

#[cfg(test)]
#[path = "driver_test.rs"]
mod tests;
