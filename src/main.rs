//! Demo: a room of simulated participants sharing one in-process hub.

use std::time::Duration;

use drawmesh::action::{EmojiBurst, PathStroke, Point, Tool};
use drawmesh::hub::LocalHub;
use drawmesh::{DemoConfig, DrawingAction, Notice, Role, join_local};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

const PALETTE: [&str; 4] = ["#FF0000", "#00AA00", "#0000FF", "#FF9900"];
const SETTLE: Duration = Duration::from_millis(200);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(error) = dotenvy::dotenv() {
        debug!(%error, "no .env file loaded");
    }
    let config = match DemoConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            error!(%error, "invalid configuration");
            std::process::exit(2);
        }
    };

    info!(room = %config.room, participants = config.participants, "demo: starting");
    let hub = LocalHub::new();
    let mut handles = Vec::with_capacity(config.participants);

    // Join one at a time so the first participant ends up hosting.
    for participant in 0..config.participants {
        let (handle, mut notices) = join_local(&hub, config.room.clone(), config.session);
        let Some(role) = wait_for_role(participant, &mut notices).await else {
            warn!(participant, "demo: session stopped before settling");
            continue;
        };
        info!(participant, ?role, "demo: participant settled");
        tokio::spawn(log_notices(participant, notices));
        handles.push(handle);
    }
    tokio::time::sleep(SETTLE).await;

    for (participant, handle) in handles.iter().enumerate() {
        let color = PALETTE[participant % PALETTE.len()];
        if let Err(error) = handle.submit(sample_stroke(participant, color)).await {
            warn!(participant, %error, "demo: submit failed");
        }
    }
    if let Some(first) = handles.first() {
        let burst = DrawingAction::Emoji(EmojiBurst { emoji: "🎨".into(), x: 120.0, y: 80.0 });
        if let Err(error) = first.submit(burst).await {
            warn!(%error, "demo: emoji failed");
        }
    }
    if let Some(last) = handles.last() {
        if let Err(error) = last.undo().await {
            warn!(%error, "demo: undo failed");
        }
    }
    tokio::time::sleep(SETTLE).await;

    for (participant, handle) in handles.iter().enumerate() {
        match handle.snapshot().await {
            Ok(view) => info!(
                participant,
                identity = ?view.identity,
                role = ?view.role,
                peers = view.peers.len(),
                actions = view.actions.len(),
                "demo: final view"
            ),
            Err(error) => warn!(participant, %error, "demo: snapshot failed"),
        }
    }

    for handle in handles {
        handle.shutdown().await;
    }
    info!("demo: done");
}

async fn wait_for_role(participant: usize, notices: &mut mpsc::Receiver<Notice>) -> Option<Role> {
    while let Some(notice) = notices.recv().await {
        debug!(participant, ?notice, "demo: notice");
        if let Notice::RoleSettled(role) = notice {
            return Some(role);
        }
    }
    None
}

async fn log_notices(participant: usize, mut notices: mpsc::Receiver<Notice>) {
    while let Some(notice) = notices.recv().await {
        match notice.feedback() {
            Some(cue) => info!(participant, ?cue, ?notice, "demo: notice"),
            None => info!(participant, ?notice, "demo: notice"),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn sample_stroke(participant: usize, color: &str) -> DrawingAction {
    let offset = participant as f64 * 40.0;
    let points = (0..8_u8).map(|i| Point { x: offset + f64::from(i) * 10.0, y: offset + f64::from(i * i) }).collect();
    DrawingAction::Path(PathStroke::new(Tool::Brush, color, 6.0, points))
}
