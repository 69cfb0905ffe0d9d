use std::time::Duration;

use tokio::time::timeout;

use super::*;
use crate::action::{PathStroke, Point, Tool};
use crate::session::Origin;

const WAIT: Duration = Duration::from_secs(2);

fn room() -> RoomCode {
    RoomCode::parse("e2e001").expect("room code")
}

fn config() -> SessionConfig {
    SessionConfig { election_timeout: Duration::from_millis(150) }
}

fn stroke(color: &str) -> DrawingAction {
    DrawingAction::Path(PathStroke::new(Tool::Brush, color, 4.0, vec![Point { x: 1.0, y: 2.0 }]))
}

/// Read notices until one matches, failing after [`WAIT`].
async fn wait_for(rx: &mut mpsc::Receiver<Notice>, what: &str, matches: impl Fn(&Notice) -> bool) -> Notice {
    timeout(WAIT, async {
        loop {
            let notice = rx.recv().await.expect("notice channel closed");
            if matches(&notice) {
                return notice;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
}

async fn settled(rx: &mut mpsc::Receiver<Notice>) -> Role {
    match wait_for(rx, "role", |n| matches!(n, Notice::RoleSettled(_))).await {
        Notice::RoleSettled(role) => role,
        other => panic!("unexpected notice {other:?}"),
    }
}

async fn replaced(rx: &mut mpsc::Receiver<Notice>) -> usize {
    match wait_for(rx, "full state", |n| matches!(n, Notice::Replaced { .. })).await {
        Notice::Replaced { len } => len,
        other => panic!("unexpected notice {other:?}"),
    }
}

async fn snapshot(handle: &SessionHandle) -> Snapshot {
    timeout(WAIT, handle.snapshot()).await.expect("snapshot timed out").expect("session running")
}

#[tokio::test]
async fn first_participant_hosts_and_late_joiner_adopts_log() {
    let hub = LocalHub::new();
    let (p1, mut n1) = join_local(&hub, room(), config());
    assert_eq!(settled(&mut n1).await, Role::Host);

    p1.submit(stroke("#111111")).await.expect("submit");

    let (p2, mut n2) = join_local(&hub, room(), config());
    assert_eq!(settled(&mut n2).await, Role::Peer);
    assert_eq!(replaced(&mut n2).await, 1);

    let view = snapshot(&p2).await;
    assert_eq!(view.actions, vec![stroke("#111111")]);
    assert_eq!(view.peers, vec![crate::room::host_identity(&room())]);

    p1.shutdown().await;
    p2.shutdown().await;
}

#[tokio::test]
async fn three_participants_form_a_mesh_and_replicate() {
    let hub = LocalHub::new();
    let (p1, mut n1) = join_local(&hub, room(), config());
    assert_eq!(settled(&mut n1).await, Role::Host);
    p1.submit(stroke("#111111")).await.expect("submit p1");

    let (p2, mut n2) = join_local(&hub, room(), config());
    assert_eq!(settled(&mut n2).await, Role::Peer);
    assert_eq!(replaced(&mut n2).await, 1);

    // P3 syncs from the host, then from P2 via the roster; P2 syncs from P3.
    let (p3, mut n3) = join_local(&hub, room(), config());
    assert_eq!(settled(&mut n3).await, Role::Peer);
    assert_eq!(replaced(&mut n3).await, 1);
    assert_eq!(replaced(&mut n3).await, 1);
    assert_eq!(replaced(&mut n2).await, 1);

    let p2_identity = snapshot(&p2).await.identity.expect("p2 identity");
    let p3_identity = snapshot(&p3).await.identity.expect("p3 identity");
    assert!(snapshot(&p2).await.peers.contains(&p3_identity));
    assert!(snapshot(&p3).await.peers.contains(&p2_identity));

    p2.submit(stroke("#222222")).await.expect("submit p2");

    for rx in [&mut n1, &mut n3] {
        let applied = wait_for(rx, "p2 stroke", |n| matches!(n, Notice::Applied { origin: Origin::Remote(_), .. })).await;
        assert_eq!(
            applied,
            Notice::Applied {
                action: stroke("#222222"),
                origin: Origin::Remote(p2_identity.clone()),
                feedback: Some(crate::action::Feedback::Draw),
            }
        );
    }
    for handle in [&p1, &p2, &p3] {
        assert_eq!(snapshot(handle).await.actions, vec![stroke("#111111"), stroke("#222222")]);
    }

    // P3 leaves: everyone else drops it from presence and keeps the log.
    p3.shutdown().await;
    wait_for(&mut n1, "p3 left", |n| *n == Notice::PeerLeft(p3_identity.clone())).await;
    wait_for(&mut n2, "p3 left", |n| *n == Notice::PeerLeft(p3_identity.clone())).await;
    assert!(!snapshot(&p1).await.peers.contains(&p3_identity));
    assert_eq!(snapshot(&p2).await.actions.len(), 2);

    p1.shutdown().await;
    p2.shutdown().await;
}

#[tokio::test]
async fn simultaneous_joiners_elect_exactly_one_host() {
    let hub = LocalHub::new();
    let (a, mut na) = join_local(&hub, room(), config());
    let (b, mut nb) = join_local(&hub, room(), config());

    let mut roles = vec![settled(&mut na).await, settled(&mut nb).await];
    roles.sort_by_key(|role| *role == Role::Peer);
    assert_eq!(roles, vec![Role::Host, Role::Peer]);

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test]
async fn clear_and_undo_replicate() {
    let hub = LocalHub::new();
    let (p1, mut n1) = join_local(&hub, room(), config());
    assert_eq!(settled(&mut n1).await, Role::Host);
    let (p2, mut n2) = join_local(&hub, room(), config());
    assert_eq!(replaced(&mut n2).await, 0);

    p1.submit(stroke("#111111")).await.expect("submit");
    p1.submit(stroke("#222222")).await.expect("submit");
    p1.undo().await.expect("undo");
    wait_for(&mut n2, "undo", |n| n.feedback() == Some(crate::action::Feedback::Undo)).await;
    assert_eq!(snapshot(&p2).await.actions, vec![stroke("#111111")]);

    p2.clear().await.expect("clear");
    wait_for(&mut n1, "clear", |n| n.feedback() == Some(crate::action::Feedback::Clear)).await;
    assert!(snapshot(&p1).await.actions.is_empty());

    p1.shutdown().await;
    p2.shutdown().await;
}

#[tokio::test]
async fn handle_reports_closed_after_shutdown() {
    let hub = LocalHub::new();
    let (p1, mut n1) = join_local(&hub, room(), config());
    settled(&mut n1).await;

    let commands = p1.commands.clone();
    p1.shutdown().await;

    assert!(commands.send(Command::Undo).await.is_err());
    assert!(hub.registered().is_empty());
}
