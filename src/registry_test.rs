use super::*;
use crate::signaling::test_helpers::RecordingSignaling;

fn peer(raw: &str) -> PeerIdentity {
    PeerIdentity::new(raw)
}

#[test]
fn list_keeps_join_order() {
    let mut registry = ConnectionRegistry::new();
    registry.add(peer("user-a"), ConnectionId(1));
    registry.add(peer("user-b"), ConnectionId(2));
    registry.add(peer("host-ABC123"), ConnectionId(3));

    assert_eq!(registry.list(), vec![peer("user-a"), peer("user-b"), peer("host-ABC123")]);
    assert_eq!(registry.len(), 3);
}

#[test]
fn reconnect_from_same_identity_replaces_entry() {
    let mut registry = ConnectionRegistry::new();
    assert_eq!(registry.add(peer("user-a"), ConnectionId(1)), None);
    registry.add(peer("user-b"), ConnectionId(2));

    assert_eq!(registry.add(peer("user-a"), ConnectionId(7)), Some(ConnectionId(1)));
    assert_eq!(registry.list(), vec![peer("user-b"), peer("user-a")]);
    assert_eq!(registry.connection(&peer("user-a")), Some(ConnectionId(7)));
}

#[test]
fn remove_by_identity() {
    let mut registry = ConnectionRegistry::new();
    registry.add(peer("user-a"), ConnectionId(1));
    registry.add(peer("user-b"), ConnectionId(2));

    assert_eq!(registry.remove(&peer("user-a")), Some(ConnectionId(1)));
    assert_eq!(registry.remove(&peer("user-a")), None);
    assert_eq!(registry.remove(&peer("user-b")), Some(ConnectionId(2)));
    assert!(registry.is_empty());
}

#[test]
fn superseded_connection_is_no_longer_the_target() {
    let mut registry = ConnectionRegistry::new();
    registry.add(peer("user-a"), ConnectionId(1));
    registry.add(peer("user-a"), ConnectionId(2));

    assert_eq!(registry.retarget(ConnectionId(1), ConnectionId(3)), None);
    assert_eq!(registry.connection(&peer("user-a")), Some(ConnectionId(2)));
    assert_eq!(registry.len(), 1);
}

#[test]
fn broadcast_skips_refused_connections() {
    let mut registry = ConnectionRegistry::new();
    registry.add(peer("user-a"), ConnectionId(1));
    registry.add(peer("user-b"), ConnectionId(2));
    registry.add(peer("user-c"), ConnectionId(3));

    let mut signaling = RecordingSignaling::new();
    signaling.refused.insert(ConnectionId(2));

    let delivered = registry.broadcast(&mut signaling, b"hello");
    assert_eq!(delivered, 2);
    assert_eq!(signaling.sent_to(ConnectionId(1)), vec![b"hello".to_vec()]);
    assert!(signaling.sent_to(ConnectionId(2)).is_empty());
    assert_eq!(signaling.sent_to(ConnectionId(3)), vec![b"hello".to_vec()]);
}

#[test]
fn broadcast_with_no_peers_sends_nothing() {
    let registry = ConnectionRegistry::new();
    let mut signaling = RecordingSignaling::new();
    assert_eq!(registry.broadcast(&mut signaling, b"x"), 0);
    assert!(signaling.calls.is_empty());
}

#[test]
fn drain_empties_registry() {
    let mut registry = ConnectionRegistry::new();
    registry.add(peer("user-a"), ConnectionId(1));
    registry.add(peer("user-b"), ConnectionId(2));

    assert_eq!(registry.drain(), vec![peer("user-a"), peer("user-b")]);
    assert!(registry.is_empty());
}

#[test]
fn retarget_keeps_join_position() {
    let mut registry = ConnectionRegistry::new();
    registry.add(peer("user-a"), ConnectionId(1));
    registry.add(peer("user-b"), ConnectionId(2));

    assert_eq!(registry.retarget(ConnectionId(1), ConnectionId(9)), Some(peer("user-a")));
    assert_eq!(registry.retarget(ConnectionId(1), ConnectionId(10)), None);
    assert_eq!(registry.list(), vec![peer("user-a"), peer("user-b")]);
    assert_eq!(registry.connection(&peer("user-a")), Some(ConnectionId(9)));
}
