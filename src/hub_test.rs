use tokio::time::{Duration, timeout};

use super::*;

fn peer(raw: &str) -> PeerIdentity {
    PeerIdentity::new(raw)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<SignalEvent>) -> SignalEvent {
    timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("timed out waiting for signal event")
        .expect("channel closed")
}

fn assert_no_event(rx: &mut mpsc::UnboundedReceiver<SignalEvent>) {
    assert!(rx.try_recv().is_err(), "unexpected event queued");
}

type Side = (LocalSignaling, mpsc::UnboundedReceiver<SignalEvent>, ConnectionId);

/// Register two clients and connect `a` to `b`. Returns both connection ends.
async fn linked(hub: &LocalHub) -> (Side, Side) {
    let (mut a, mut rx_a) = hub.client();
    let (mut b, mut rx_b) = hub.client();
    a.open(&peer("user-aaaaaaa"));
    b.open(&peer("user-bbbbbbb"));
    next_event(&mut rx_a).await;
    next_event(&mut rx_b).await;

    let conn_a = a.connect(&peer("user-bbbbbbb"));
    let SignalEvent::Incoming { conn: conn_b, remote } = next_event(&mut rx_b).await else {
        panic!("expected incoming connection");
    };
    assert_eq!(remote, peer("user-aaaaaaa"));
    assert_eq!(next_event(&mut rx_a).await, SignalEvent::ConnectionOpened { conn: conn_a });
    ((a, rx_a, conn_a), (b, rx_b, conn_b))
}

#[tokio::test]
async fn first_registration_wins() {
    let hub = LocalHub::new();
    let (mut first, mut rx_first) = hub.client();
    let (mut second, mut rx_second) = hub.client();
    let host = peer("host-ABC123");

    first.open(&host);
    second.open(&host);

    assert_eq!(next_event(&mut rx_first).await, SignalEvent::Opened { identity: host.clone() });
    assert_eq!(
        next_event(&mut rx_second).await,
        SignalEvent::Error(SignalingError::UnavailableId(host.clone()))
    );
    assert_eq!(hub.registered(), vec![host]);
}

#[tokio::test]
async fn destroy_releases_identity_for_others() {
    let hub = LocalHub::new();
    let (mut first, mut rx_first) = hub.client();
    let (mut second, mut rx_second) = hub.client();
    let host = peer("host-ABC123");

    first.open(&host);
    next_event(&mut rx_first).await;
    first.destroy();
    second.open(&host);

    assert_eq!(next_event(&mut rx_second).await, SignalEvent::Opened { identity: host });
}

#[tokio::test]
async fn reopening_swaps_identity() {
    let hub = LocalHub::new();
    let (mut client, mut rx) = hub.client();

    client.open(&peer("user-aaaaaaa"));
    client.open(&peer("user-zzzzzzz"));
    next_event(&mut rx).await;
    next_event(&mut rx).await;

    assert_eq!(hub.registered(), vec![peer("user-zzzzzzz")]);
}

#[tokio::test]
async fn connect_to_unknown_identity_fails() {
    let hub = LocalHub::new();
    let (mut client, mut rx) = hub.client();
    client.open(&peer("user-aaaaaaa"));
    next_event(&mut rx).await;

    let conn = client.connect(&peer("host-ABC123"));

    assert_eq!(
        next_event(&mut rx).await,
        SignalEvent::ConnectionError { conn, error: SignalingError::PeerUnavailable(peer("host-ABC123")) }
    );
    assert!(client.send(conn, b"x".to_vec()).is_err());
}

#[tokio::test]
async fn messages_arrive_in_send_order_on_the_other_end() {
    let hub = LocalHub::new();
    let ((mut a, _rx_a, conn_a), (mut b, mut rx_b, conn_b)) = linked(&hub).await;

    for n in 0..5u8 {
        a.send(conn_a, vec![n]).expect("send");
    }
    for n in 0..5u8 {
        assert_eq!(next_event(&mut rx_b).await, SignalEvent::Data { conn: conn_b, bytes: vec![n] });
    }

    // Other direction uses the acceptor's own id.
    b.send(conn_b, b"pong".to_vec()).expect("send back");
}

#[tokio::test]
async fn close_notifies_only_the_other_side() {
    let hub = LocalHub::new();
    let ((mut a, mut rx_a, conn_a), (mut b, mut rx_b, conn_b)) = linked(&hub).await;

    a.close(conn_a);

    assert_eq!(next_event(&mut rx_b).await, SignalEvent::ConnectionClosed { conn: conn_b });
    assert_no_event(&mut rx_a);
    assert_eq!(b.send(conn_b, b"late".to_vec()), Err(SignalingError::Disconnected));
}

#[tokio::test]
async fn destroy_hangs_up_every_connection() {
    let hub = LocalHub::new();
    let ((mut a, mut rx_a, _conn_a), (_b, mut rx_b, conn_b)) = linked(&hub).await;

    a.destroy();

    assert_eq!(next_event(&mut rx_b).await, SignalEvent::ConnectionClosed { conn: conn_b });
    assert_no_event(&mut rx_a);
    assert_eq!(hub.registered(), vec![peer("user-bbbbbbb")]);
}

#[tokio::test]
async fn dropping_a_client_leaves_the_hub() {
    let hub = LocalHub::new();
    let ((a, _rx_a, _conn_a), (_b, mut rx_b, conn_b)) = linked(&hub).await;

    drop(a);

    assert_eq!(next_event(&mut rx_b).await, SignalEvent::ConnectionClosed { conn: conn_b });
    assert_eq!(hub.registered(), vec![peer("user-bbbbbbb")]);
}

#[tokio::test]
async fn cannot_send_on_someone_elses_connection() {
    let hub = LocalHub::new();
    let ((_a, _rx_a, conn_a), (mut b, _rx_b, _conn_b)) = linked(&hub).await;

    assert_eq!(b.send(conn_a, b"spoof".to_vec()), Err(SignalingError::Disconnected));
}
