use super::*;

fn addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 40000))
}

fn connect(conns: &mut Connections, capacity: usize) -> (Uuid, mpsc::Receiver<Outbound>) {
    let client_id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(capacity);
    conns.join(client_id, addr(), tx);
    (client_id, rx)
}

fn expect_text(rx: &mut mpsc::Receiver<Outbound>) -> serde_json::Value {
    match rx.try_recv().expect("queued frame") {
        Outbound::Text(text) => serde_json::from_str(&text).expect("json frame"),
        other => panic!("expected text frame, got {other:?}"),
    }
}

#[test]
fn join_and_leave_track_membership() {
    let mut conns = Connections::new();
    let (id, _rx) = connect(&mut conns, 4);
    assert!(conns.contains(id));
    assert_eq!(conns.len(), 1);

    assert!(conns.leave(id));
    assert!(!conns.leave(id));
    assert!(conns.is_empty());
}

#[test]
fn broadcast_reaches_every_live_connection() {
    let mut conns = Connections::new();
    let (_a, mut rx_a) = connect(&mut conns, 4);
    let (_b, mut rx_b) = connect(&mut conns, 4);

    let delivered = conns.broadcast(&Event::TimeUpdate { time: 12 });
    assert_eq!(delivered, 2);
    assert_eq!(expect_text(&mut rx_a)["time"], 12);
    assert_eq!(expect_text(&mut rx_b)["type"], "time_update");
}

#[test]
fn broadcast_shares_one_serialization() {
    let mut conns = Connections::new();
    let (_a, mut rx_a) = connect(&mut conns, 4);
    let (_b, mut rx_b) = connect(&mut conns, 4);

    conns.broadcast(&Event::MuteState { muted: false });

    let (Ok(Outbound::Text(a)), Ok(Outbound::Text(b))) = (rx_a.try_recv(), rx_b.try_recv()) else {
        panic!("both connections should receive text");
    };
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn failed_connection_is_removed_and_others_still_receive() {
    let mut conns = Connections::new();
    let (_a, mut rx_a) = connect(&mut conns, 4);
    let (dead, rx_dead) = connect(&mut conns, 4);
    let (_c, mut rx_c) = connect(&mut conns, 4);
    drop(rx_dead);

    let delivered = conns.broadcast(&Event::ScoreUpdate { team1: 1, team2: 0 });

    assert_eq!(delivered, 2);
    assert_eq!(conns.len(), 2);
    assert!(!conns.contains(dead));
    assert_eq!(expect_text(&mut rx_a)["team1"], 1);
    assert_eq!(expect_text(&mut rx_c)["team1"], 1);
}

#[test]
fn full_queue_marks_connection_dead() {
    let mut conns = Connections::new();
    let (slow, _rx_slow) = connect(&mut conns, 1);
    let (_fast, mut rx_fast) = connect(&mut conns, 8);

    assert_eq!(conns.broadcast(&Event::TimeUpdate { time: 1 }), 2);
    assert_eq!(conns.broadcast(&Event::TimeUpdate { time: 2 }), 1);

    assert!(!conns.contains(slow));
    assert_eq!(expect_text(&mut rx_fast)["time"], 1);
    assert_eq!(expect_text(&mut rx_fast)["time"], 2);
}

#[test]
fn send_to_one_targets_single_connection() {
    let mut conns = Connections::new();
    let (a, mut rx_a) = connect(&mut conns, 4);
    let (_b, mut rx_b) = connect(&mut conns, 4);

    let event = Event::Error { code: "E_UNKNOWN_COMMAND".into(), message: "unknown command: x".into() };
    assert!(conns.send_to_one(a, &event));
    assert_eq!(expect_text(&mut rx_a)["type"], "error");
    assert!(rx_b.try_recv().is_err());
}

#[test]
fn send_to_one_unknown_or_dead_connection() {
    let mut conns = Connections::new();
    assert!(!conns.send_to_one(Uuid::new_v4(), &Event::TimeUpdate { time: 0 }));

    let (dead, rx) = connect(&mut conns, 4);
    drop(rx);
    assert!(!conns.send_to_one(dead, &Event::TimeUpdate { time: 0 }));
    assert!(conns.is_empty());
}

#[test]
fn close_all_queues_close_and_empties_set() {
    let mut conns = Connections::new();
    let (_a, mut rx_a) = connect(&mut conns, 4);
    let (_b, rx_b) = connect(&mut conns, 4);
    drop(rx_b);

    let closed = conns.close_all(CLOSE_GOING_AWAY, "server shutting down");

    assert_eq!(closed, 1);
    assert!(conns.is_empty());
    assert_eq!(
        rx_a.try_recv().expect("close queued"),
        Outbound::Close { code: CLOSE_GOING_AWAY, reason: "server shutting down" }
    );
}
