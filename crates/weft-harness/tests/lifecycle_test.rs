//! Connection lifecycle tests: duplicates, closing, and bridge teardown.

use weft_core::{BridgeError, Event, PeerState, Severity};
use weft_harness::{TestNet, PEER_A, PEER_B};

#[test]
fn at_most_one_connection_per_peer() {
    let mut net = TestNet::new();

    net.a.bridge.connect(PEER_B).expect("connect");
    assert_eq!(
        net.a.bridge.connect(PEER_B),
        Err(BridgeError::DuplicateConnection(PEER_B))
    );
    assert_eq!(net.a.bridge.connection_count(), 1);

    // A repeated inbound request replaces nothing either: the existing
    // connection answers with a reset and deletes itself.
    net.settle();
    net.b.bridge.receive(PEER_A, &[0xA0]);
    assert_eq!(net.b.bridge.connection_count(), 0);
}

#[test]
fn connect_failure_leaves_no_connection_behind() {
    let mut net = TestNet::new();

    net.a.transport.fail_lossless(true);
    let err = net.a.bridge.connect(PEER_B).unwrap_err();
    assert_eq!(err.severity(), Severity::Transient);
    assert_eq!(net.a.bridge.connection_count(), 0);
    assert_eq!(net.a.bridge.peer_state(PEER_B), PeerState::Disconnected);

    // The next attempt starts clean.
    net.a.transport.fail_lossless(false);
    net.a.bridge.connect(PEER_B).expect("connect");
    assert_eq!(net.a.bridge.peer_state(PEER_B), PeerState::RingingAtFriend);
}

#[test]
fn tap_open_failure_is_permanent_and_creates_nothing() {
    let mut net = TestNet::new();

    net.a.taps.fail_open(true);
    let err = net.a.bridge.connect(PEER_B).unwrap_err();
    assert_eq!(err.severity(), Severity::Permanent);
    assert_eq!(net.a.bridge.connection_count(), 0);
    assert!(net.a.transport.take_sent().is_empty());
}

#[test]
fn inbound_request_with_failing_tap_gets_a_reset() {
    let mut net = TestNet::new();

    net.b.taps.fail_open(true);
    net.b.bridge.receive(PEER_A, &[0xA0]);

    let sent = net.b.transport.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].bytes, vec![0xA4]);
    assert_eq!(net.b.bridge.connection_count(), 0);
    assert!(net.b.events.take().is_empty());
}

#[test]
fn accept_without_a_connection_fails() {
    let mut net = TestNet::new();
    assert_eq!(
        net.b.bridge.accept(PEER_A),
        Err(BridgeError::UnknownConnection(PEER_A))
    );
}

#[test]
fn accept_on_the_initiating_side_deletes_the_connection() {
    let mut net = TestNet::new();

    net.a.bridge.connect(PEER_B).expect("connect");
    let _ = net.a.transport.take_sent();

    let err = net.a.bridge.accept(PEER_B).unwrap_err();
    assert!(matches!(err, BridgeError::InvalidState { .. }));
    assert_eq!(net.a.bridge.peer_state(PEER_B), PeerState::Disconnected);

    // Teardown from a pending state resets the peer and reports closure.
    let sent = net.a.transport.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].bytes, vec![0xA4]);
    assert_eq!(net.a.events.take(), vec![(Event::Closed, PEER_B)]);
}

#[test]
fn accept_send_failure_resets_the_connection() {
    let mut net = TestNet::new();

    net.a.bridge.connect(PEER_B).expect("connect");
    net.settle();
    let _ = net.b.events.take();

    net.b.transport.fail_lossless(true);
    let err = net.b.bridge.accept(PEER_A).unwrap_err();
    assert!(matches!(err, BridgeError::Transport(_)));
    assert_eq!(net.b.bridge.peer_state(PEER_A), PeerState::Disconnected);
    assert_eq!(net.b.events.take(), vec![(Event::Closed, PEER_A)]);
}

#[test]
fn closing_an_established_connection_notifies_the_peer() {
    let mut net = TestNet::new();
    net.establish();

    net.a.bridge.close(PEER_B);
    assert_eq!(net.a.bridge.peer_state(PEER_B), PeerState::Disconnected);
    assert!(net.a.events.take().is_empty());

    let sent = net.a.transport.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].bytes, vec![0xA3]);

    net.b.bridge.receive(PEER_A, &sent[0].bytes);
    assert_eq!(net.b.events.take(), vec![(Event::Closed, PEER_A)]);
    assert_eq!(net.b.bridge.peer_state(PEER_A), PeerState::Disconnected);
}

#[test]
fn closing_a_stranger_is_a_quiet_no_op() {
    let mut net = TestNet::new();
    net.a.bridge.close(42);
    net.a.bridge.reject(42);
    assert!(net.a.transport.take_sent().is_empty());
    assert!(net.a.events.take().is_empty());
}

#[test]
fn dropping_the_bridge_closes_established_connections_once() {
    let mut net = TestNet::new();
    net.establish();

    let transport = net.a.transport.clone();
    drop(net.a.bridge);

    let sent = transport.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].friend, PEER_B);
    assert_eq!(sent[0].bytes, vec![0xA3]);
}

#[test]
fn dropping_the_bridge_rejects_pending_inbound_requests() {
    let mut net = TestNet::new();

    net.a.bridge.connect(PEER_B).expect("connect");
    net.settle();
    let _ = net.b.events.take();

    let transport = net.b.transport.clone();
    drop(net.b.bridge);

    let sent = transport.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].bytes, vec![0xA2]);
}
