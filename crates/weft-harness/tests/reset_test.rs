//! Reset behavior: anything unexpected tears the connection down.

use weft_core::{Event, PeerState};
use weft_harness::{TestNet, PEER_A, PEER_B};

#[test]
fn data_during_handshake_resets_the_connection() {
    let mut net = TestNet::new();

    net.a.bridge.connect(PEER_B).expect("connect");
    let _ = net.a.transport.take_sent();
    assert_eq!(net.a.bridge.peer_state(PEER_B), PeerState::RingingAtFriend);

    // A Data packet arrives while our request is still pending.
    net.a.bridge.receive(PEER_B, &[0xC8, 1, 2, 3]);

    let sent = net.a.transport.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].bytes, vec![0xA4]);
    assert_eq!(net.a.events.take(), vec![(Event::Closed, PEER_B)]);
    assert_eq!(net.a.bridge.peer_state(PEER_B), PeerState::Disconnected);
}

#[test]
fn simultaneous_request_resets_the_pending_connection() {
    let mut net = TestNet::new();

    net.a.bridge.connect(PEER_B).expect("connect");
    let _ = net.a.transport.take_sent();

    // B's own request crosses ours on the wire.
    net.a.bridge.receive(PEER_B, &[0xA0]);

    let sent = net.a.transport.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].bytes, vec![0xA4]);
    assert_eq!(net.a.events.take(), vec![(Event::Closed, PEER_B)]);
    assert_eq!(net.a.bridge.peer_state(PEER_B), PeerState::Disconnected);
}

#[test]
fn reset_in_any_state_closes_silently_toward_the_peer() {
    let mut net = TestNet::new();
    net.establish();

    net.a.bridge.receive(PEER_B, &[0xA4]);
    assert!(net.a.transport.take_sent().is_empty());
    assert_eq!(net.a.events.take(), vec![(Event::Closed, PEER_B)]);
    assert_eq!(net.a.bridge.peer_state(PEER_B), PeerState::Disconnected);
}

#[test]
fn unknown_tag_on_a_live_connection_resets() {
    let mut net = TestNet::new();
    net.establish();

    net.b.bridge.receive(PEER_A, &[0x42, 1, 2]);

    let sent = net.b.transport.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].bytes, vec![0xA4]);
    assert_eq!(net.b.events.take(), vec![(Event::Closed, PEER_A)]);
}

#[test]
fn strangers_sending_data_get_a_reset_back() {
    let mut net = TestNet::new();

    net.a.bridge.receive(99, &[0xC8, 1, 2, 3]);

    let sent = net.a.transport.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].friend, 99);
    assert_eq!(sent[0].bytes, vec![0xA4]);
    assert_eq!(net.a.bridge.peer_state(99), PeerState::Disconnected);
    assert!(net.a.events.take().is_empty());
}

#[test]
fn strangers_sending_resets_are_ignored() {
    let mut net = TestNet::new();

    net.a.bridge.receive(99, &[0xA4]);
    assert!(net.a.transport.take_sent().is_empty());
    assert!(net.a.events.take().is_empty());
}

#[test]
fn garbage_from_strangers_gets_a_reset_back() {
    let mut net = TestNet::new();

    net.a.bridge.receive(99, &[]);
    net.a.bridge.receive(99, &[0x42]);

    let sent = net.a.transport.take_sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|p| p.bytes == vec![0xA4]));
}

#[test]
fn unexpected_control_when_connected_resets() {
    let mut net = TestNet::new();
    net.establish();

    // A second ConnectionAccept is nonsense for an established connection.
    net.a.bridge.receive(PEER_B, &[0xA1]);

    let sent = net.a.transport.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].bytes, vec![0xA4]);
    assert_eq!(net.a.events.take(), vec![(Event::Closed, PEER_B)]);
    assert_eq!(net.a.bridge.peer_state(PEER_B), PeerState::Disconnected);
}
