//! Frame forwarding and scheduler tests.

use std::time::Duration;

use weft_core::PeerState;
use weft_harness::{TestNet, PEER_B};

/// A minimal IPv4 UDP frame with the given source port.
fn udp_frame(src_port: u16) -> Vec<u8> {
    let mut frame = vec![0u8; 12];
    frame.extend_from_slice(&[0x08, 0x00]); // EtherType IPv4
    let mut ip = vec![0u8; 20];
    ip[0] = 0x45;
    ip[9] = 0x11; // UDP
    ip.extend_from_slice(&src_port.to_be_bytes());
    ip.extend_from_slice(&[0u8; 6]);
    frame.extend_from_slice(&ip);
    frame
}

#[test]
fn frames_flow_from_tap_to_peer_tap() {
    let mut net = TestNet::new();
    net.establish();

    let frame = udp_frame(5000);
    net.a.taps.device(0).queue_frame(&frame);
    net.a.bridge.iterate();
    net.settle();

    let written = net.b.taps.device(0).take_written();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].as_ref(), frame.as_slice());
}

#[test]
fn iterate_drains_all_pending_frames() {
    let mut net = TestNet::new();
    net.establish();

    for i in 0..5u8 {
        net.a.taps.device(0).queue_frame(&[i; 64]);
    }
    net.a.bridge.iterate();
    net.settle();

    let written = net.b.taps.device(0).take_written();
    assert_eq!(written.len(), 5);
    for (i, frame) in written.iter().enumerate() {
        assert_eq!(frame.as_ref(), &[i as u8; 64]);
    }
}

#[test]
fn own_transport_traffic_is_not_forwarded() {
    let mut net = TestNet::new();
    net.establish();

    // The transport's UDP port is 33445 by default.
    net.a.taps.device(0).queue_frame(&udp_frame(33445));
    net.a.taps.device(0).queue_frame(&udp_frame(5000));
    net.a.bridge.iterate();

    let sent = net.a.transport.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(&sent[0].bytes[1..], udp_frame(5000).as_slice());
}

#[test]
fn transport_refusal_pauses_forwarding_without_closing() {
    let mut net = TestNet::new();
    net.establish();

    net.a.taps.device(0).queue_frame(&udp_frame(5000));
    net.a.taps.device(0).queue_frame(&udp_frame(5001));

    net.a.transport.fail_lossy(true);
    net.a.bridge.iterate();
    assert!(net.a.transport.take_sent().is_empty());
    assert_eq!(net.a.bridge.peer_state(PEER_B), PeerState::Connected);

    // The first frame was consumed by the failed attempt; the second one
    // goes out on the next tick.
    net.a.transport.fail_lossy(false);
    net.a.bridge.iterate();
    let sent = net.a.transport.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(&sent[0].bytes[1..], udp_frame(5001).as_slice());
}

#[test]
fn nothing_is_forwarded_before_the_handshake_finishes() {
    let mut net = TestNet::new();

    net.a.bridge.connect(PEER_B).expect("connect");
    let _ = net.a.transport.take_sent();

    net.a.taps.device(0).queue_frame(&udp_frame(5000));
    net.a.bridge.iterate();
    assert!(net.a.transport.take_sent().is_empty());
}

#[test]
fn tap_read_failure_stops_the_pass_but_not_the_connection() {
    let mut net = TestNet::new();
    net.establish();

    net.a.taps.device(0).queue_frame(&udp_frame(5000));
    net.a.taps.device(0).fail_reads(true);
    net.a.bridge.iterate();

    assert!(net.a.transport.take_sent().is_empty());
    assert_eq!(net.a.bridge.peer_state(PEER_B), PeerState::Connected);

    net.a.taps.device(0).fail_reads(false);
    net.a.bridge.iterate();
    assert_eq!(net.a.transport.take_sent().len(), 1);
}

#[test]
fn iteration_interval_follows_the_transport_while_idle() {
    let mut net = TestNet::new();
    assert_eq!(net.a.bridge.iteration_interval(), Duration::from_millis(50));

    net.a.bridge.connect(PEER_B).expect("connect");
    net.settle();

    // With a connection, the bridge aims for its own 5 ms cadence.
    assert_eq!(net.a.bridge.iteration_interval(), Duration::from_millis(5));
}

#[test]
fn iteration_interval_subtracts_the_last_pass_duration() {
    let mut net = TestNet::new();
    net.establish();

    // Under the virtual clock an iterate pass takes zero time, so the full
    // 5 ms target remains.
    net.a.bridge.iterate();
    assert_eq!(net.a.bridge.iteration_interval(), Duration::from_millis(5));
}

#[test]
fn iteration_target_is_configurable() {
    use weft_core::Bridge;
    use weft_harness::{SimClock, SimTapFactory, SimTransport};

    let mut bridge = Bridge::with_clock(SimTransport::new(), SimTapFactory::new(), SimClock::new())
        .with_iteration_target(Duration::from_millis(10));
    bridge.set_event_handler(|_, _| {});

    bridge.connect(PEER_B).expect("connect");
    assert_eq!(bridge.iteration_interval(), Duration::from_millis(10));
}

#[test]
fn time_budget_is_split_across_connections() {
    let mut net = TestNet::new();
    net.establish();

    // A second, still-pending connection participates in the split but
    // forwards nothing.
    net.a.bridge.connect(11).expect("connect");
    assert_eq!(net.a.bridge.connection_count(), 2);
    let _ = net.a.transport.take_sent();

    net.a.taps.device(0).queue_frame(&udp_frame(5000));
    net.a.bridge.iterate();

    let sent = net.a.transport.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].friend, PEER_B);
}
