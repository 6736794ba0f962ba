//! Two bridges wired back to back.
//!
//! `TestNet` is the scenario driver for end-to-end tests: side A and side B
//! each get a bridge over their own simulated transport, TAP factory, and a
//! shared virtual clock. Packets a bridge hands to its transport are
//! shuttled into the peer bridge by [`TestNet::deliver`].

use std::{cell::RefCell, rc::Rc};

use weft_core::{Bridge, Event, FriendId};

use crate::{sim_clock::SimClock, sim_tap::SimTapFactory, sim_transport::SimTransport};

/// The friend handle side B uses for side A.
pub const PEER_A: FriendId = 3;

/// The friend handle side A uses for side B.
pub const PEER_B: FriendId = 7;

/// Records `(event, friend)` pairs emitted by a bridge.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<(Event, FriendId)>>>,
}

impl EventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one event.
    pub fn record(&self, event: Event, friend: FriendId) {
        self.events.borrow_mut().push((event, friend));
    }

    /// Drain the recorded events in emission order.
    #[must_use]
    pub fn take(&self) -> Vec<(Event, FriendId)> {
        self.events.borrow_mut().drain(..).collect()
    }
}

/// One side of the test network.
pub struct Side {
    /// The bridge under test
    pub bridge: Bridge<SimTransport, SimTapFactory, SimClock>,
    /// Test handle to the bridge's transport
    pub transport: SimTransport,
    /// Test handle to the bridge's TAP factory
    pub taps: SimTapFactory,
    /// Events the bridge emitted
    pub events: EventLog,
}

impl Side {
    fn new(clock: SimClock) -> Self {
        let transport = SimTransport::new();
        let taps = SimTapFactory::new();
        let events = EventLog::new();

        let mut bridge = Bridge::with_clock(transport.clone(), taps.clone(), clock);
        let log = events.clone();
        bridge.set_event_handler(move |event, friend| log.record(event, friend));

        Self { bridge, transport, taps, events }
    }
}

/// Two bridges and the plumbing between them.
pub struct TestNet {
    /// Side A, which usually initiates
    pub a: Side,
    /// Side B, which usually responds
    pub b: Side,
    /// The virtual clock both bridges share
    pub clock: SimClock,
}

impl TestNet {
    /// Build a fresh two-party network.
    #[must_use]
    pub fn new() -> Self {
        let clock = SimClock::new();
        Self { a: Side::new(clock.clone()), b: Side::new(clock.clone()), clock }
    }

    /// Move every captured packet to its peer, one round. Returns how many
    /// packets moved.
    pub fn deliver(&mut self) -> usize {
        let from_a = self.a.transport.take_sent();
        let from_b = self.b.transport.take_sent();
        let moved = from_a.len() + from_b.len();

        for packet in from_a {
            self.b.bridge.receive(PEER_A, &packet.bytes);
        }
        for packet in from_b {
            self.a.bridge.receive(PEER_B, &packet.bytes);
        }
        moved
    }

    /// Deliver rounds until neither side has anything in flight.
    pub fn settle(&mut self) {
        while self.deliver() > 0 {}
    }

    /// Walk both sides through the full handshake on subnet scan defaults.
    /// Ends with both bridges `Connected` and all event logs drained.
    pub fn establish(&mut self) {
        self.a.bridge.connect(PEER_B).expect("connect");
        self.settle();
        self.b.bridge.accept(PEER_A).expect("accept");
        self.settle();

        let _ = self.a.events.take();
        let _ = self.b.events.take();
    }
}

impl Default for TestNet {
    fn default() -> Self {
        Self::new()
    }
}
