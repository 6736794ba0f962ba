//! The multiplexer: owns the per-peer connections, dispatches inbound
//! packets, and drives the cooperative forwarding scheduler.
//!
//! # Dispatch
//!
//! Inbound packets route by friend handle. Packets for an existing
//! connection go through its state machine; a `ConnectionRequest` from a
//! stranger creates a responder-side connection; a stray `ConnectionReset`
//! is dropped; anything else from a stranger is answered with a reset.
//!
//! # Scheduler
//!
//! [`Bridge::iterate`] runs one outbound pass, splitting the transport's
//! iteration interval evenly across connections so one busy TAP cannot
//! starve the rest. [`Bridge::iteration_interval`] tells the host how soon
//! to come back: the 5 ms target minus the time the last pass took, or the
//! transport's own cadence while no connection exists.

use std::{collections::HashMap, time::Duration};

use weft_proto::{Packet, PacketTag};

use crate::{
    clock::{Clock, SystemClock},
    connection::{self, Action, AcceptError, Connection, Event, PeerState},
    error::BridgeError,
    tap::TapFactory,
    transport::{FriendId, Transport},
};

/// Target duration of one scheduler pass.
const ITERATION_TARGET: Duration = Duration::from_millis(5);

/// Callback invoked for connection lifecycle events.
pub type EventHandler = Box<dyn FnMut(Event, FriendId)>;

/// Bridges a local TAP device per peer to remote peers over the transport.
///
/// Drive it from the host's main loop: call [`Bridge::receive`] for every
/// inbound transport packet and [`Bridge::iterate`] once per loop pass,
/// sleeping [`Bridge::iteration_interval`] between passes.
pub struct Bridge<T: Transport, F: TapFactory, C: Clock = SystemClock> {
    transport: T,
    taps: F,
    clock: C,
    connections: HashMap<FriendId, Connection<F::Device>>,
    handler: Option<EventHandler>,
    iteration_target: Duration,
    last_iterate: Duration,
}

impl<T: Transport, F: TapFactory> Bridge<T, F, SystemClock> {
    /// Create a bridge over the given transport and TAP factory.
    pub fn new(transport: T, taps: F) -> Self {
        Self::with_clock(transport, taps, SystemClock)
    }
}

impl<T: Transport, F: TapFactory, C: Clock> Bridge<T, F, C> {
    /// Create a bridge with an explicit time source.
    pub fn with_clock(transport: T, taps: F, clock: C) -> Self {
        Self {
            transport,
            taps,
            clock,
            connections: HashMap::new(),
            handler: None,
            iteration_target: ITERATION_TARGET,
            last_iterate: Duration::ZERO,
        }
    }

    /// Override the 5 ms scheduler pass target.
    #[must_use]
    pub fn with_iteration_target(mut self, target: Duration) -> Self {
        self.iteration_target = target;
        self
    }

    /// Register the callback that receives connection lifecycle events.
    ///
    /// Inbound connection requests are ignored until a handler is set;
    /// nobody could answer them.
    pub fn set_event_handler(&mut self, handler: impl FnMut(Event, FriendId) + 'static) {
        self.handler = Some(Box::new(handler));
    }

    /// Feed one inbound transport packet into the bridge.
    ///
    /// Call this from the transport's receive callback for both delivery
    /// classes.
    pub fn receive(&mut self, friend: FriendId, bytes: &[u8]) {
        let packet = Packet::from_wire(bytes);

        if let Some(conn) = self.connections.get_mut(&friend) {
            let actions = conn.handle(packet, &mut self.transport);
            self.execute(friend, &actions);
            return;
        }

        match packet.tag() {
            Ok(PacketTag::ConnectionRequest) => self.handle_connection_request(friend),
            Ok(PacketTag::ConnectionReset) => {
                tracing::debug!(friend, "reset from unconnected friend, ignoring");
            }
            _ => {
                tracing::debug!(friend, "packet from unconnected friend, resetting");
                connection::reset_peer(friend, &mut self.transport);
            }
        }
    }

    /// Open a connection to `friend`: allocate a TAP device and send a
    /// `ConnectionRequest`.
    ///
    /// # Errors
    ///
    /// Fails without creating a connection when one already exists, the TAP
    /// cannot be opened, or the request cannot be sent.
    pub fn connect(&mut self, friend: FriendId) -> Result<(), BridgeError> {
        if self.connections.contains_key(&friend) {
            return Err(BridgeError::DuplicateConnection(friend));
        }
        let tap = self.taps.open()?;
        let conn = Connection::initiate(friend, tap, &mut self.transport)?;
        self.connections.insert(friend, conn);
        Ok(())
    }

    /// Accept a previously signalled connection request from `friend`.
    ///
    /// # Errors
    ///
    /// Fails when no connection exists or the connection is not waiting on
    /// an inbound request; the latter also deletes the connection. A send
    /// failure resets the connection and surfaces as a transport error.
    pub fn accept(&mut self, friend: FriendId) -> Result<(), BridgeError> {
        let outcome = match self.connections.get_mut(&friend) {
            Some(conn) => conn.accept(&mut self.transport),
            None => return Err(BridgeError::UnknownConnection(friend)),
        };

        match outcome {
            Ok(()) => Ok(()),
            Err(AcceptError::InvalidState) => {
                self.drop_connection(friend, "accept");
                Err(BridgeError::InvalidState { friend, operation: "accept" })
            }
            Err(AcceptError::Transport(err)) => {
                let actions = match self.connections.get_mut(&friend) {
                    Some(conn) => conn.reset(&mut self.transport),
                    None => Vec::new(),
                };
                self.execute(friend, &actions);
                Err(err.into())
            }
        }
    }

    /// Reject a previously signalled connection request from `friend`.
    ///
    /// Deletes the connection, which answers the peer with the terminal
    /// packet matching its state: `ConnectionReject` for a pending
    /// request.
    pub fn reject(&mut self, friend: FriendId) {
        self.drop_connection(friend, "reject");
    }

    /// Close the connection to `friend`.
    ///
    /// Deletes the connection, which sends `ConnectionClose` when it was
    /// established.
    pub fn close(&mut self, friend: FriendId) {
        self.drop_connection(friend, "close");
    }

    /// The connection state for `friend`.
    #[must_use]
    pub fn peer_state(&self, friend: FriendId) -> PeerState {
        self.connections
            .get(&friend)
            .map_or(PeerState::Disconnected, |conn| conn.peer_state())
    }

    /// Run one scheduler pass: forward pending TAP frames for every
    /// connection within its share of the transport's iteration interval.
    pub fn iterate(&mut self) {
        if self.connections.is_empty() {
            return;
        }

        let start = self.clock.now();
        let interval = self.transport.iteration_interval();
        let count = self.connections.len() as u32;
        let per_connection = (interval / count).max(Duration::from_millis(1));

        for conn in self.connections.values_mut() {
            conn.pump(per_connection, &mut self.transport, &self.clock);
        }

        self.last_iterate = self.clock.now() - start;
    }

    /// How long the host should wait before the next [`Bridge::iterate`].
    #[must_use]
    pub fn iteration_interval(&self) -> Duration {
        if self.connections.is_empty() {
            self.transport.iteration_interval()
        } else {
            self.iteration_target.saturating_sub(self.last_iterate)
        }
    }

    /// Number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn handle_connection_request(&mut self, friend: FriendId) {
        tracing::debug!(friend, "connection request received");

        if self.handler.is_none() {
            tracing::error!("an event handler must be set to answer connection requests");
            return;
        }

        let tap = match self.taps.open() {
            Ok(tap) => tap,
            Err(err) => {
                tracing::error!(friend, %err, "cannot open tap for inbound connection");
                connection::reset_peer(friend, &mut self.transport);
                return;
            }
        };

        self.connections.insert(friend, Connection::respond(friend, tap));
        self.emit(Event::Requested, friend);
    }

    fn drop_connection(&mut self, friend: FriendId, operation: &str) {
        let Some(mut conn) = self.connections.remove(&friend) else {
            tracing::debug!(friend, operation, "no connection for this friend");
            return;
        };
        tracing::debug!(friend, operation, "deleting connection");
        if let Some(event) = conn.shutdown(&mut self.transport) {
            self.emit(event, friend);
        }
    }

    fn execute(&mut self, friend: FriendId, actions: &[Action]) {
        for action in actions {
            match action {
                Action::Notify(event) => self.emit(*event, friend),
                Action::Delete => {
                    self.connections.remove(&friend);
                }
            }
        }
    }

    fn emit(&mut self, event: Event, friend: FriendId) {
        if let Some(handler) = self.handler.as_mut() {
            handler(event, friend);
        }
    }
}

impl<T: Transport, F: TapFactory, C: Clock> Drop for Bridge<T, F, C> {
    /// Best-effort close of every connection: each peer gets the terminal
    /// packet matching its connection's state.
    fn drop(&mut self) {
        for (_, mut conn) in self.connections.drain() {
            conn.shutdown(&mut self.transport);
        }
    }
}
