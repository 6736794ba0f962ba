//! Per-peer connection state machine.
//!
//! A connection walks a three-phase handshake before any frame is
//! forwarded: the transport-level request/accept, then IP negotiation in
//! which the initiator proposes `192.168.<subnet>.0/24` subnets until the
//! responder finds one free on its host. The initiator always ends up with
//! postfix `1`, the responder with `2`.
//!
//! # State Machine
//!
//! ```text
//! initiator                               responder
//! ┌───────────────────┐ ConnectionAccept  ┌──────────────────────┐
//! │ OwnRequestPending │◄──────────────────│ FriendRequestPending │
//! └───────────────────┘                   └──────────────────────┘
//!          │ IpProposal(s, 2)                    │ user accept()
//!          ▼                                     ▼
//! ┌───────────────────┐ IpReject / retry  ┌──────────────────────┐
//! │ ExpectingIpConfirm│◄─────────────────►│ ExpectingIp          │
//! └───────────────────┘ IpAccept          └──────────────────────┘
//!          │                                     │
//!          ▼                                     ▼
//!     ┌───────────┐     Data / Fragment     ┌───────────┐
//!     │ Connected │◄───────────────────────►│ Connected │
//!     └───────────┘                         └───────────┘
//! ```
//!
//! Anything unexpected answers with `ConnectionReset` and tears the
//! connection down; `Deleting` is a transient flag that keeps teardown from
//! re-emitting packets.
//!
//! # Action Pattern
//!
//! Steps send through a `&mut Transport` parameter so send failures feed
//! the compensation rules synchronously, but everything the bridge must do
//! on the step's behalf (fire an event, remove the connection) comes back
//! as [`Action`]s. Connections hold no reference to the bridge.

use std::time::Duration;

use weft_proto::{DeliveryClass, Packet, PacketTag, Reassembler};

use crate::{
    clock::Clock,
    error::TransportError,
    filter,
    tap::TapDevice,
    transport::{FriendId, Transport},
};

/// Events surfaced to the host's event handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A peer asked to connect; answer with accept or reject
    Requested,
    /// The handshake finished and the private addresses are assigned
    Accepted,
    /// The peer declined our connection request
    Rejected,
    /// The connection is gone: remote close, reset, or local failure
    Closed,
}

/// Connection state as seen through the public state query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// Handshake complete, frames are being forwarded
    Connected,
    /// We initiated and the peer has not finished answering
    RingingAtFriend,
    /// The peer initiated and we have not finished answering
    FriendIsRinging,
    /// No connection to this peer
    Disconnected,
}

/// What the bridge must do after a state machine step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    /// Fire the event handler
    Notify(Event),
    /// Remove the connection from the bridge's map
    Delete,
}

/// Why a user-level accept was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AcceptError {
    /// The connection is not waiting on an inbound request
    InvalidState,
    /// The accept packet could not be sent
    Transport(TransportError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    OwnRequestPending,
    FriendRequestPending,
    ExpectingIp,
    ExpectingIpConfirm,
    Connected,
    Deleting,
}

pub(crate) struct Connection<D: TapDevice> {
    friend: FriendId,
    state: State,
    tap: D,
    next_fragment_index: u8,
    last_proposed_subnet: i16,
    reassembler: Reassembler,
}

impl<D: TapDevice> Connection<D> {
    /// Create the initiating side and send the connection request.
    pub(crate) fn initiate<T: Transport>(
        friend: FriendId,
        tap: D,
        transport: &mut T,
    ) -> Result<Self, TransportError> {
        let mut conn = Self::new(friend, tap, State::OwnRequestPending);
        conn.send(Packet::from_tag(PacketTag::ConnectionRequest), transport)?;
        tracing::debug!(friend, "sent connection request");
        Ok(conn)
    }

    /// Create the responding side for an inbound connection request.
    pub(crate) fn respond(friend: FriendId, tap: D) -> Self {
        Self::new(friend, tap, State::FriendRequestPending)
    }

    fn new(friend: FriendId, tap: D, state: State) -> Self {
        Self {
            friend,
            state,
            tap,
            next_fragment_index: 0,
            last_proposed_subnet: -1,
            reassembler: Reassembler::new(),
        }
    }

    pub(crate) fn peer_state(&self) -> PeerState {
        match self.state {
            State::Connected => PeerState::Connected,
            State::OwnRequestPending | State::ExpectingIpConfirm => PeerState::RingingAtFriend,
            State::FriendRequestPending | State::ExpectingIp => PeerState::FriendIsRinging,
            State::Deleting => PeerState::Disconnected,
        }
    }

    /// Feed one inbound packet through the state machine.
    pub(crate) fn handle<T: Transport>(&mut self, packet: Packet, transport: &mut T) -> Vec<Action> {
        let tag = match packet.tag() {
            Ok(tag) => tag,
            Err(err) => {
                tracing::debug!(friend = self.friend, %err, "malformed packet, resetting");
                return self.reset(transport);
            }
        };

        match (self.state, tag) {
            (State::OwnRequestPending, PacketTag::ConnectionAccept) => {
                tracing::debug!(friend = self.friend, "request accepted, negotiating subnet");
                self.state = State::ExpectingIpConfirm;
                self.propose_next_subnet(transport)
            }
            (State::OwnRequestPending, PacketTag::ConnectionReject) => {
                tracing::debug!(friend = self.friend, "request rejected");
                self.state = State::Deleting;
                vec![Action::Notify(Event::Rejected), Action::Delete]
            }
            (_, PacketTag::ConnectionReset) => {
                tracing::debug!(friend = self.friend, "reset by peer");
                self.state = State::Deleting;
                vec![Action::Notify(Event::Closed), Action::Delete]
            }
            (State::ExpectingIp, PacketTag::IpProposal) => {
                self.handle_ip_proposal(&packet, transport)
            }
            (State::ExpectingIpConfirm, PacketTag::IpAccept) => self.handle_ip_accept(),
            (State::ExpectingIpConfirm, PacketTag::IpReject) => {
                tracing::debug!(friend = self.friend, "subnet rejected, proposing another");
                self.propose_next_subnet(transport)
            }
            (State::Connected, PacketTag::Data) => {
                if let Err(err) = self.tap.write_frame(packet.frame_payload()) {
                    tracing::error!(friend = self.friend, %err, "tap write failed");
                }
                Vec::new()
            }
            (State::Connected, PacketTag::Fragment) => self.handle_fragment(packet, transport),
            (State::Connected, PacketTag::ConnectionClose) => {
                tracing::debug!(friend = self.friend, "closed by peer");
                self.state = State::Deleting;
                vec![Action::Notify(Event::Closed), Action::Delete]
            }
            (state, tag) => {
                tracing::debug!(friend = self.friend, ?state, ?tag, "unexpected packet, resetting");
                self.reset(transport)
            }
        }
    }

    /// Accept a pending inbound request: send `ConnectionAccept` and wait
    /// for the peer's subnet proposal.
    pub(crate) fn accept<T: Transport>(&mut self, transport: &mut T) -> Result<(), AcceptError> {
        if self.state != State::FriendRequestPending {
            return Err(AcceptError::InvalidState);
        }
        self.state = State::ExpectingIp;
        self.send(Packet::from_tag(PacketTag::ConnectionAccept), transport)
            .map_err(AcceptError::Transport)?;
        tracing::debug!(friend = self.friend, "accepted connection request");
        Ok(())
    }

    /// Reset the connection: best-effort `ConnectionReset` to the peer,
    /// `Closed` to the host, removal from the map.
    pub(crate) fn reset<T: Transport>(&mut self, transport: &mut T) -> Vec<Action> {
        if self.state == State::Deleting {
            return vec![Action::Delete];
        }
        self.send_terminal(PacketTag::ConnectionReset, transport);
        self.state = State::Deleting;
        vec![Action::Notify(Event::Closed), Action::Delete]
    }

    /// Observe the current state and emit the matching terminal packet,
    /// best-effort. Returns the event the bridge should fire, if any.
    pub(crate) fn shutdown<T: Transport>(&mut self, transport: &mut T) -> Option<Event> {
        let event = match self.state {
            State::FriendRequestPending => {
                self.send_terminal(PacketTag::ConnectionReject, transport);
                None
            }
            State::OwnRequestPending | State::ExpectingIp | State::ExpectingIpConfirm => {
                self.send_terminal(PacketTag::ConnectionReset, transport);
                Some(Event::Closed)
            }
            State::Connected => {
                self.send_terminal(PacketTag::ConnectionClose, transport);
                None
            }
            State::Deleting => None,
        };
        self.state = State::Deleting;
        event
    }

    /// Forward pending TAP frames to the peer until the time budget runs
    /// out. Transport refusals pause forwarding until the next tick.
    pub(crate) fn pump<T: Transport, C: Clock>(
        &mut self,
        budget: Duration,
        transport: &mut T,
        clock: &C,
    ) {
        let start = clock.now();
        let udp_port = transport.udp_port();

        while self.state == State::Connected && self.tap.data_pending() {
            if clock.now() - start > budget {
                break;
            }

            let frame = match self.tap.read_frame() {
                Ok(frame) => frame,
                Err(err) => {
                    tracing::error!(friend = self.friend, %err, "tap read failed");
                    break;
                }
            };

            if filter::is_own_transport_frame(&frame, udp_port) {
                tracing::error!(
                    friend = self.friend,
                    "dropping frame sent from our own transport socket"
                );
                continue;
            }

            if let Err(err) = self.send(Packet::from_tap_frame(&frame), transport) {
                tracing::debug!(friend = self.friend, %err, "forwarding paused until next tick");
                break;
            }
        }
    }

    fn handle_ip_proposal<T: Transport>(&mut self, packet: &Packet, transport: &mut T) -> Vec<Action> {
        let (subnet, postfix) = match packet.ip_proposal() {
            Ok(parts) => parts,
            Err(err) => {
                tracing::error!(friend = self.friend, %err, "invalid ip proposal");
                return Vec::new();
            }
        };

        if self.subnet_unused(subnet) {
            tracing::debug!(friend = self.friend, subnet, "proposed subnet is free");
            if let Err(err) = self.send(Packet::from_tag(PacketTag::IpAccept), transport) {
                tracing::debug!(friend = self.friend, %err, "ip accept undeliverable");
                return self.reset(transport);
            }
            self.assign_ip(subnet, postfix)
        } else {
            tracing::debug!(friend = self.friend, subnet, "proposed subnet in use");
            if let Err(err) = self.send(Packet::from_tag(PacketTag::IpReject), transport) {
                tracing::debug!(friend = self.friend, %err, "ip reject undeliverable");
                return self.reset(transport);
            }
            Vec::new()
        }
    }

    fn handle_ip_accept(&mut self) -> Vec<Action> {
        // Reaching ExpectingIpConfirm implies at least one proposal went out.
        let subnet = self.last_proposed_subnet.clamp(0, 255) as u8;
        self.assign_ip(subnet, 1)
    }

    /// Scan for the next locally unused subnet and propose it. Exhausting
    /// all 256 subnets resets the connection.
    fn propose_next_subnet<T: Transport>(&mut self, transport: &mut T) -> Vec<Action> {
        loop {
            let next = self.last_proposed_subnet + 1;
            if next > 255 {
                tracing::error!(friend = self.friend, "no free subnet available");
                return self.reset(transport);
            }
            self.last_proposed_subnet = next;
            if self.subnet_unused(next as u8) {
                break;
            }
        }

        let subnet = self.last_proposed_subnet as u8;
        tracing::debug!(friend = self.friend, subnet, "proposing subnet");
        match self.send(Packet::from_ip_proposal(subnet, 2), transport) {
            Ok(()) => Vec::new(),
            Err(err) => {
                tracing::debug!(friend = self.friend, %err, "ip proposal undeliverable");
                self.reset(transport)
            }
        }
    }

    fn handle_fragment<T: Transport>(&mut self, packet: Packet, transport: &mut T) -> Vec<Action> {
        match self.reassembler.insert(packet) {
            Ok(Some(reassembled)) => self.handle(reassembled, transport),
            Ok(None) => Vec::new(),
            Err(err) => {
                tracing::debug!(friend = self.friend, %err, "abandoning fragment set");
                Vec::new()
            }
        }
    }

    fn subnet_unused(&self, subnet: u8) -> bool {
        match self.tap.is_subnet_unused(subnet) {
            Ok(unused) => unused,
            Err(err) => {
                tracing::error!(
                    friend = self.friend,
                    %err,
                    "cannot check subnet usage, assuming unused"
                );
                true
            }
        }
    }

    fn assign_ip(&mut self, subnet: u8, postfix: u8) -> Vec<Action> {
        if let Err(err) = self.tap.set_ip(subnet, postfix) {
            tracing::error!(
                friend = self.friend,
                subnet,
                postfix,
                %err,
                "cannot assign 192.168.{subnet}.{postfix}"
            );
            return Vec::new();
        }
        tracing::debug!(friend = self.friend, subnet, postfix, "ip assigned");
        self.state = State::Connected;
        vec![Action::Notify(Event::Accepted)]
    }

    fn send<T: Transport>(
        &mut self,
        packet: Packet,
        transport: &mut T,
    ) -> Result<(), TransportError> {
        let limit = transport.max_packet_size();
        if packet.wire_len() <= limit {
            return send_single(transport, self.friend, &packet);
        }

        tracing::debug!(
            friend = self.friend,
            len = packet.wire_len(),
            "packet exceeds transport limit, splitting"
        );
        let index = self.next_fragment_index;
        self.next_fragment_index = self.next_fragment_index.wrapping_add(1);
        for fragment in packet.split(index, limit) {
            send_single(transport, self.friend, &fragment)?;
        }
        Ok(())
    }

    fn send_terminal<T: Transport>(&mut self, tag: PacketTag, transport: &mut T) {
        if let Err(err) = self.send(Packet::from_tag(tag), transport) {
            tracing::debug!(friend = self.friend, ?tag, %err, "terminal packet undeliverable");
        }
    }
}

fn send_single<T: Transport>(
    transport: &mut T,
    friend: FriendId,
    packet: &Packet,
) -> Result<(), TransportError> {
    let class = match packet.delivery_class() {
        Ok(class) => class,
        // Outbound packets are always built from named tags.
        Err(err) => unreachable!("outbound packet without delivery class: {err}"),
    };
    match class {
        DeliveryClass::Lossless => transport.send_lossless(friend, packet.wire()),
        DeliveryClass::Lossy => transport.send_lossy(friend, packet.wire()),
    }
}

/// Answer a peer we hold no connection for with a best-effort reset.
pub(crate) fn reset_peer<T: Transport>(friend: FriendId, transport: &mut T) {
    let packet = Packet::from_tag(PacketTag::ConnectionReset);
    if let Err(err) = transport.send_lossless(friend, packet.wire()) {
        tracing::debug!(friend, %err, "reset undeliverable");
    }
}
