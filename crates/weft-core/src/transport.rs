//! Message transport abstraction.
//!
//! The transport is a peer-to-peer messaging substrate that delivers short
//! custom packets to peers identified by an opaque friend handle. It offers
//! two delivery classes, lossless (reliable, ordered) and lossy
//! (best-effort, unordered), and caps the packet size; the wire layer
//! fragments anything larger.
//!
//! Inbound delivery is host-driven: the host forwards its transport's
//! receive callback into [`Bridge::receive`](crate::Bridge::receive). All
//! access is single-threaded.

use std::time::Duration;

use crate::error::TransportError;

/// Opaque peer identifier assigned by the transport.
pub type FriendId = u32;

/// The peer-to-peer messaging substrate the bridge sends through.
pub trait Transport {
    /// Send one packet reliably and in order.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the substrate refuses the packet
    /// (peer offline, queue full, packet oversized).
    fn send_lossless(&mut self, friend: FriendId, packet: &[u8]) -> Result<(), TransportError>;

    /// Send one packet best-effort.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the substrate refuses the packet.
    fn send_lossy(&mut self, friend: FriendId, packet: &[u8]) -> Result<(), TransportError>;

    /// The substrate's own main-loop cadence hint.
    fn iteration_interval(&self) -> Duration;

    /// Maximum packet size the substrate accepts, in bytes.
    fn max_packet_size(&self) -> usize;

    /// The UDP source port of the substrate's own socket, consumed by the
    /// self-loop filter.
    fn udp_port(&self) -> u16;
}
