//! In-memory transport that captures sends instead of delivering them.

use std::{cell::RefCell, collections::VecDeque, rc::Rc, time::Duration};

use weft_core::{FriendId, Transport, TransportError};
use weft_proto::DeliveryClass;

/// One packet the bridge handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPacket {
    /// Peer the packet was addressed to
    pub friend: FriendId,
    /// Primitive the bridge chose
    pub class: DeliveryClass,
    /// Full wire form, tag byte included
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
struct TransportState {
    sent: VecDeque<SentPacket>,
    fail_lossless: bool,
    fail_lossy: bool,
    iteration_interval: Duration,
    max_packet_size: usize,
    udp_port: u16,
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            sent: VecDeque::new(),
            fail_lossless: false,
            fail_lossy: false,
            iteration_interval: Duration::from_millis(50),
            max_packet_size: 1024,
            udp_port: 33445,
        }
    }
}

/// A simulated friend-to-friend transport.
///
/// Sends are captured with their delivery class for the test to inspect or
/// shuttle to a peer bridge. Defaults mirror a typical substrate: 50 ms
/// iteration interval, 1024-byte packet limit, UDP port 33445.
///
/// Clones share state, so the handle the bridge owns and the handle the
/// test keeps observe the same queues.
#[derive(Debug, Clone, Default)]
pub struct SimTransport {
    state: Rc<RefCell<TransportState>>,
}

impl SimTransport {
    /// Create a transport with default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain every captured packet in send order.
    #[must_use]
    pub fn take_sent(&self) -> Vec<SentPacket> {
        self.state.borrow_mut().sent.drain(..).collect()
    }

    /// Make subsequent lossless sends fail.
    pub fn fail_lossless(&self, fail: bool) {
        self.state.borrow_mut().fail_lossless = fail;
    }

    /// Make subsequent lossy sends fail.
    pub fn fail_lossy(&self, fail: bool) {
        self.state.borrow_mut().fail_lossy = fail;
    }

    /// Change the advertised iteration interval.
    pub fn set_iteration_interval(&self, interval: Duration) {
        self.state.borrow_mut().iteration_interval = interval;
    }

    /// Change the advertised maximum packet size.
    pub fn set_max_packet_size(&self, size: usize) {
        self.state.borrow_mut().max_packet_size = size;
    }

    /// Change the advertised UDP port.
    pub fn set_udp_port(&self, port: u16) {
        self.state.borrow_mut().udp_port = port;
    }
}

impl Transport for SimTransport {
    fn send_lossless(&mut self, friend: FriendId, packet: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        if state.fail_lossless {
            return Err(TransportError::new(friend, DeliveryClass::Lossless));
        }
        state.sent.push_back(SentPacket {
            friend,
            class: DeliveryClass::Lossless,
            bytes: packet.to_vec(),
        });
        Ok(())
    }

    fn send_lossy(&mut self, friend: FriendId, packet: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        if state.fail_lossy {
            return Err(TransportError::new(friend, DeliveryClass::Lossy));
        }
        state.sent.push_back(SentPacket {
            friend,
            class: DeliveryClass::Lossy,
            bytes: packet.to_vec(),
        });
        Ok(())
    }

    fn iteration_interval(&self) -> Duration {
        self.state.borrow().iteration_interval
    }

    fn max_packet_size(&self) -> usize {
        self.state.borrow().max_packet_size
    }

    fn udp_port(&self) -> u16 {
        self.state.borrow().udp_port
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_sends_with_their_class() {
        let mut transport = SimTransport::new();
        transport.send_lossless(1, &[0xA0]).unwrap();
        transport.send_lossy(1, &[0xC8, 9]).unwrap();

        let sent = transport.take_sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].class, DeliveryClass::Lossless);
        assert_eq!(sent[0].bytes, vec![0xA0]);
        assert_eq!(sent[1].class, DeliveryClass::Lossy);
        assert!(transport.take_sent().is_empty());
    }

    #[test]
    fn failure_injection_is_per_class() {
        let mut transport = SimTransport::new();
        transport.fail_lossy(true);

        assert!(transport.send_lossless(2, &[0xA0]).is_ok());
        assert!(transport.send_lossy(2, &[0xC8]).is_err());

        transport.fail_lossy(false);
        assert!(transport.send_lossy(2, &[0xC8]).is_ok());
    }
}
