//! Packet tags and transport delivery classes.
//!
//! The first byte of every packet is its tag. The tag determines the layout
//! of the rest of the buffer and which transport primitive carries the
//! packet: tags in `[0xA0, 0xBF]` are sent lossless (reliable, ordered),
//! tags in `[0xC8, 0xFE]` are sent lossy (best-effort, unordered). Anything
//! outside both ranges cannot be sent at all.

use crate::errors::{ProtocolError, Result};

/// Packet type tags.
///
/// # Representation
///
/// Tags are single bytes on the wire. The `#[repr(u8)]` ensures stable
/// numeric values for wire compatibility.
///
/// Unknown tags must be rejected explicitly: [`PacketTag::from_u8`] returns
/// `None` rather than guessing, and a packet with an unknown tag is a
/// protocol violation for the receiving connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketTag {
    /// Ask the peer to open a connection
    ConnectionRequest = 0xA0,
    /// Peer agreed; IP negotiation follows
    ConnectionAccept = 0xA1,
    /// Peer declined the request
    ConnectionReject = 0xA2,
    /// Graceful teardown of an established connection
    ConnectionClose = 0xA3,
    /// Abnormal teardown, also the answer to anything unexpected
    ConnectionReset = 0xA4,
    /// Proposed subnet and postfix: `[tag][subnet][postfix]`
    IpProposal = 0xA5,
    /// Proposal accepted, both sides may assign their addresses
    IpAccept = 0xA6,
    /// Proposed subnet is in use on the responder side
    IpReject = 0xA7,
    /// One Ethernet frame: `[tag][frame bytes]`
    Data = 0xC8,
    /// One piece of an oversized packet:
    /// `[tag][splitted_index][fragment_index][fragments_count][payload]`
    Fragment = 0xC9,
}

impl PacketTag {
    /// Convert to the raw wire byte
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Convert from a raw wire byte.
    ///
    /// Returns `None` if the byte doesn't correspond to a known tag.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0xA0 => Some(Self::ConnectionRequest),
            0xA1 => Some(Self::ConnectionAccept),
            0xA2 => Some(Self::ConnectionReject),
            0xA3 => Some(Self::ConnectionClose),
            0xA4 => Some(Self::ConnectionReset),
            0xA5 => Some(Self::IpProposal),
            0xA6 => Some(Self::IpAccept),
            0xA7 => Some(Self::IpReject),
            0xC8 => Some(Self::Data),
            0xC9 => Some(Self::Fragment),
            _ => None,
        }
    }

    /// The delivery class of this tag.
    #[must_use]
    pub fn delivery_class(self) -> DeliveryClass {
        match DeliveryClass::for_tag(self.to_u8()) {
            Ok(class) => class,
            Err(_) => unreachable!("every named tag sits in a send range"),
        }
    }
}

/// How a packet travels through the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryClass {
    /// Reliable, ordered delivery
    Lossless,
    /// Best-effort, unordered delivery
    Lossy,
}

impl DeliveryClass {
    /// Classify a raw tag byte.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::TagOutsideSendRange`] for bytes in neither
    /// send range. Asking for the class of such a byte is a programmer
    /// error on the sending side, so callers should treat this as fatal for
    /// the packet in question.
    pub fn for_tag(tag: u8) -> Result<Self> {
        match tag {
            0xA0..=0xBF => Ok(Self::Lossless),
            0xC8..=0xFE => Ok(Self::Lossy),
            _ => Err(ProtocolError::TagOutsideSendRange(tag)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_round_trip() {
        let tags = [
            PacketTag::ConnectionRequest,
            PacketTag::ConnectionAccept,
            PacketTag::ConnectionReject,
            PacketTag::ConnectionClose,
            PacketTag::ConnectionReset,
            PacketTag::IpProposal,
            PacketTag::IpAccept,
            PacketTag::IpReject,
            PacketTag::Data,
            PacketTag::Fragment,
        ];

        for tag in tags {
            assert_eq!(PacketTag::from_u8(tag.to_u8()), Some(tag));
        }
    }

    #[test]
    fn unknown_tags_rejected() {
        assert_eq!(PacketTag::from_u8(0x00), None);
        assert_eq!(PacketTag::from_u8(0xA8), None);
        assert_eq!(PacketTag::from_u8(0xFF), None);
    }

    #[test]
    fn delivery_class_covers_exactly_the_send_ranges() {
        for tag in 0..=u8::MAX {
            let class = DeliveryClass::for_tag(tag);
            match tag {
                0xA0..=0xBF => assert_eq!(class, Ok(DeliveryClass::Lossless)),
                0xC8..=0xFE => assert_eq!(class, Ok(DeliveryClass::Lossy)),
                _ => assert_eq!(class, Err(ProtocolError::TagOutsideSendRange(tag))),
            }
        }
    }

    #[test]
    fn control_tags_are_lossless_payload_tags_lossy() {
        assert_eq!(PacketTag::ConnectionRequest.delivery_class(), DeliveryClass::Lossless);
        assert_eq!(PacketTag::IpProposal.delivery_class(), DeliveryClass::Lossless);
        assert_eq!(PacketTag::Data.delivery_class(), DeliveryClass::Lossy);
        assert_eq!(PacketTag::Fragment.delivery_class(), DeliveryClass::Lossy);
    }
}
