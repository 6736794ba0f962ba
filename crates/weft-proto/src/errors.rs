//! Error types for the weft wire format.
//!
//! All errors are structured, testable, and carry the offending values.

use thiserror::Error;

use crate::tags::PacketTag;

/// Errors raised while parsing, building, or reassembling packets.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Packet buffer is empty, so there is no tag byte to read
    #[error("empty packet: no tag byte")]
    EmptyPacket,

    /// First byte does not name a known packet type
    #[error("unknown packet tag: {0:#04x}")]
    UnknownTag(u8),

    /// Tag byte falls outside both transport send ranges
    #[error("tag {0:#04x} outside lossless [0xa0, 0xbf] and lossy [0xc8, 0xfe] ranges")]
    TagOutsideSendRange(u8),

    /// Typed accessor used on a packet of a different type
    #[error("packet is {actual:?}, expected {expected:?}")]
    WrongPacketType {
        /// Type the accessor requires
        expected: PacketTag,
        /// Type the packet actually carries
        actual: PacketTag,
    },

    /// IP proposal body must be exactly subnet + postfix
    #[error("ip proposal is {0} bytes on the wire, expected 3")]
    MalformedIpProposal(usize),

    /// Fragment shorter than its 4-byte header
    #[error("fragment too short: {0} bytes")]
    FragmentTooShort(usize),

    /// Reassembly has nothing to work with
    #[error("cannot reassemble an empty fragment set")]
    EmptyFragmentSet,

    /// Reassembly found a gap, duplicate, or foreign fragment in the set
    #[error("corrupted fragment set {splitted_index}: bad fragment at position {position}")]
    FragmentCorrupted {
        /// Splitted index shared by the set
        splitted_index: u8,
        /// Position in the sorted set where the sequence broke
        position: u8,
    },
}

/// Convenient Result type alias for wire format operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
