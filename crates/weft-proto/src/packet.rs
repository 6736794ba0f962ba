//! The packet type: one tag byte plus a type-specific body.
//!
//! A `Packet` is a pure data holder over a shared immutable buffer. The
//! named constructors mirror the ways packets come into existence: off the
//! transport, off the TAP device, or synthesized for the handshake.

use bytes::Bytes;

use crate::{
    errors::{ProtocolError, Result},
    frag::FRAGMENT_HEADER_LEN,
    tags::{DeliveryClass, PacketTag},
};

/// A single transport packet.
///
/// Layout on the wire: `[tag: 1 byte] + [body: variable]`. The body format
/// is determined by the tag (see [`PacketTag`]).
///
/// # Invariants
///
/// - Packets built by the typed constructors always carry a known tag.
/// - Packets built with [`Packet::from_wire`] may carry anything; the tag is
///   validated lazily by [`Packet::tag`] and the typed accessors.
///
/// Cloning is cheap: the buffer is reference-counted, never copied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    buf: Bytes,
}

impl Packet {
    /// Wrap a raw buffer received from the transport.
    ///
    /// No validation happens here; the tag byte is checked on first typed
    /// access so the multiplexer can route packets it may never parse.
    #[must_use]
    pub fn from_wire(bytes: &[u8]) -> Self {
        Self { buf: Bytes::copy_from_slice(bytes) }
    }

    /// Wrap an Ethernet frame read from the TAP device as a `Data` packet.
    #[must_use]
    pub fn from_tap_frame(frame: &[u8]) -> Self {
        let mut buf = Vec::with_capacity(frame.len() + 1);
        buf.push(PacketTag::Data.to_u8());
        buf.extend_from_slice(frame);
        Self { buf: buf.into() }
    }

    /// Build an `IpProposal` packet: `[0xA5][subnet][postfix]`.
    #[must_use]
    pub fn from_ip_proposal(subnet: u8, postfix: u8) -> Self {
        Self { buf: Bytes::from(vec![PacketTag::IpProposal.to_u8(), subnet, postfix]) }
    }

    /// Build a bare control packet carrying only the tag.
    #[must_use]
    pub fn from_tag(tag: PacketTag) -> Self {
        Self { buf: Bytes::from(vec![tag.to_u8()]) }
    }

    pub(crate) fn from_vec(buf: Vec<u8>) -> Self {
        Self { buf: buf.into() }
    }

    /// The packet type.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::EmptyPacket`] for a zero-length buffer and
    /// [`ProtocolError::UnknownTag`] when the first byte names no known
    /// packet type.
    pub fn tag(&self) -> Result<PacketTag> {
        let first = *self.buf.first().ok_or(ProtocolError::EmptyPacket)?;
        PacketTag::from_u8(first).ok_or(ProtocolError::UnknownTag(first))
    }

    /// The full serialized form, tag byte included.
    #[must_use]
    pub fn wire(&self) -> &[u8] {
        &self.buf
    }

    /// Serialized length in bytes.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        self.buf.len()
    }

    /// The body after the tag byte. For a `Data` packet this is the
    /// Ethernet frame to hand to the TAP device.
    #[must_use]
    pub fn frame_payload(&self) -> &[u8] {
        if self.buf.len() <= 1 {
            &[]
        } else {
            &self.buf[1..]
        }
    }

    /// The `(subnet, postfix)` pair of an `IpProposal` packet.
    ///
    /// # Errors
    ///
    /// Fails when the packet is not an `IpProposal` or its body is not
    /// exactly two bytes.
    pub fn ip_proposal(&self) -> Result<(u8, u8)> {
        self.expect_tag(PacketTag::IpProposal)?;
        if self.buf.len() != 3 {
            return Err(ProtocolError::MalformedIpProposal(self.buf.len()));
        }
        Ok((self.buf[1], self.buf[2]))
    }

    /// The splitted index shared by all fragments of one logical packet.
    ///
    /// # Errors
    ///
    /// Fails when the packet is not a `Fragment` or is shorter than the
    /// fragment header.
    pub fn splitted_index(&self) -> Result<u8> {
        self.fragment_header_byte(1)
    }

    /// This fragment's position within its set.
    ///
    /// # Errors
    ///
    /// Fails when the packet is not a `Fragment` or is shorter than the
    /// fragment header.
    pub fn fragment_index(&self) -> Result<u8> {
        self.fragment_header_byte(2)
    }

    /// The total number of fragments in this fragment's set.
    ///
    /// # Errors
    ///
    /// Fails when the packet is not a `Fragment` or is shorter than the
    /// fragment header.
    pub fn fragments_count(&self) -> Result<u8> {
        self.fragment_header_byte(3)
    }

    /// Whether this packet is a structurally sound fragment: `Fragment` tag
    /// and at least the 4-byte header. Malformed fragments are dropped
    /// silently by reassembly.
    #[must_use]
    pub fn is_valid_fragment(&self) -> bool {
        self.tag() == Ok(PacketTag::Fragment) && self.buf.len() >= FRAGMENT_HEADER_LEN
    }

    /// Which transport primitive must carry this packet.
    ///
    /// # Errors
    ///
    /// Fails for empty buffers and for tag bytes in neither send range.
    pub fn delivery_class(&self) -> Result<DeliveryClass> {
        let first = *self.buf.first().ok_or(ProtocolError::EmptyPacket)?;
        DeliveryClass::for_tag(first)
    }

    fn fragment_header_byte(&self, offset: usize) -> Result<u8> {
        self.expect_tag(PacketTag::Fragment)?;
        self.buf
            .get(offset)
            .copied()
            .ok_or(ProtocolError::FragmentTooShort(self.buf.len()))
    }

    fn expect_tag(&self, expected: PacketTag) -> Result<()> {
        let actual = self.tag()?;
        if actual != expected {
            return Err(ProtocolError::WrongPacketType { expected, actual });
        }
        Ok(())
    }
}
