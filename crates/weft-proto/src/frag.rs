//! Fragmentation and reassembly.
//!
//! The transport caps its packets at a small maximum size, well below a
//! full Ethernet frame. Oversized packets are split into `Fragment` packets
//! whose concatenated payloads reconstruct the original wire form, tag byte
//! included. Fragments travel best-effort and may arrive in any order; the
//! [`Reassembler`] buckets them per splitted index and reassembles once a
//! bucket holds the full set.

use std::collections::HashMap;

use crate::{
    errors::{ProtocolError, Result},
    packet::Packet,
    tags::PacketTag,
};

/// Bytes of header on every fragment:
/// `[tag][splitted_index][fragment_index][fragments_count]`.
pub const FRAGMENT_HEADER_LEN: usize = 4;

impl Packet {
    /// Split this packet's wire form into `Fragment` packets that each fit
    /// `max_packet` bytes on the wire.
    ///
    /// All fragments but the last carry exactly `max_packet -
    /// FRAGMENT_HEADER_LEN` payload bytes; the last carries the remainder.
    /// Fragments are returned in index order and all share `splitted_index`.
    #[must_use]
    pub fn split(&self, splitted_index: u8, max_packet: usize) -> Vec<Packet> {
        let payload_per_fragment = max_packet - FRAGMENT_HEADER_LEN;
        let wire = self.wire();
        let count = wire.len().div_ceil(payload_per_fragment);
        debug_assert!(count <= usize::from(u8::MAX), "fragment count must fit one byte");

        let mut fragments = Vec::with_capacity(count);
        for (index, chunk) in wire.chunks(payload_per_fragment).enumerate() {
            let mut buf = Vec::with_capacity(FRAGMENT_HEADER_LEN + chunk.len());
            buf.push(PacketTag::Fragment.to_u8());
            buf.push(splitted_index);
            buf.push(index as u8);
            buf.push(count as u8);
            buf.extend_from_slice(chunk);
            fragments.push(Packet::from_vec(buf));
        }
        fragments
    }

    /// Reassemble a complete fragment set into the original packet.
    ///
    /// The set is sorted by fragment index; the indices must then read
    /// exactly `0, 1, …, N-1` with `N` matching every fragment's announced
    /// count, and all fragments must share one splitted index.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::FragmentCorrupted`] when the sequence has a
    /// gap, a duplicate, a count mismatch, or a foreign fragment; the set
    /// is unrecoverable and must be discarded. Structurally broken fragments
    /// fail with their own errors.
    pub fn reassemble(mut fragments: Vec<Packet>) -> Result<Packet> {
        let first = fragments.first().ok_or(ProtocolError::EmptyFragmentSet)?;
        let splitted_index = first.splitted_index()?;
        let count = first.fragments_count()?;

        for fragment in &fragments {
            if !fragment.is_valid_fragment() {
                return Err(ProtocolError::FragmentTooShort(fragment.wire_len()));
            }
        }

        if fragments.len() != usize::from(count) {
            return Err(ProtocolError::FragmentCorrupted {
                splitted_index,
                position: count,
            });
        }

        fragments.sort_by_key(|fragment| fragment.wire()[2]);

        let total: usize = fragments
            .iter()
            .map(|fragment| fragment.wire_len() - FRAGMENT_HEADER_LEN)
            .sum();
        let mut buf = Vec::with_capacity(total);
        for (position, fragment) in fragments.iter().enumerate() {
            let foreign = fragment.wire()[1] != splitted_index;
            let out_of_sequence = usize::from(fragment.wire()[2]) != position;
            if foreign || out_of_sequence {
                return Err(ProtocolError::FragmentCorrupted {
                    splitted_index,
                    position: position as u8,
                });
            }
            buf.extend_from_slice(&fragment.wire()[FRAGMENT_HEADER_LEN..]);
        }

        Ok(Packet::from_vec(buf))
    }
}

/// Per-peer bookkeeping for in-flight fragment sets.
///
/// Buckets fragments by splitted index. A bucket completes when it holds as
/// many fragments as the set announces; the reassembled packet is returned
/// for immediate dispatch. Completing a set also ages out the three buckets
/// half the index space ahead (`+128, +129, +130` mod 256), so a dead
/// partial set cannot be revived when the 8-bit index wraps around.
#[derive(Debug, Default)]
pub struct Reassembler {
    buckets: HashMap<u8, Vec<Packet>>,
}

impl Reassembler {
    /// Create an empty reassembler.
    #[must_use]
    pub fn new() -> Self {
        Self { buckets: HashMap::new() }
    }

    /// Buffer one inbound fragment.
    ///
    /// Returns `Ok(Some(packet))` when the fragment completes its set,
    /// `Ok(None)` when the set is still incomplete. Packets that are not
    /// structurally valid fragments are dropped silently.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::FragmentCorrupted`] when a completed set
    /// fails verification; the bucket is already discarded, so the error is
    /// recoverable and later sets are unaffected.
    pub fn insert(&mut self, fragment: Packet) -> Result<Option<Packet>> {
        if !fragment.is_valid_fragment() {
            return Ok(None);
        }

        let splitted_index = fragment.splitted_index()?;
        let count = fragment.fragments_count()?;

        let bucket = self.buckets.entry(splitted_index).or_default();
        bucket.push(fragment);
        if bucket.len() != usize::from(count) {
            return Ok(None);
        }

        let complete = self.buckets.remove(&splitted_index).unwrap_or_default();
        for offset in 128u16..131 {
            let stale = ((u16::from(splitted_index) + offset) % 256) as u8;
            self.buckets.remove(&stale);
        }

        Packet::reassemble(complete).map(Some)
    }

    /// Number of fragment sets still waiting for fragments.
    #[must_use]
    pub fn pending_sets(&self) -> usize {
        self.buckets.len()
    }
}
