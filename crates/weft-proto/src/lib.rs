//! # Weft Protocol: Wire Format
//!
//! This crate implements the packet layer for weft, a system that bridges a
//! local layer-2 TAP device to remote peers over a friend-to-friend message
//! transport.
//!
//! ## Protocol Design
//!
//! Every packet is a contiguous byte buffer whose first byte is its type tag:
//!
//! - **Control tags** (`0xA0..=0xA7`) drive the connection handshake and
//!   teardown. They travel over the transport's lossless primitive.
//! - **Payload tags** (`Data = 0xC8`, `Fragment = 0xC9`) carry Ethernet
//!   frames and travel over the lossy primitive.
//!
//! The transport imposes a small maximum packet size, so packets whose wire
//! form exceeds it are split into `Fragment` packets with a 4-byte header
//! (`tag`, `splitted_index`, `fragment_index`, `fragments_count`) and
//! reassembled on the receiving side. Fragments of one logical packet share a
//! `splitted_index`; the receiver buckets them per index and tolerates
//! arbitrary arrival order.
//!
//! ## Implementation Notes
//!
//! - **Cheap clones**: packet buffers are [`bytes::Bytes`], so cloning a
//!   packet is a reference-count bump, never a copy.
//! - **Lazy tag validation**: packets built from an inbound transport buffer
//!   validate their tag on first typed access, not on construction. The
//!   multiplexer can route on the raw byte without paying for validation of
//!   packets it will drop.
//! - **Explicit validation**: typed accessors return `Result` and reject
//!   packets of the wrong type. There are no unchecked fast paths.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod frag;
pub mod packet;
pub mod tags;

pub use errors::{ProtocolError, Result};
pub use frag::{Reassembler, FRAGMENT_HEADER_LEN};
pub use packet::Packet;
pub use tags::{DeliveryClass, PacketTag};
