//! Weft protocol core logic
//!
//! This crate contains the per-peer connection state machine and the
//! multiplexer that bridges a local TAP device to remote peers over a
//! friend-to-friend message transport.
//!
//! # Architecture
//!
//! The core is pure protocol logic driven from the host's main loop. All
//! I/O goes through three traits the host supplies:
//!
//! ```text
//!      ┌─────────────────────────────┐
//!      │ weft-core                   │
//!      │ - Connection state machine  │
//!      │ - Bridge (multiplexer)      │
//!      │ - Self-loop filter          │
//!      └─────────────────────────────┘
//!        ↓              ↓         ↓
//!   TapDevice      Transport    Clock
//!   (platform      (friend-to-  (time
//!    TAP backend)   friend       source)
//!                   messaging)
//! ```
//!
//! # Key Principles
//!
//! - Single-threaded cooperative: the bridge is driven by repeated
//!   [`Bridge::iterate`] calls interleaved with the transport's own loop.
//!   Nothing blocks and nothing spawns.
//! - No back-pointers: connections request their own removal by returning
//!   an action from each state machine step; the bridge owns the map.
//! - Compensating failure handling: a failed send during a sensitive
//!   handshake step resets the connection; a failed send while forwarding
//!   data is retried on the next tick.
//!
//! # Modules
//!
//! - [`bridge`]: multiplexer, dispatch, and the cooperative scheduler
//! - [`connection`]: per-peer state machine (handshake, IP negotiation,
//!   forwarding, teardown)
//! - [`filter`]: self-loop detection for frames read from the TAP
//! - [`tap`]: TAP device and factory contracts
//! - [`transport`]: message transport contract
//! - [`clock`]: time abstraction
//! - [`error`]: error types and severity classification

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bridge;
pub mod clock;
pub mod connection;
pub mod error;
pub mod filter;
pub mod tap;
pub mod transport;

pub use bridge::Bridge;
pub use clock::{Clock, SystemClock};
pub use connection::{Event, PeerState};
pub use error::{BridgeError, Severity, TapError, TransportError};
pub use tap::{link_mtu, TapDevice, TapFactory};
pub use transport::{FriendId, Transport};
