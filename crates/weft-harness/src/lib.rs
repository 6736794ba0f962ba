//! Deterministic test harness for the weft bridging protocol.
//!
//! Real deployments hook the bridge to a platform TAP device and a live
//! peer-to-peer transport. Neither is controllable enough for protocol
//! tests, so this crate supplies in-memory stand-ins:
//!
//! - [`SimTap`] / [`SimTapFactory`]: a scripted TAP device with injectable
//!   frames, captured writes, and a configurable set of used subnets.
//! - [`SimTransport`]: captures every outbound packet with its delivery
//!   class instead of sending it, with per-class failure injection.
//! - [`SimClock`]: virtual time that only advances when told to.
//! - [`TestNet`]: two bridges wired back to back, with helpers to shuttle
//!   captured packets across and record emitted events.
//!
//! Everything is single-threaded and deterministic: a test that fails once
//! fails every time.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod net;
pub mod sim_clock;
pub mod sim_tap;
pub mod sim_transport;

pub use net::{EventLog, Side, TestNet, PEER_A, PEER_B};
pub use sim_clock::SimClock;
pub use sim_tap::{SimTap, SimTapFactory};
pub use sim_transport::{SentPacket, SimTransport};
