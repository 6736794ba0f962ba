//! Error types for the weft core.
//!
//! Failures fall into three kinds with distinct recovery policies, exposed
//! through [`Severity`]: construction failures surface to the caller,
//! protocol violations reset the affected connection, and one-off transport
//! or TAP hiccups are retried on the next iterate.

use thiserror::Error;
use weft_proto::{DeliveryClass, ProtocolError};

use crate::transport::FriendId;

/// How a failure is recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Initialisation failed; the operation cannot succeed on retry
    Permanent,
    /// A protocol invariant was violated; the affected connection is reset
    Critical,
    /// One send or read failed; abandoned now, retried on the next iterate
    Transient,
}

/// Errors reported by TAP device backends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TapError {
    /// The platform device could not be created
    #[error("failed to open tap device: {0}")]
    Open(String),

    /// Address or MTU configuration was refused by the host
    #[error("failed to configure tap device: {0}")]
    Configure(String),

    /// A frame read or write failed
    #[error("tap i/o error: {0}")]
    Io(String),
}

impl TapError {
    /// Recovery policy for this failure.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::Open(_) | Self::Configure(_) => Severity::Permanent,
            Self::Io(_) => Severity::Transient,
        }
    }
}

/// A transport send that the substrate refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{class:?} send to friend {friend} failed")]
pub struct TransportError {
    /// Peer the packet was addressed to
    pub friend: FriendId,
    /// Delivery class of the refused send
    pub class: DeliveryClass,
}

impl TransportError {
    /// Build a send failure for the given peer and class.
    #[must_use]
    pub fn new(friend: FriendId, class: DeliveryClass) -> Self {
        Self { friend, class }
    }
}

/// Errors surfaced by the public bridge operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// A connection to this friend already exists
    #[error("already connected or connecting to friend {0}")]
    DuplicateConnection(FriendId),

    /// No connection exists for this friend
    #[error("no connection to friend {0}")]
    UnknownConnection(FriendId),

    /// The connection is not in a state that permits the operation
    #[error("connection to friend {friend} cannot {operation} in its current state")]
    InvalidState {
        /// Peer whose connection refused the operation
        friend: FriendId,
        /// The refused operation
        operation: &'static str,
    },

    /// A TAP backend failure
    #[error(transparent)]
    Tap(#[from] TapError),

    /// A transport send failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A wire format violation
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl BridgeError {
    /// Recovery policy for this failure.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::DuplicateConnection(_) | Self::UnknownConnection(_) => Severity::Permanent,
            Self::InvalidState { .. } => Severity::Critical,
            Self::Tap(err) => err.severity(),
            Self::Transport(_) => Severity::Transient,
            Self::Protocol(_) => Severity::Critical,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_failures_are_permanent() {
        let err = BridgeError::from(TapError::Open("no /dev/net/tun".into()));
        assert_eq!(err.severity(), Severity::Permanent);
    }

    #[test]
    fn io_failures_are_transient() {
        assert_eq!(TapError::Io("interrupted".into()).severity(), Severity::Transient);

        let err = BridgeError::from(TransportError::new(3, DeliveryClass::Lossy));
        assert_eq!(err.severity(), Severity::Transient);
    }

    #[test]
    fn protocol_violations_are_critical() {
        let err = BridgeError::from(ProtocolError::UnknownTag(0x42));
        assert_eq!(err.severity(), Severity::Critical);

        let err = BridgeError::InvalidState { friend: 1, operation: "accept" };
        assert_eq!(err.severity(), Severity::Critical);
    }
}
