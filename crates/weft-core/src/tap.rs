//! TAP device abstraction.
//!
//! A TAP device is a layer-2 virtual network interface; reads and writes
//! carry raw Ethernet frames. The platform backends (Linux, Windows, …)
//! live outside this crate; the core only consumes these contracts.
//!
//! Each connection owns one device, so subnet assignment stays local to a
//! peer. The bridge allocates devices through a [`TapFactory`].

use bytes::Bytes;

use crate::error::TapError;

/// Link MTU a backend should configure for its device.
///
/// Leaves room inside one transport packet for the Ethernet overhead
/// (18 bytes) and the one-byte packet tag.
#[must_use]
pub fn link_mtu(max_packet: usize) -> usize {
    max_packet - 18 - 1
}

/// A layer-2 virtual network device owned by one connection.
///
/// # Contract
///
/// - `data_pending` must be cheap and non-blocking; the scheduler calls it
///   before every read.
/// - `read_frame` may block only for a bounded single-frame read and is
///   only called after `data_pending` reported true.
/// - `is_subnet_unused` must observe live host state, not a cached view:
///   the negotiation depends on it to pick a subnet no other interface
///   uses.
pub trait TapDevice {
    /// Assign `192.168.<subnet>.<postfix>/24` to the device.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Configure`] when the host refuses the address.
    fn set_ip(&mut self, subnet: u8, postfix: u8) -> Result<(), TapError>;

    /// Whether `192.168.<subnet>.0/24` is free on this host.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Io`] when the host's interface table cannot be
    /// read.
    fn is_subnet_unused(&self, subnet: u8) -> Result<bool, TapError>;

    /// Whether a frame is waiting to be read.
    fn data_pending(&self) -> bool;

    /// Read one Ethernet frame.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Io`] on a failed device read.
    fn read_frame(&mut self) -> Result<Bytes, TapError>;

    /// Inject one Ethernet frame into the host's network stack.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Io`] on a failed device write.
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), TapError>;
}

/// Allocates one TAP device per connection.
pub trait TapFactory {
    /// The device type this factory produces.
    type Device: TapDevice;

    /// Open a fresh device.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Open`] when the platform refuses another device;
    /// the connection attempt fails without side effects.
    fn open(&mut self) -> Result<Self::Device, TapError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_mtu_leaves_room_for_overhead_and_tag() {
        assert_eq!(link_mtu(1024), 1005);
    }
}
