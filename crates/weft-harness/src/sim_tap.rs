//! In-memory TAP device with scripted host state.

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeSet, VecDeque},
    rc::Rc,
};

use bytes::Bytes;
use weft_core::{TapDevice, TapError, TapFactory};

#[derive(Debug, Default)]
struct TapState {
    used_subnets: BTreeSet<u8>,
    ip: Option<(u8, u8)>,
    inbound: VecDeque<Bytes>,
    written: Vec<Bytes>,
    fail_reads: bool,
    fail_set_ip: bool,
    fail_subnet_checks: bool,
}

/// A simulated TAP device.
///
/// Clones share state: the bridge owns one handle while the test keeps
/// another to inject frames and inspect results.
#[derive(Debug, Clone, Default)]
pub struct SimTap {
    state: Rc<RefCell<TapState>>,
}

impl SimTap {
    /// Create a device with no used subnets and no pending frames.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script `192.168.<subnet>.0/24` as already used on this host.
    pub fn mark_subnet_used(&self, subnet: u8) {
        self.state.borrow_mut().used_subnets.insert(subnet);
    }

    /// The address assigned by the last `set_ip`, if any.
    #[must_use]
    pub fn ip(&self) -> Option<(u8, u8)> {
        self.state.borrow().ip
    }

    /// Queue a frame for the bridge to read on the next scheduler pass.
    pub fn queue_frame(&self, frame: &[u8]) {
        self.state.borrow_mut().inbound.push_back(Bytes::copy_from_slice(frame));
    }

    /// Drain the frames the bridge injected into the host's stack.
    #[must_use]
    pub fn take_written(&self) -> Vec<Bytes> {
        self.state.borrow_mut().written.drain(..).collect()
    }

    /// Make subsequent `read_frame` calls fail.
    pub fn fail_reads(&self, fail: bool) {
        self.state.borrow_mut().fail_reads = fail;
    }

    /// Make subsequent `set_ip` calls fail.
    pub fn fail_set_ip(&self, fail: bool) {
        self.state.borrow_mut().fail_set_ip = fail;
    }

    /// Make subsequent `is_subnet_unused` calls fail.
    pub fn fail_subnet_checks(&self, fail: bool) {
        self.state.borrow_mut().fail_subnet_checks = fail;
    }
}

impl TapDevice for SimTap {
    fn set_ip(&mut self, subnet: u8, postfix: u8) -> Result<(), TapError> {
        let mut state = self.state.borrow_mut();
        if state.fail_set_ip {
            return Err(TapError::Configure("simulated set_ip failure".into()));
        }
        state.ip = Some((subnet, postfix));
        Ok(())
    }

    fn is_subnet_unused(&self, subnet: u8) -> Result<bool, TapError> {
        let state = self.state.borrow();
        if state.fail_subnet_checks {
            return Err(TapError::Io("simulated interface table failure".into()));
        }
        Ok(!state.used_subnets.contains(&subnet))
    }

    fn data_pending(&self) -> bool {
        !self.state.borrow().inbound.is_empty()
    }

    fn read_frame(&mut self) -> Result<Bytes, TapError> {
        let mut state = self.state.borrow_mut();
        if state.fail_reads {
            return Err(TapError::Io("simulated read failure".into()));
        }
        state
            .inbound
            .pop_front()
            .ok_or_else(|| TapError::Io("no frame pending".into()))
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<(), TapError> {
        self.state.borrow_mut().written.push(Bytes::copy_from_slice(frame));
        Ok(())
    }
}

/// Hands out [`SimTap`]s and keeps a handle to each for inspection.
///
/// Subnets marked used on the factory apply to every device it opens
/// afterwards, modeling host-wide interface state.
#[derive(Debug, Clone, Default)]
pub struct SimTapFactory {
    opened: Rc<RefCell<Vec<SimTap>>>,
    used_subnets: Rc<RefCell<BTreeSet<u8>>>,
    fail_open: Rc<Cell<bool>>,
}

impl SimTapFactory {
    /// Create a factory with no used subnets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script `192.168.<subnet>.0/24` as used for every future device.
    pub fn mark_subnet_used(&self, subnet: u8) {
        self.used_subnets.borrow_mut().insert(subnet);
    }

    /// Make subsequent `open` calls fail.
    pub fn fail_open(&self, fail: bool) {
        self.fail_open.set(fail);
    }

    /// Number of devices opened so far.
    #[must_use]
    pub fn opened_count(&self) -> usize {
        self.opened.borrow().len()
    }

    /// Handle to the `index`-th opened device.
    ///
    /// # Panics
    ///
    /// Panics when no such device was opened; tests want to know.
    #[must_use]
    pub fn device(&self, index: usize) -> SimTap {
        self.opened
            .borrow()
            .get(index)
            .cloned()
            .unwrap_or_else(|| panic!("no tap device at index {index}"))
    }
}

impl TapFactory for SimTapFactory {
    type Device = SimTap;

    fn open(&mut self) -> Result<SimTap, TapError> {
        if self.fail_open.get() {
            return Err(TapError::Open("simulated open failure".into()));
        }
        let tap = SimTap::new();
        for subnet in self.used_subnets.borrow().iter() {
            tap.mark_subnet_used(*subnet);
        }
        self.opened.borrow_mut().push(tap.clone());
        Ok(tap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_round_trip_through_the_queues() {
        let mut tap = SimTap::new();
        assert!(!tap.data_pending());

        tap.queue_frame(&[1, 2, 3]);
        assert!(tap.data_pending());
        assert_eq!(tap.read_frame().unwrap().as_ref(), &[1, 2, 3]);
        assert!(!tap.data_pending());

        tap.write_frame(&[4, 5]).unwrap();
        assert_eq!(tap.take_written(), vec![Bytes::copy_from_slice(&[4, 5])]);
    }

    #[test]
    fn factory_applies_used_subnets_to_new_devices() {
        let mut factory = SimTapFactory::new();
        factory.mark_subnet_used(0);

        let tap = factory.open().unwrap();
        assert_eq!(tap.is_subnet_unused(0), Ok(false));
        assert_eq!(tap.is_subnet_unused(1), Ok(true));
        assert_eq!(factory.opened_count(), 1);
    }
}
