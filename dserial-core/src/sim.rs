//! Host-side bus simulation
//!
//! A virtual multi-drop bus wired the usual way: the master's TX line
//! reaches every client's RX, and all client TX lines are joined onto the
//! master's RX. Clients never hear each other.

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use dserial_hal::{Clock, UartRx, UartTx};
use dserial_protocol::{Address, FrameDecoder, Packet, Reply, Request};

#[derive(Default)]
struct BusInner {
    master_rx: VecDeque<u8>,
    clients_rx: Vec<VecDeque<u8>>,
    master_tx_log: Vec<u8>,
}

/// Shared bus joining one master and any number of clients
#[derive(Clone, Default)]
pub struct VirtualBus {
    inner: Rc<RefCell<BusInner>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Master,
    Client(usize),
}

/// One node's connection to a [`VirtualBus`]
pub struct BusPort {
    inner: Rc<RefCell<BusInner>>,
    side: Side,
}

impl VirtualBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Port for the master node
    pub fn master_port(&self) -> BusPort {
        BusPort {
            inner: Rc::clone(&self.inner),
            side: Side::Master,
        }
    }

    /// Port for a new client node
    pub fn client_port(&self) -> BusPort {
        let mut inner = self.inner.borrow_mut();
        inner.clients_rx.push(VecDeque::new());
        BusPort {
            inner: Rc::clone(&self.inner),
            side: Side::Client(inner.clients_rx.len() - 1),
        }
    }

    /// Put raw bytes on the client-to-master line
    pub fn inject_to_master(&self, bytes: &[u8]) {
        self.inner.borrow_mut().master_rx.extend(bytes.iter().copied());
    }

    /// Put raw bytes on the master-to-client line
    pub fn inject_to_clients(&self, bytes: &[u8]) {
        for rx in self.inner.borrow_mut().clients_rx.iter_mut() {
            rx.extend(bytes.iter().copied());
        }
    }

    /// Every valid frame the master has transmitted so far
    pub fn sent_by_master(&self) -> Vec<Packet> {
        let inner = self.inner.borrow();
        let mut decoder = FrameDecoder::new();
        inner
            .master_tx_log
            .iter()
            .filter_map(|&byte| decoder.feed(byte).ok().flatten())
            .collect()
    }

    /// Forget the master transmit log
    pub fn clear_log(&self) {
        self.inner.borrow_mut().master_tx_log.clear();
    }
}

impl UartTx for BusPort {
    type Error = Infallible;

    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        let mut inner = self.inner.borrow_mut();
        match self.side {
            Side::Master => {
                inner.master_tx_log.extend_from_slice(data);
                for rx in inner.clients_rx.iter_mut() {
                    rx.extend(data.iter().copied());
                }
            }
            Side::Client(_) => inner.master_rx.extend(data.iter().copied()),
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl UartRx for BusPort {
    type Error = Infallible;

    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        let inner = self.inner.borrow();
        Ok(match self.side {
            Side::Master => !inner.master_rx.is_empty(),
            Side::Client(index) => !inner.clients_rx[index].is_empty(),
        })
    }

    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        let mut inner = self.inner.borrow_mut();
        Ok(match self.side {
            Side::Master => inner.master_rx.pop_front(),
            Side::Client(index) => inner.clients_rx[index].pop_front(),
        })
    }
}

/// Manually driven millisecond clock
///
/// Clones share the same time. With an auto-step set, every reading
/// advances the clock, so blocking waits terminate without a second thread.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now: Rc<Cell<u32>>,
    step: Rc<Cell<u32>>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock that moves forward `step_ms` on every reading
    pub fn with_auto_step(step_ms: u32) -> Self {
        let clock = Self::new();
        clock.step.set(step_ms);
        clock
    }

    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }

    pub fn set(&self, ms: u32) {
        self.now.set(ms);
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u32 {
        let now = self.now.get();
        self.now.set(now.wrapping_add(self.step.get()));
        now
    }
}

/// Stand-in for a set of clients that answer instantly
///
/// Acknowledges PING and READ (no data) for every present address, and
/// WRITE as well. Useful where the master blocks and no client session
/// could be pumped, as during discovery.
#[derive(Default)]
pub struct AutoResponder {
    decoder: FrameDecoder,
    present: Vec<Address>,
    replies: VecDeque<u8>,
    heard: Vec<Packet>,
}

impl AutoResponder {
    pub fn new(present: &[Address]) -> Self {
        Self {
            present: present.to_vec(),
            ..Default::default()
        }
    }

    /// Every valid frame received from the master
    pub fn heard(&self) -> &[Packet] {
        &self.heard
    }

    fn answer(&mut self, packet: &Packet) {
        let address = packet.address();
        if !self.present.contains(&address) {
            return;
        }
        let wants_ack = matches!(
            Request::parse(packet),
            Request::Ping | Request::Read | Request::Write(_)
        );
        if wants_ack {
            if let Ok(frame) = Reply::Ack.to_packet(address).and_then(|p| p.encode_to_vec()) {
                self.replies.extend(frame.iter().copied());
            }
        }
    }
}

impl UartTx for AutoResponder {
    type Error = Infallible;

    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        for &byte in data {
            if let Ok(Some(packet)) = self.decoder.feed(byte) {
                self.answer(&packet);
                self.heard.push(packet);
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl UartRx for AutoResponder {
    type Error = Infallible;

    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.replies.is_empty())
    }

    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        Ok(self.replies.pop_front())
    }
}
