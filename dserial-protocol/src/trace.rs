//! Passive bus analysis
//!
//! A sniffer attached to the master's TX line and the shared client TX line
//! sees every frame on the bus. [`TransactionTracer`] folds the decoded
//! packets back into complete transactions:
//!
//! ```text
//! Write:   M {WRITE}{data}  C {ACK}
//! Read:    M {READ}  C {data}  M {ACK}  C {ACK}
//! NoData:  M {READ}  C {ACK}
//! Ping:    M {PING}  C {ACK}
//! ```

use core::fmt;

use heapless::Vec;

use crate::control::byte_name;
use crate::frame::{FrameDecoder, FrameError, Packet, MAX_MSG_LEN};
use crate::message::{Address, Reply, Request};

/// Which side of the bus a frame came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    FromMaster,
    FromClient,
}

/// A completed exchange
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transaction {
    /// Master delivered data to a client
    Write {
        client: Address,
        data: Vec<u8, MAX_MSG_LEN>,
    },
    /// Client delivered data to the master
    Read {
        client: Address,
        data: Vec<u8, MAX_MSG_LEN>,
    },
    /// Client was polled and had nothing
    NoData { client: Address },
    /// Client answered a presence probe
    Ping { client: Address },
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transaction::Write { client, data } => {
                write!(f, "M>{}:", client)?;
                write_bytes(f, data)
            }
            Transaction::Read { client, data } => {
                write!(f, "{}>M:", client)?;
                write_bytes(f, data)
            }
            Transaction::NoData { client } => write!(f, "{}>M: NO DATA", client),
            Transaction::Ping { client } => write!(f, "CLIENT {} PINGED", client),
        }
    }
}

fn write_bytes(f: &mut fmt::Formatter<'_>, data: &[u8]) -> fmt::Result {
    for &byte in data {
        match byte_name(byte) {
            Some(name) => write!(f, " {}", name)?,
            None => write!(f, " {}", byte)?,
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TraceState {
    Waiting,
    MidWrite {
        client: Address,
        data: Vec<u8, MAX_MSG_LEN>,
    },
    MidPing {
        client: Address,
    },
    MidRead {
        client: Address,
    },
    /// Client data seen, master ACK pending
    MidReadData {
        client: Address,
        data: Vec<u8, MAX_MSG_LEN>,
    },
    /// Master ACKed the data, client's closing ACK pending
    MidReadAck {
        client: Address,
        data: Vec<u8, MAX_MSG_LEN>,
    },
}

/// Groups decoded packets into transactions
#[derive(Debug, Clone)]
pub struct TransactionTracer {
    state: TraceState,
}

impl Default for TransactionTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionTracer {
    pub fn new() -> Self {
        Self {
            state: TraceState::Waiting,
        }
    }

    /// Forget any half-seen transaction
    pub fn reset(&mut self) {
        self.state = TraceState::Waiting;
    }

    /// Returns true if no transaction is in progress
    pub fn is_idle(&self) -> bool {
        self.state == TraceState::Waiting
    }

    /// Observe one decoded packet
    ///
    /// Returns the transaction this packet completed, if any.
    pub fn observe(&mut self, direction: Direction, packet: &Packet) -> Option<Transaction> {
        match direction {
            Direction::FromMaster => {
                self.observe_master(packet);
                None
            }
            Direction::FromClient => self.observe_client(packet),
        }
    }

    fn observe_master(&mut self, packet: &Packet) {
        let client = packet.address();
        let state = core::mem::replace(&mut self.state, TraceState::Waiting);

        // Retries look exactly like fresh requests, so any request restarts
        self.state = match (Request::parse(packet), state) {
            (Request::Write(data), _) => TraceState::MidWrite {
                client,
                data: Vec::from_slice(data).unwrap_or_default(),
            },
            (Request::Read, _) => TraceState::MidRead { client },
            (Request::Ping, _) => TraceState::MidPing { client },
            (Request::Ack, TraceState::MidReadData { client: c, data })
            | (Request::Ack, TraceState::MidReadAck { client: c, data })
                if c == client =>
            {
                TraceState::MidReadAck { client, data }
            }
            // Master rejected the data; the client will send it again
            (Request::Nak, TraceState::MidReadData { client: c, .. }) if c == client => {
                TraceState::MidRead { client }
            }
            (Request::Nak, other) => other,
            _ => TraceState::Waiting,
        };
    }

    fn observe_client(&mut self, packet: &Packet) -> Option<Transaction> {
        let client = packet.address();
        let reply = Reply::parse(packet);
        let state = core::mem::replace(&mut self.state, TraceState::Waiting);

        let (next, done) = match (state, reply) {
            (TraceState::MidWrite { client: c, data }, Reply::Ack) if c == client => {
                (TraceState::Waiting, Some(Transaction::Write { client, data }))
            }
            (TraceState::MidPing { client: c }, Reply::Ack) if c == client => {
                (TraceState::Waiting, Some(Transaction::Ping { client }))
            }
            (TraceState::MidRead { client: c }, Reply::Ack) if c == client => {
                (TraceState::Waiting, Some(Transaction::NoData { client }))
            }
            (TraceState::MidRead { client: c }, Reply::Data(data))
            | (TraceState::MidReadData { client: c, .. }, Reply::Data(data))
                if c == client =>
            {
                let data = Vec::from_slice(data).unwrap_or_default();
                (TraceState::MidReadData { client, data }, None)
            }
            (TraceState::MidReadAck { client: c, data }, Reply::Ack) if c == client => {
                (TraceState::Waiting, Some(Transaction::Read { client, data }))
            }
            // Anything else does not advance the exchange
            (other, _) => (other, None),
        };

        self.state = next;
        done
    }
}

/// Frame decoders for both bus directions feeding one tracer
#[derive(Debug, Clone, Default)]
pub struct BusSniffer {
    master: FrameDecoder,
    client: FrameDecoder,
    tracer: TransactionTracer,
}

impl BusSniffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte captured on the given line
    ///
    /// Damaged frames are reported and otherwise leave the tracer alone.
    pub fn feed(&mut self, direction: Direction, byte: u8) -> Result<Option<Transaction>, FrameError> {
        let decoder = match direction {
            Direction::FromMaster => &mut self.master,
            Direction::FromClient => &mut self.client,
        };
        match decoder.feed(byte)? {
            Some(packet) => Ok(self.tracer.observe(direction, &packet)),
            None => Ok(None),
        }
    }

    /// The underlying transaction tracer
    pub fn tracer(&self) -> &TransactionTracer {
        &self.tracer
    }
}
