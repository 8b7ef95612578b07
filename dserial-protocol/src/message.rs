//! Message types for the DSerial protocol
//!
//! On the wire every payload starts with the client address, in both
//! directions. What follows depends on who is talking:
//! - Master → Client: one control byte (READ, WRITE, PING, ACK, NAK),
//!   followed by data for WRITE
//! - Client → Master: ACK, or the data itself

use heapless::Vec;

use crate::control::{Opcode, ACK, NAK, PING, READ, WRITE};
use crate::frame::{FrameError, Packet, MAX_MSG_LEN};

/// Bus address
pub type Address = u8;

/// Identity the client application sees as the source of master messages
pub const MASTER_ADDRESS: Address = 0x7F;

/// Lowest client address
pub const MIN_CLIENT_ADDRESS: Address = 1;

/// Highest client address; everything above is reserved
pub const MAX_CLIENT_ADDRESS: Address = 125;

/// Largest data block the master can write in one message
pub const MAX_WRITE_DATA: usize = MAX_MSG_LEN - 2;

/// Largest data block a client can hand back in one reply
pub const MAX_REPLY_DATA: usize = MAX_MSG_LEN - 1;

/// Returns true if `address` may be assigned to a client
pub fn is_client_address(address: Address) -> bool {
    (MIN_CLIENT_ADDRESS..=MAX_CLIENT_ADDRESS).contains(&address)
}

/// Application-level message: a peer address and opaque data
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Message {
    /// Source (received) or destination (sent)
    pub address: Address,
    /// Data bytes, usually led by an [`Opcode`]
    pub data: Vec<u8, MAX_MSG_LEN>,
}

impl Message {
    /// Create a message
    pub fn new(address: Address, data: &[u8]) -> Result<Self, FrameError> {
        let data = Vec::from_slice(data).map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(Self { address, data })
    }

    /// Application opcode carried in the first data byte, if any
    pub fn opcode(&self) -> Option<Opcode> {
        self.data.first().copied().and_then(Opcode::from_byte)
    }
}

/// Requests sent by the master, as seen by a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request<'a> {
    /// Hand over pending data, or ACK if there is none
    Read,
    /// Store the data and ACK
    Write(&'a [u8]),
    /// Presence probe
    Ping,
    /// Acknowledgement of the client's last reply
    Ack,
    /// Resend the last reply
    Nak,
    /// Unrecognised or missing control byte
    Unknown,
}

impl<'a> Request<'a> {
    /// Parse a request from a packet
    pub fn parse(packet: &'a Packet) -> Self {
        match packet.head() {
            Some(READ) => Request::Read,
            Some(WRITE) => Request::Write(packet.tail()),
            Some(PING) => Request::Ping,
            Some(ACK) => Request::Ack,
            Some(NAK) => Request::Nak,
            _ => Request::Unknown,
        }
    }

    /// Encode this request into a packet for `address`
    pub fn to_packet(&self, address: Address) -> Result<Packet, FrameError> {
        match self {
            Request::Read => Packet::from_parts(address, &[READ], &[]),
            Request::Write(data) => Packet::from_parts(address, &[WRITE], data),
            Request::Ping => Packet::from_parts(address, &[PING], &[]),
            Request::Ack => Packet::from_parts(address, &[ACK], &[]),
            Request::Nak => Packet::from_parts(address, &[NAK], &[]),
            Request::Unknown => Err(FrameError::InvalidFrame),
        }
    }
}

/// Replies sent by a client, as seen by the master
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reply<'a> {
    /// Acknowledgement, or "no data" in answer to READ
    Ack,
    /// Data the client had queued
    Data(&'a [u8]),
}

impl<'a> Reply<'a> {
    /// Parse a reply from a packet
    pub fn parse(packet: &'a Packet) -> Self {
        match packet.head() {
            Some(ACK) => Reply::Ack,
            _ => Reply::Data(packet.body()),
        }
    }

    /// Encode this reply into a packet from `address`
    pub fn to_packet(&self, address: Address) -> Result<Packet, FrameError> {
        match self {
            Reply::Ack => Packet::from_parts(address, &[ACK], &[]),
            Reply::Data(data) => Packet::from_parts(address, &[], data),
        }
    }
}

/// Returns true if `data` can travel as a client reply without being
/// mistaken for a control reply
pub fn is_valid_reply_data(data: &[u8]) -> bool {
    match data.first() {
        None => false,
        Some(&first) => first != ACK && data.len() <= MAX_REPLY_DATA,
    }
}
