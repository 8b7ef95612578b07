//! DSerial Bus Protocol
//!
//! Wire format for a single-master, multi-drop UART bus. The master polls
//! each client in turn; clients only ever speak when spoken to.
//!
//! # Frame Format
//!
//! ```text
//! ┌───────┬──────────────────────────┬────────┬─────┐
//! │ START │ PAYLOAD (escaped)        │ PARITY │ END │
//! │ 0x82  │ 1–16B decoded            │ 1B     │0x83 │
//! └───────┴──────────────────────────┴────────┴─────┘
//! ```
//!
//! Payload bytes with the high bit set are sent as `ESC, byte & 0x7F` so
//! that control bytes (all ≥ 0x80) never appear inside a frame. The parity
//! byte is the XOR of START, the decoded payload and END, masked to 7 bits.
//!
//! The first payload byte is always a client address, whichever side is
//! talking. See [`message`] for the request/reply layouts.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// Must come first so the logging macros are visible to the other modules
#[macro_use]
mod fmt;

pub mod control;
pub mod frame;
pub mod message;
pub mod queue;
pub mod trace;

pub use control::{Control, Opcode};
pub use frame::{FrameDecoder, FrameError, Packet, MAX_FRAME_SIZE, MAX_MSG_LEN};
pub use message::{
    is_client_address, Address, Message, Reply, Request, MASTER_ADDRESS, MAX_CLIENT_ADDRESS,
    MIN_CLIENT_ADDRESS,
};
pub use queue::{MessageQueue, QueueFull, CLIENT_QUEUE_SIZE, MASTER_QUEUE_SIZE};
pub use trace::{BusSniffer, Direction, Transaction, TransactionTracer};
