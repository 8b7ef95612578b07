//! Frame encoding and decoding for the DSerial bus.
//!
//! Frame format:
//! - START (1 byte): 0x82 synchronization byte
//! - PAYLOAD (1-16 bytes, escaped): address byte, then control or data bytes
//! - PARITY (1 byte): XOR of START, every unescaped payload byte and END,
//!   masked to 7 bits so it never collides with a control byte
//! - END (1 byte): 0x83
//!
//! Payload bytes with the high bit set are sent as ESC followed by the byte
//! with its high bit cleared. Inside a frame the only raw bytes above 0x7F
//! are therefore START, END and ESC.

use heapless::Vec;

use crate::control::{END, ESC, START};

/// Maximum decoded payload length (address and control bytes included)
pub const MAX_MSG_LEN: usize = 16;

/// Maximum complete frame size (START + every payload byte escaped + PARITY + END)
pub const MAX_FRAME_SIZE: usize = 1 + 2 * MAX_MSG_LEN + 1 + 1;

/// Decoder slots: the payload plus the trailing parity byte
const RAW_CAPACITY: usize = MAX_MSG_LEN + 1;

/// Only the low seven bits of the parity accumulator are checked
const PARITY_MASK: u8 = 0x7F;

/// Errors that can occur during frame parsing or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Nothing to send
    EmptyPayload,
    /// Payload exceeds maximum allowed size
    PayloadTooLarge,
    /// Parity mismatch
    InvalidChecksum,
    /// Invalid frame structure (overrun, stray control byte, dangling escape)
    InvalidFrame,
    /// Buffer too small for encoding
    BufferTooSmall,
}

impl FrameError {
    /// Returns true if the error describes a damaged frame received off the wire
    pub fn is_corrupt(&self) -> bool {
        matches!(self, FrameError::InvalidChecksum | FrameError::InvalidFrame)
    }
}

/// Parity byte for a payload
pub fn parity(payload: &[u8]) -> u8 {
    payload.iter().fold(START ^ END, |acc, &byte| acc ^ byte) & PARITY_MASK
}

/// Encode a payload into a wire frame
///
/// Returns the number of bytes written.
pub fn encode(payload: &[u8], buffer: &mut [u8]) -> Result<usize, FrameError> {
    if payload.is_empty() {
        return Err(FrameError::EmptyPayload);
    }
    if payload.len() > MAX_MSG_LEN {
        return Err(FrameError::PayloadTooLarge);
    }

    let mut len = 0;
    let mut put = |byte: u8| -> Result<(), FrameError> {
        let slot = buffer.get_mut(len).ok_or(FrameError::BufferTooSmall)?;
        *slot = byte;
        len += 1;
        Ok(())
    };

    put(START)?;
    for &byte in payload {
        if byte & 0x80 == 0 {
            put(byte)?;
        } else {
            put(ESC)?;
            put(byte & 0x7F)?;
        }
    }
    put(parity(payload))?;
    put(END)?;

    Ok(len)
}

/// One logical unit on the bus: address byte first, then control or data
///
/// Always holds between 1 and [`MAX_MSG_LEN`] bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Packet {
    bytes: Vec<u8, MAX_MSG_LEN>,
}

impl Packet {
    /// Create a packet from raw payload bytes
    pub fn new(payload: &[u8]) -> Result<Self, FrameError> {
        if payload.is_empty() {
            return Err(FrameError::EmptyPayload);
        }
        let bytes = Vec::from_slice(payload).map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(Self { bytes })
    }

    /// Create a packet from an address, header bytes and a data tail
    pub fn from_parts(address: u8, header: &[u8], data: &[u8]) -> Result<Self, FrameError> {
        let mut bytes = Vec::new();
        bytes
            .push(address)
            .map_err(|_| FrameError::PayloadTooLarge)?;
        bytes
            .extend_from_slice(header)
            .map_err(|_| FrameError::PayloadTooLarge)?;
        bytes
            .extend_from_slice(data)
            .map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(Self { bytes })
    }

    /// First payload byte: the client address
    pub fn address(&self) -> u8 {
        self.bytes[0]
    }

    /// Second payload byte, if present: a control byte or the first data byte
    pub fn head(&self) -> Option<u8> {
        self.bytes.get(1).copied()
    }

    /// Everything after the address byte
    pub fn body(&self) -> &[u8] {
        &self.bytes[1..]
    }

    /// Everything after the address and head bytes
    pub fn tail(&self) -> &[u8] {
        self.bytes.get(2..).unwrap_or(&[])
    }

    /// Whole payload
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Never true; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Encode this packet into a byte buffer
    ///
    /// Returns the number of bytes written
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        encode(&self.bytes, buffer)
    }

    /// Encode this packet into a heapless Vec
    pub fn encode_to_vec(&self) -> Result<Vec<u8, MAX_FRAME_SIZE>, FrameError> {
        let mut buffer = [0u8; MAX_FRAME_SIZE];
        let len = self.encode(&mut buffer)?;
        let mut vec = Vec::new();
        vec.extend_from_slice(&buffer[..len])
            .map_err(|_| FrameError::BufferTooSmall)?;
        Ok(vec)
    }
}

/// State machine for parsing incoming frames
///
/// Keeps its position between calls, so a frame that trickles in over many
/// pump ticks is reassembled intact.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    state: DecodeState,
    buffer: Vec<u8, RAW_CAPACITY>,
    parity: u8,
    escape_pending: bool,
    malformed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// Waiting for START byte
    Idle,
    /// Collecting payload and parity until END
    InFrame,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a new frame decoder
    pub fn new() -> Self {
        Self {
            state: DecodeState::Idle,
            buffer: Vec::new(),
            parity: 0,
            escape_pending: false,
            malformed: false,
        }
    }

    /// Reset the decoder state, dropping any partial frame
    pub fn reset(&mut self) {
        self.state = DecodeState::Idle;
        self.buffer.clear();
        self.parity = 0;
        self.escape_pending = false;
        self.malformed = false;
    }

    /// Returns true while a frame has started but not yet ended
    pub fn in_frame(&self) -> bool {
        self.state == DecodeState::InFrame
    }

    /// Feed a single byte to the decoder
    ///
    /// Returns `Ok(Some(packet))` when a complete valid frame is decoded,
    /// `Ok(None)` when more bytes are needed, or `Err` when a frame ended
    /// damaged.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Packet>, FrameError> {
        if byte == START {
            // A START inside a frame abandons the partial frame
            self.reset();
            self.state = DecodeState::InFrame;
            self.parity = START;
            return Ok(None);
        }

        if self.state == DecodeState::Idle {
            // Line noise and stray ENDs between frames
            return Ok(None);
        }

        match byte {
            END => {
                self.parity ^= END;
                self.finish()
            }
            ESC => {
                self.escape_pending = true;
                Ok(None)
            }
            _ => {
                if byte & 0x80 != 0 {
                    self.malformed = true;
                }
                let value = if self.escape_pending {
                    self.escape_pending = false;
                    byte | 0x80
                } else {
                    byte
                };
                if self.buffer.push(value).is_err() {
                    debug!("frame overrun, dropping");
                    self.reset();
                    return Err(FrameError::InvalidFrame);
                }
                self.parity ^= value;
                Ok(None)
            }
        }
    }

    /// Feed multiple bytes to the decoder
    ///
    /// Returns the first complete frame found, if any.
    /// Remaining bytes after a complete frame are not consumed.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Result<Option<Packet>, FrameError> {
        for &byte in bytes {
            if let Some(packet) = self.feed(byte)? {
                return Ok(Some(packet));
            }
        }
        Ok(None)
    }

    fn finish(&mut self) -> Result<Option<Packet>, FrameError> {
        let structurally_sound = !self.malformed && !self.escape_pending && self.buffer.len() >= 2;
        let parity_ok = self.parity & PARITY_MASK == 0;

        // The last stored byte is the parity, not payload
        self.buffer.pop();
        let result = if !structurally_sound {
            Err(FrameError::InvalidFrame)
        } else if !parity_ok {
            Err(FrameError::InvalidChecksum)
        } else {
            Packet::new(&self.buffer).map(Some)
        };

        if let Err(e) = result {
            debug!("corrupt frame: {:?}", e);
        }
        self.reset();
        result
    }
}
