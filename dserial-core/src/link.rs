//! Framed packet link over a byte stream
//!
//! Owns the stream and the frame decoder that persists across pump calls,
//! so a frame that arrives over several ticks is reassembled intact.

use dserial_hal::Uart;
use dserial_protocol::{FrameDecoder, Packet};

use crate::error::SessionError;
use crate::stats::LinkStats;

/// Result of draining the stream once
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Received {
    /// Stream ran dry before a frame ended
    Nothing,
    /// A valid frame was decoded
    Packet(Packet),
    /// A frame ended damaged
    Corrupt,
}

/// Packet-level wrapper around a UART
pub struct Link<U> {
    uart: U,
    decoder: FrameDecoder,
    pub(crate) stats: LinkStats,
}

impl<U: Uart> Link<U> {
    pub fn new(uart: U) -> Self {
        Self {
            uart,
            decoder: FrameDecoder::new(),
            stats: LinkStats::new(),
        }
    }

    /// Read available bytes until a frame ends or the stream runs dry
    ///
    /// Bytes after a completed frame stay in the stream for the next call.
    pub fn receive(&mut self) -> Result<Received, SessionError> {
        loop {
            let byte = match self.uart.try_read_byte() {
                Ok(Some(byte)) => byte,
                Ok(None) => return Ok(Received::Nothing),
                Err(_) => {
                    warn!("bus read failed");
                    return Err(SessionError::Transport);
                }
            };

            match self.decoder.feed(byte) {
                Ok(Some(packet)) => {
                    LinkStats::bump(&mut self.stats.frames_received);
                    trace!("rx {=[u8]:x}", packet.as_bytes());
                    return Ok(Received::Packet(packet));
                }
                Ok(None) => {}
                Err(_) => {
                    LinkStats::bump(&mut self.stats.corrupt_frames);
                    return Ok(Received::Corrupt);
                }
            }
        }
    }

    /// Frame and write one packet
    pub fn transmit(&mut self, packet: &Packet) -> Result<(), SessionError> {
        let frame = packet.encode_to_vec()?;
        trace!("tx {=[u8]:x}", packet.as_bytes());
        self.uart
            .write_blocking(&frame)
            .and_then(|_| self.uart.flush())
            .map_err(|_| {
                warn!("bus write failed");
                SessionError::Transport
            })?;
        LinkStats::bump(&mut self.stats.frames_sent);
        Ok(())
    }

    /// Drop any partially received frame
    pub fn reset(&mut self) {
        self.decoder.reset();
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    pub fn uart(&self) -> &U {
        &self.uart
    }

    pub fn into_inner(self) -> U {
        self.uart
    }
}
