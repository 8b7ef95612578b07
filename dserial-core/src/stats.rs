//! Link statistics

/// Counters kept by a session over its lifetime
///
/// All counters saturate instead of wrapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStats {
    /// Frames written to the stream, retransmissions included
    pub frames_sent: u32,
    /// Valid frames decoded, whoever they were addressed to
    pub frames_received: u32,
    /// Frames that ended damaged
    pub corrupt_frames: u32,
    /// NAKs sent in reply to damaged or unexpected frames
    pub naks_sent: u32,
    /// Retransmissions after a timeout
    pub retries: u32,
    /// Transactions abandoned after the retry budget ran out
    pub aborted: u32,
    /// Inbound messages lost to a full queue
    pub dropped: u32,
}

impl LinkStats {
    pub const fn new() -> Self {
        Self {
            frames_sent: 0,
            frames_received: 0,
            corrupt_frames: 0,
            naks_sent: 0,
            retries: 0,
            aborted: 0,
            dropped: 0,
        }
    }

    pub(crate) fn bump(counter: &mut u32) {
        *counter = counter.saturating_add(1);
    }

    /// Share of received frames that were damaged, in percent
    pub fn corruption_percent(&self) -> u8 {
        let total = self.frames_received as u64 + self.corrupt_frames as u64;
        if total == 0 {
            return 0;
        }
        (self.corrupt_frames as u64 * 100 / total) as u8
    }

    /// Returns true while fewer than `max_percent` of frames arrive damaged
    /// and no transaction has been abandoned
    pub fn is_link_healthy(&self, max_percent: u8) -> bool {
        self.aborted == 0 && self.corruption_percent() < max_percent
    }

    /// Zero every counter
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
