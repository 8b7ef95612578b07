//! Session error type

use dserial_protocol::{Address, FrameError, QueueFull};

/// Errors surfaced by master and client sessions
///
/// None of these are fatal: the session stays usable after any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionError {
    /// A queue had no free slot; back off and retry later
    QueueFull,
    /// Address outside the client range
    InvalidAddress,
    /// Data too long, empty, or shaped like a control reply
    InvalidPayload,
    /// Retry budget exhausted; the transaction with `address` was dropped
    Timeout { address: Address },
    /// The underlying stream refused a read or write
    Transport,
    /// Discovery found more clients than the roster holds
    RosterFull,
}

impl From<QueueFull> for SessionError {
    fn from(_: QueueFull) -> Self {
        SessionError::QueueFull
    }
}

impl From<FrameError> for SessionError {
    fn from(_: FrameError) -> Self {
        SessionError::InvalidPayload
    }
}
