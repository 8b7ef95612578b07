//! Bus clock backed by embassy-time

use dserial_hal::Clock;
use embassy_time::Instant;

/// Millisecond clock reading the embassy time driver
///
/// The 64-bit tick count is truncated to 32 bits; session timeouts are
/// computed with wrapping subtraction, so the wrap every ~49 days is
/// harmless.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    fn now_ms(&self) -> u32 {
        Instant::now().as_millis() as u32
    }
}
