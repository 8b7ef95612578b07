//! Client discovery
//!
//! Blocking startup probe: PING every address in the configured range and
//! keep the ones that answer. Holds the bus for up to one timeout per
//! silent address, so run it before entering the pump loop.

use dserial_hal::{Clock, Uart};
use dserial_protocol::{Address, Request};

use super::master::MasterSession;
use crate::error::SessionError;
use crate::link::Received;

impl<U: Uart, C: Clock> MasterSession<U, C> {
    /// Rebuild the roster from the clients that answer a PING
    ///
    /// A transaction in flight is pumped until it completes or times out.
    /// Returns the new roster in ascending order.
    pub fn discover(&mut self) -> Result<&[Address], SessionError> {
        self.finish_transaction()?;
        self.link.reset();
        self.roster.clear();

        for address in self.config.discovery_range() {
            if self.ping(address)? {
                debug!("client {} present", address);
                self.roster.insert(address)?;
            }
        }

        info!("discovery found {} clients", self.roster.len());
        Ok(self.roster.as_slice())
    }

    /// Pump until the transaction in flight completes or times out
    fn finish_transaction(&mut self) -> Result<(), SessionError> {
        while self.state.is_busy() {
            match self.pump() {
                Ok(()) => {}
                Err(SessionError::Timeout { address }) => {
                    debug!("client {} timed out before discovery", address);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Returns true if `address` answered within the timeout
    fn ping(&mut self, address: Address) -> Result<bool, SessionError> {
        self.peer = Some(address);
        self.link.transmit(&Request::Ping.to_packet(address)?)?;

        let started = self.clock.now_ms();
        while self.clock.elapsed_ms(started) <= self.config.timeout_ms {
            match self.link.receive()? {
                Received::Packet(packet) if packet.address() == address => return Ok(true),
                _ => {}
            }
        }
        Ok(false)
    }
}
