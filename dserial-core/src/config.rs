//! Session configuration
//!
//! Runtime-tunable bus parameters. Wire-level limits (message length,
//! queue depths) are compile-time constants in `dserial-protocol`; what
//! lives here can differ between deployments and be stored in flash as
//! postcard binary data.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use dserial_protocol::{is_client_address, Address};

/// Default time to wait for a reply before retransmitting
pub const DEFAULT_TIMEOUT_MS: u32 = 50;

/// Default number of retransmissions before a transaction is dropped
pub const DEFAULT_MAX_RETRIES: u8 = 3;

/// Most clients a master tracks
pub const MAX_CLIENTS: usize = 16;

/// Configuration rejected by [`SessionConfig::validate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Timeout of zero would retransmit on every pump
    ZeroTimeout,
    /// Discovery range is empty or leaves the client address range
    InvalidDiscoveryRange,
    /// Discovery range spans more addresses than the roster can hold
    DiscoveryRangeTooWide,
    /// Stored blob could not be encoded or decoded
    Serialization,
}

/// Bus timing and discovery parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SessionConfig {
    /// Reply timeout in milliseconds
    pub timeout_ms: u32,
    /// Retransmissions allowed per transaction
    pub max_retries: u8,
    /// First address probed by discovery
    pub discovery_first: Address,
    /// Last address probed by discovery (inclusive)
    pub discovery_last: Address,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            discovery_first: 1,
            discovery_last: (MAX_CLIENTS - 1) as Address,
        }
    }
}

impl SessionConfig {
    /// Check that the configuration can drive a session
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.discovery_first > self.discovery_last
            || !is_client_address(self.discovery_first)
            || !is_client_address(self.discovery_last)
        {
            return Err(ConfigError::InvalidDiscoveryRange);
        }
        let width = usize::from(self.discovery_last - self.discovery_first) + 1;
        if width > MAX_CLIENTS {
            return Err(ConfigError::DiscoveryRangeTooWide);
        }
        Ok(())
    }

    /// Addresses probed by discovery, in ascending order
    pub fn discovery_range(&self) -> core::ops::RangeInclusive<Address> {
        self.discovery_first..=self.discovery_last
    }

    /// Serialize into `buffer`, returning the used prefix
    #[cfg(feature = "serde")]
    pub fn to_slice<'a>(&self, buffer: &'a mut [u8]) -> Result<&'a mut [u8], ConfigError> {
        postcard::to_slice(self, buffer).map_err(|_| ConfigError::Serialization)
    }

    /// Deserialize and validate a stored configuration
    #[cfg(feature = "serde")]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: SessionConfig =
            postcard::from_bytes(bytes).map_err(|_| ConfigError::Serialization)?;
        config.validate()?;
        Ok(config)
    }
}
