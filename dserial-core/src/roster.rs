//! Client roster
//!
//! The addresses a master polls, kept unique and ascending, plus the
//! round-robin cursor that picks the next one.

use heapless::Vec;

use dserial_protocol::{is_client_address, Address};

use crate::config::MAX_CLIENTS;
use crate::error::SessionError;

/// Known clients and the poll cursor
#[derive(Debug, Clone, Default)]
pub struct Roster {
    clients: Vec<Address, MAX_CLIENTS>,
    cursor: usize,
}

impl Roster {
    pub const fn new() -> Self {
        Self {
            clients: Vec::new(),
            cursor: 0,
        }
    }

    /// Build a roster from a list of addresses, dropping duplicates
    pub fn from_slice(addresses: &[Address]) -> Result<Self, SessionError> {
        let mut roster = Self::new();
        for &address in addresses {
            roster.insert(address)?;
        }
        Ok(roster)
    }

    /// Add a client, keeping the list sorted
    ///
    /// Adding an address that is already present is a no-op.
    pub fn insert(&mut self, address: Address) -> Result<(), SessionError> {
        if !is_client_address(address) {
            return Err(SessionError::InvalidAddress);
        }
        match self.clients.binary_search(&address) {
            Ok(_) => Ok(()),
            Err(index) => self
                .clients
                .insert(index, address)
                .map_err(|_| SessionError::RosterFull),
        }
    }

    /// Next client to poll, wrapping around the list
    pub fn next_client(&mut self) -> Option<Address> {
        if self.clients.is_empty() {
            return None;
        }
        if self.cursor >= self.clients.len() {
            self.cursor = 0;
        }
        let address = self.clients[self.cursor];
        self.cursor += 1;
        Some(address)
    }

    pub fn contains(&self, address: Address) -> bool {
        self.clients.binary_search(&address).is_ok()
    }

    pub fn clear(&mut self) {
        self.clients.clear();
        self.cursor = 0;
    }

    pub fn as_slice(&self) -> &[Address] {
        &self.clients
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_and_unique() {
        let roster = Roster::from_slice(&[9, 2, 5, 2, 9]).unwrap();
        assert_eq!(roster.as_slice(), &[2, 5, 9]);
        assert!(roster.contains(5));
        assert!(!roster.contains(3));
    }

    #[test]
    fn test_round_robin_wraps() {
        let mut roster = Roster::from_slice(&[3, 1]).unwrap();
        assert_eq!(roster.next_client(), Some(1));
        assert_eq!(roster.next_client(), Some(3));
        assert_eq!(roster.next_client(), Some(1));
    }

    #[test]
    fn test_empty_roster_has_no_next() {
        let mut roster = Roster::new();
        assert_eq!(roster.next_client(), None);
        assert!(roster.is_empty());
    }

    #[test]
    fn test_rejects_reserved_addresses() {
        let mut roster = Roster::new();
        assert_eq!(roster.insert(0), Err(SessionError::InvalidAddress));
        assert_eq!(roster.insert(0x7F), Err(SessionError::InvalidAddress));
    }

    #[test]
    fn test_full_roster() {
        let mut roster = Roster::new();
        for address in 1..=MAX_CLIENTS as Address {
            roster.insert(address).unwrap();
        }
        assert_eq!(roster.insert(100), Err(SessionError::RosterFull));
        // Already present is still fine
        assert_eq!(roster.insert(1), Ok(()));
    }

    #[test]
    fn test_clear_resets_cursor() {
        let mut roster = Roster::from_slice(&[1, 2]).unwrap();
        roster.next_client();
        roster.clear();
        roster.insert(7).unwrap();
        assert_eq!(roster.next_client(), Some(7));
    }
}
