//! Master session
//!
//! The master starts every transaction. Each pump it either sends one
//! queued write, polls the next client in the roster with READ, or waits
//! for the reply to what it last sent, retransmitting on timeout.
//!
//! ```text
//!            write queued                 ACK
//!   ┌──────────────────────────▶ Ack ───────────┐
//!   │                             ▲             │
//! Waiting                    data │             ▼
//!   │     READ polled             │          Waiting
//!   └──────────────────────────▶ Sent ──────────▶
//!                                       ACK (no data)
//! ```

use dserial_hal::{Clock, Uart};
use dserial_protocol::{
    Address, Message, MessageQueue, Packet, Reply, Request, MASTER_QUEUE_SIZE,
};

use crate::config::{ConfigError, SessionConfig};
use crate::error::SessionError;
use crate::link::{Link, Received};
use crate::roster::Roster;
use crate::stats::LinkStats;

/// Master transaction state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MasterState {
    /// No transaction in flight
    Waiting,
    /// READ sent, waiting for data or ACK
    Sent,
    /// Waiting for the client to acknowledge a write or our ACK
    Ack,
}

/// What arrived from the current peer this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Inbound {
    Nothing,
    Ack,
    Data,
    Corrupt,
}

/// Everything the master transition needs to know about one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MasterTick {
    pub inbound: Inbound,
    /// The reply window for the in-flight message has passed
    pub timed_out: bool,
    /// No retransmissions left for the in-flight message
    pub retries_exhausted: bool,
    /// The outbound write queue is non-empty
    pub has_write: bool,
    /// There is a client to poll and room to store its data
    pub can_poll: bool,
}

/// Side effect requested by a master transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MasterAction {
    /// Nothing to do this tick
    Idle,
    /// Ask the last peer to resend
    SendNak,
    /// Dequeue one write and send it
    SendWrite,
    /// Poll the next client in the roster
    SendRead,
    /// Queue the received data and acknowledge it
    StoreAndAck,
    /// Resend the last message
    Retransmit,
    /// The transaction finished
    Complete,
    /// Retry budget exhausted, drop the transaction
    Abort,
}

impl MasterState {
    /// Returns true while a transaction is in flight
    pub fn is_busy(&self) -> bool {
        !matches!(self, MasterState::Waiting)
    }

    /// Compute the next state and the action to perform
    pub fn transition(self, tick: &MasterTick) -> (Self, MasterAction) {
        use MasterAction::*;
        use MasterState::*;

        match (self, tick.inbound) {
            // Damaged frames are NAKed in every state
            (state, Inbound::Corrupt) => (state, SendNak),

            // Stray valid packets are ignored between transactions
            (Waiting, _) if tick.has_write => (Ack, SendWrite),
            (Waiting, _) if tick.can_poll => (Sent, SendRead),
            (Waiting, _) => (Waiting, Idle),

            // Client had nothing
            (Sent, Inbound::Ack) => (Waiting, Complete),
            (Sent, Inbound::Data) => (Ack, StoreAndAck),

            (Ack, Inbound::Ack) => (Waiting, Complete),
            (Ack, Inbound::Data) => (Ack, SendNak),

            (state, Inbound::Nothing) if tick.timed_out => {
                if tick.retries_exhausted {
                    (Waiting, Abort)
                } else {
                    (state, Retransmit)
                }
            }
            (state, _) => (state, Idle),
        }
    }
}

/// Bus master: polls clients and delivers queued writes
pub struct MasterSession<U, C> {
    pub(super) link: Link<U>,
    pub(super) clock: C,
    pub(super) config: SessionConfig,
    pub(super) state: MasterState,
    pub(super) roster: Roster,
    outbox: MessageQueue<MASTER_QUEUE_SIZE>,
    inbox: MessageQueue<MASTER_QUEUE_SIZE>,
    /// Client of the current or most recent transaction
    pub(super) peer: Option<Address>,
    /// Message resent on timeout
    last_sent: Option<Packet>,
    retries: u8,
    sent_at: u32,
}

impl<U: Uart, C: Clock> MasterSession<U, C> {
    /// Create a master with the default configuration and an empty roster
    pub fn new(uart: U, clock: C) -> Self {
        Self {
            link: Link::new(uart),
            clock,
            config: SessionConfig::default(),
            state: MasterState::Waiting,
            roster: Roster::new(),
            outbox: MessageQueue::new(),
            inbox: MessageQueue::new(),
            peer: None,
            last_sent: None,
            retries: 0,
            sent_at: 0,
        }
    }

    /// Create a master with a custom configuration
    pub fn with_config(uart: U, clock: C, config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut session = Self::new(uart, clock);
        session.config = config;
        Ok(session)
    }

    /// Queue `data` for delivery to `client`
    pub fn send_data(&mut self, client: Address, data: &[u8]) -> Result<(), SessionError> {
        if !dserial_protocol::is_client_address(client) {
            return Err(SessionError::InvalidAddress);
        }
        let packet = Request::Write(data).to_packet(client)?;
        self.outbox.push(packet).map_err(|e| {
            warn!("write queue full, rejecting message for {}", client);
            e
        })?;
        Ok(())
    }

    /// Take the oldest message received from a client
    pub fn get_data(&mut self) -> Option<Message> {
        let packet = self.inbox.pop()?;
        Message::new(packet.address(), packet.body()).ok()
    }

    /// Advance the session by one tick
    ///
    /// Must be called often; nothing happens between calls. Returns
    /// [`SessionError::Timeout`] once when a transaction is abandoned.
    pub fn pump(&mut self) -> Result<(), SessionError> {
        let received = self.link.receive()?;
        let tick = MasterTick {
            inbound: self.classify(&received),
            timed_out: self.state.is_busy()
                && self.clock.elapsed_ms(self.sent_at) > self.config.timeout_ms,
            retries_exhausted: self.retries >= self.config.max_retries,
            has_write: !self.outbox.is_empty(),
            can_poll: !self.roster.is_empty() && !self.inbox.is_full(),
        };

        let (next, action) = self.state.transition(&tick);
        if next != self.state {
            trace!("master {:?} -> {:?}", self.state, next);
        }
        self.state = next;
        self.execute(action, received)
    }

    fn classify(&self, received: &Received) -> Inbound {
        match received {
            Received::Nothing => Inbound::Nothing,
            Received::Corrupt => Inbound::Corrupt,
            Received::Packet(packet) => {
                if self.peer != Some(packet.address()) {
                    debug!("ignoring packet from {}", packet.address());
                    return Inbound::Nothing;
                }
                match Reply::parse(packet) {
                    Reply::Ack => Inbound::Ack,
                    // A reply carrying only the address is as good as damaged
                    Reply::Data(data) if data.is_empty() => Inbound::Corrupt,
                    Reply::Data(_) => Inbound::Data,
                }
            }
        }
    }

    fn execute(&mut self, action: MasterAction, received: Received) -> Result<(), SessionError> {
        match action {
            MasterAction::Idle => Ok(()),
            MasterAction::SendNak => {
                // Nobody to NAK before the first transaction
                let Some(peer) = self.peer else {
                    return Ok(());
                };
                debug!("sending NAK to {}", peer);
                LinkStats::bump(&mut self.link.stats.naks_sent);
                self.send(Request::Nak.to_packet(peer)?)
            }
            MasterAction::SendWrite => match self.outbox.pop() {
                Some(packet) => self.begin(packet),
                None => Ok(()),
            },
            MasterAction::SendRead => match self.roster.next_client() {
                Some(client) => self.begin(Request::Read.to_packet(client)?),
                None => Ok(()),
            },
            MasterAction::StoreAndAck => {
                let Received::Packet(packet) = received else {
                    return Ok(());
                };
                let address = packet.address();
                let stored = self.inbox.push(packet);
                if stored.is_err() {
                    warn!("read queue full, dropping data from {}", address);
                    LinkStats::bump(&mut self.link.stats.dropped);
                }
                // Acknowledge regardless so the client moves on
                self.send(Request::Ack.to_packet(address)?)?;
                stored.map_err(SessionError::from)
            }
            MasterAction::Retransmit => {
                self.retries += 1;
                LinkStats::bump(&mut self.link.stats.retries);
                debug!("timeout, retry {} of {}", self.retries, self.config.max_retries);
                match self.last_sent.clone() {
                    Some(packet) => self.send(packet),
                    None => Ok(()),
                }
            }
            MasterAction::Complete => {
                trace!("transaction with {:?} complete", self.peer);
                Ok(())
            }
            MasterAction::Abort => {
                let address = self.peer.unwrap_or_default();
                warn!("no answer from {}, dropping transaction", address);
                LinkStats::bump(&mut self.link.stats.aborted);
                self.last_sent = None;
                Err(SessionError::Timeout { address })
            }
        }
    }

    /// Start a new transaction with `packet`
    fn begin(&mut self, packet: Packet) -> Result<(), SessionError> {
        self.peer = Some(packet.address());
        self.retries = 0;
        self.send(packet)
    }

    /// Transmit `packet` and make it the message resent on timeout
    fn send(&mut self, packet: Packet) -> Result<(), SessionError> {
        self.sent_at = self.clock.now_ms();
        let result = self.link.transmit(&packet);
        self.last_sent = Some(packet);
        result
    }

    /// Replace the roster without running discovery
    pub fn set_roster(&mut self, clients: &[Address]) -> Result<(), SessionError> {
        self.roster = Roster::from_slice(clients)?;
        Ok(())
    }

    /// Clients currently polled, in ascending order
    pub fn roster(&self) -> &[Address] {
        self.roster.as_slice()
    }

    pub fn state(&self) -> MasterState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn stats(&self) -> &LinkStats {
        self.link.stats()
    }

    /// Writes waiting to go out
    pub fn queued_writes(&self) -> usize {
        self.outbox.len()
    }

    /// Received messages not yet taken with [`Self::get_data`]
    pub fn queued_reads(&self) -> usize {
        self.inbox.len()
    }

    /// Returns true if [`Self::send_data`] would be rejected
    pub fn is_write_queue_full(&self) -> bool {
        self.outbox.is_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tick(inbound: Inbound) -> MasterTick {
        MasterTick {
            inbound,
            timed_out: false,
            retries_exhausted: false,
            has_write: false,
            can_poll: false,
        }
    }

    #[test]
    fn test_waiting_prefers_writes() {
        let t = MasterTick {
            has_write: true,
            can_poll: true,
            ..tick(Inbound::Nothing)
        };
        assert_eq!(
            MasterState::Waiting.transition(&t),
            (MasterState::Ack, MasterAction::SendWrite)
        );
    }

    #[test]
    fn test_waiting_polls_then_idles() {
        let poll = MasterTick {
            can_poll: true,
            ..tick(Inbound::Nothing)
        };
        assert_eq!(
            MasterState::Waiting.transition(&poll),
            (MasterState::Sent, MasterAction::SendRead)
        );
        assert_eq!(
            MasterState::Waiting.transition(&tick(Inbound::Nothing)),
            (MasterState::Waiting, MasterAction::Idle)
        );
    }

    #[test]
    fn test_corrupt_naks_in_every_state() {
        for state in [MasterState::Waiting, MasterState::Sent, MasterState::Ack] {
            let t = MasterTick {
                has_write: true,
                timed_out: true,
                ..tick(Inbound::Corrupt)
            };
            assert_eq!(state.transition(&t), (state, MasterAction::SendNak));
        }
    }

    #[test]
    fn test_sent_replies() {
        assert_eq!(
            MasterState::Sent.transition(&tick(Inbound::Ack)),
            (MasterState::Waiting, MasterAction::Complete)
        );
        assert_eq!(
            MasterState::Sent.transition(&tick(Inbound::Data)),
            (MasterState::Ack, MasterAction::StoreAndAck)
        );
    }

    #[test]
    fn test_ack_replies() {
        assert_eq!(
            MasterState::Ack.transition(&tick(Inbound::Ack)),
            (MasterState::Waiting, MasterAction::Complete)
        );
        assert_eq!(
            MasterState::Ack.transition(&tick(Inbound::Data)),
            (MasterState::Ack, MasterAction::SendNak)
        );
    }

    #[test]
    fn test_timeout_retries_then_aborts() {
        let timed_out = MasterTick {
            timed_out: true,
            ..tick(Inbound::Nothing)
        };
        let exhausted = MasterTick {
            retries_exhausted: true,
            ..timed_out
        };
        for state in [MasterState::Sent, MasterState::Ack] {
            assert_eq!(state.transition(&timed_out), (state, MasterAction::Retransmit));
            assert_eq!(
                state.transition(&exhausted),
                (MasterState::Waiting, MasterAction::Abort)
            );
        }
    }

    #[test]
    fn test_reply_beats_timeout() {
        let late_ack = MasterTick {
            timed_out: true,
            retries_exhausted: true,
            ..tick(Inbound::Ack)
        };
        assert_eq!(
            MasterState::Sent.transition(&late_ack),
            (MasterState::Waiting, MasterAction::Complete)
        );
    }

    fn any_state() -> impl Strategy<Value = MasterState> {
        prop_oneof![
            Just(MasterState::Waiting),
            Just(MasterState::Sent),
            Just(MasterState::Ack),
        ]
    }

    fn any_inbound() -> impl Strategy<Value = Inbound> {
        prop_oneof![
            Just(Inbound::Nothing),
            Just(Inbound::Ack),
            Just(Inbound::Data),
            Just(Inbound::Corrupt),
        ]
    }

    proptest! {
        #[test]
        fn prop_transition_is_consistent(
            state in any_state(),
            inbound in any_inbound(),
            timed_out: bool,
            retries_exhausted: bool,
            has_write: bool,
            can_poll: bool,
        ) {
            let t = MasterTick { inbound, timed_out, retries_exhausted, has_write, can_poll };
            let (next, action) = state.transition(&t);

            // Only an idle master starts transactions
            if matches!(action, MasterAction::SendWrite | MasterAction::SendRead) {
                prop_assert_eq!(state, MasterState::Waiting);
                prop_assert!(next.is_busy());
            }
            // Aborts need both an expired window and an empty budget
            if action == MasterAction::Abort {
                prop_assert!(timed_out && retries_exhausted);
                prop_assert_eq!(next, MasterState::Waiting);
            }
            // An idle master never retransmits
            if state == MasterState::Waiting {
                prop_assert_ne!(action, MasterAction::Retransmit);
            }
            if inbound == Inbound::Corrupt {
                prop_assert_eq!(action, MasterAction::SendNak);
                prop_assert_eq!(next, state);
            }
        }
    }
}
