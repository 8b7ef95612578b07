//! Client session
//!
//! A client never speaks first. It answers requests addressed to it and
//! ignores everything else, damaged frames included: it cannot tell whether
//! a damaged frame was meant for it, so the master's timeout does the work.

use dserial_hal::Uart;
use dserial_protocol::{
    is_client_address, message::is_valid_reply_data, Address, Message, MessageQueue, Packet,
    Reply, Request, CLIENT_QUEUE_SIZE, MASTER_ADDRESS,
};

use crate::error::SessionError;
use crate::link::{Link, Received};
use crate::stats::LinkStats;

/// Client transaction state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClientState {
    /// Ready for any request
    Waiting,
    /// Data handed to the master, waiting for its ACK
    Sent,
}

/// Kind of request received from the master
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClientEvent {
    Read,
    Write,
    Ping,
    Ack,
    Nak,
    Unknown,
}

impl From<Request<'_>> for ClientEvent {
    fn from(request: Request<'_>) -> Self {
        match request {
            Request::Read => ClientEvent::Read,
            Request::Write(_) => ClientEvent::Write,
            Request::Ping => ClientEvent::Ping,
            Request::Ack => ClientEvent::Ack,
            Request::Nak => ClientEvent::Nak,
            Request::Unknown => ClientEvent::Unknown,
        }
    }
}

/// Everything the client transition needs to know about one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClientTick {
    pub event: ClientEvent,
    /// Outbound queue holds data for the master
    pub has_reply: bool,
    /// Inbound queue has no room for a write
    pub inbox_full: bool,
}

/// Side effect requested by a client transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClientAction {
    /// Ignore the request
    Idle,
    /// Reply ACK and remember it as the last response
    SendAck,
    /// Reply ACK without touching the last response
    AnswerPing,
    /// Dequeue outbound data and send it
    SendReply,
    /// Queue the written data and ACK it
    StoreAndAck,
    /// Write arrived with the inbound queue full; stay silent
    DropWrite,
    /// Send the last response again
    Resend,
}

impl ClientState {
    /// Compute the next state and the action to perform
    pub fn transition(self, tick: &ClientTick) -> (Self, ClientAction) {
        use ClientAction::*;
        use ClientState::*;

        match (self, tick.event) {
            (state, ClientEvent::Nak) => (state, Resend),
            (state, ClientEvent::Ping) => (state, AnswerPing),

            (Waiting, ClientEvent::Read) if tick.has_reply => (Sent, SendReply),
            (Waiting, ClientEvent::Read) => (Waiting, SendAck),
            // Our closing ACK was lost; say it again
            (Waiting, ClientEvent::Ack) => (Waiting, SendAck),

            (Sent, ClientEvent::Ack) => (Waiting, SendAck),
            // Master never saw our data
            (Sent, ClientEvent::Read) => (Sent, Resend),

            // A write while Sent means the master gave up on the read
            (_, ClientEvent::Write) if tick.inbox_full => (Waiting, DropWrite),
            (_, ClientEvent::Write) => (Waiting, StoreAndAck),

            (state, ClientEvent::Unknown) => (state, Idle),
        }
    }
}

/// Bus client answering the master at one fixed address
pub struct ClientSession<U> {
    link: Link<U>,
    address: Address,
    state: ClientState,
    inbox: MessageQueue<CLIENT_QUEUE_SIZE>,
    outbox: MessageQueue<CLIENT_QUEUE_SIZE>,
    last_response: Option<Packet>,
}

impl<U: Uart> ClientSession<U> {
    /// Create a client listening at `address`
    pub fn new(uart: U, address: Address) -> Result<Self, SessionError> {
        if !is_client_address(address) {
            return Err(SessionError::InvalidAddress);
        }
        Ok(Self {
            link: Link::new(uart),
            address,
            state: ClientState::Waiting,
            inbox: MessageQueue::new(),
            outbox: MessageQueue::new(),
            last_response: None,
        })
    }

    /// Queue `data` to hand over at the next READ
    ///
    /// The data must be non-empty and must not start with ACK, or the master
    /// would take it for a "no data" reply.
    pub fn send_data(&mut self, data: &[u8]) -> Result<(), SessionError> {
        if !is_valid_reply_data(data) {
            return Err(SessionError::InvalidPayload);
        }
        let packet = Reply::Data(data).to_packet(self.address)?;
        self.outbox.push(packet)?;
        Ok(())
    }

    /// Take the oldest message written by the master
    pub fn get_data(&mut self) -> Option<Message> {
        let packet = self.inbox.pop()?;
        Message::new(MASTER_ADDRESS, packet.tail()).ok()
    }

    /// Answer at most one request
    pub fn pump(&mut self) -> Result<(), SessionError> {
        let packet = match self.link.receive()? {
            Received::Packet(packet) => packet,
            Received::Corrupt => {
                debug!("ignoring damaged frame");
                return Ok(());
            }
            Received::Nothing => return Ok(()),
        };
        if packet.address() != self.address {
            return Ok(());
        }

        let tick = ClientTick {
            event: ClientEvent::from(Request::parse(&packet)),
            has_reply: !self.outbox.is_empty(),
            inbox_full: self.inbox.is_full(),
        };
        let (next, action) = self.state.transition(&tick);
        if next != self.state {
            trace!("client {:?} -> {:?}", self.state, next);
        }
        self.state = next;

        match action {
            ClientAction::Idle => Ok(()),
            ClientAction::SendAck => self.respond(Reply::Ack.to_packet(self.address)?),
            ClientAction::AnswerPing => {
                let ack = Reply::Ack.to_packet(self.address)?;
                self.link.transmit(&ack)
            }
            ClientAction::SendReply => match self.outbox.pop() {
                Some(reply) => self.respond(reply),
                None => Ok(()),
            },
            ClientAction::StoreAndAck => {
                self.inbox.push(packet)?;
                self.respond(Reply::Ack.to_packet(self.address)?)
            }
            ClientAction::DropWrite => {
                warn!("inbox full, dropping write");
                LinkStats::bump(&mut self.link.stats.dropped);
                Ok(())
            }
            ClientAction::Resend => match self.last_response.clone() {
                Some(response) => self.link.transmit(&response),
                None => Ok(()),
            },
        }
    }

    fn respond(&mut self, packet: Packet) -> Result<(), SessionError> {
        let result = self.link.transmit(&packet);
        self.last_response = Some(packet);
        result
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn stats(&self) -> &LinkStats {
        self.link.stats()
    }

    /// Replies waiting for the next READ
    pub fn queued_replies(&self) -> usize {
        self.outbox.len()
    }

    /// Returns true if [`Self::send_data`] would be rejected for space
    pub fn is_reply_queue_full(&self) -> bool {
        self.outbox.is_full()
    }
}
