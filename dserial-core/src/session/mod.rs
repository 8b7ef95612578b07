//! Bus sessions
//!
//! A session owns one stream and drives it from `pump()`. Each role's
//! decisions live in a pure `transition(state, tick) -> (state, action)`
//! function; the session gathers the tick, then performs the action.

mod client;
mod discovery;
mod master;

pub use client::{ClientAction, ClientEvent, ClientSession, ClientState, ClientTick};
pub use master::{Inbound, MasterAction, MasterSession, MasterState, MasterTick};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use crate::sim::{SimClock, VirtualBus};
    use dserial_protocol::control::{SOLVE, STRIKE};
    use dserial_protocol::{Message, Reply, Request, MASTER_ADDRESS};

    #[test]
    fn test_write_reaches_client() {
        let bus = VirtualBus::new();
        let clock = SimClock::new();
        let mut master = MasterSession::new(bus.master_port(), clock.clone());
        let mut client = ClientSession::new(bus.client_port(), 3).unwrap();
        master.set_roster(&[3]).unwrap();

        master.send_data(3, b"hi").unwrap();
        master.pump().unwrap();
        assert_eq!(master.state(), MasterState::Ack);
        client.pump().unwrap();
        master.pump().unwrap();

        assert_eq!(master.state(), MasterState::Waiting);
        assert_eq!(
            client.get_data(),
            Some(Message::new(MASTER_ADDRESS, b"hi").unwrap())
        );
        assert_eq!(master.stats().retries, 0);
    }

    #[test]
    fn test_client_data_reaches_master() {
        let bus = VirtualBus::new();
        let clock = SimClock::new();
        let mut master = MasterSession::new(bus.master_port(), clock.clone());
        let mut client = ClientSession::new(bus.client_port(), 3).unwrap();
        master.set_roster(&[3]).unwrap();
        client.send_data(&[STRIKE]).unwrap();

        // READ, data, ACK, closing ACK
        master.pump().unwrap();
        client.pump().unwrap();
        master.pump().unwrap();
        assert_eq!(master.state(), MasterState::Ack);
        client.pump().unwrap();
        master.pump().unwrap();

        assert_eq!(master.state(), MasterState::Waiting);
        assert_eq!(client.state(), ClientState::Waiting);
        assert_eq!(master.get_data(), Some(Message::new(3, &[STRIKE]).unwrap()));
        assert_eq!(master.get_data(), None);
    }

    #[test]
    fn test_poll_without_data_completes() {
        let bus = VirtualBus::new();
        let clock = SimClock::new();
        let mut master = MasterSession::new(bus.master_port(), clock.clone());
        let mut client = ClientSession::new(bus.client_port(), 3).unwrap();
        master.set_roster(&[3]).unwrap();

        master.pump().unwrap();
        assert_eq!(master.state(), MasterState::Sent);
        client.pump().unwrap();
        master.pump().unwrap();
        assert_eq!(master.state(), MasterState::Waiting);
        assert_eq!(master.queued_reads(), 0);
    }

    #[test]
    fn test_silent_client_times_out_once() {
        let bus = VirtualBus::new();
        let clock = SimClock::new();
        let mut master = MasterSession::new(bus.master_port(), clock.clone());
        master.set_roster(&[3]).unwrap();

        master.pump().unwrap();
        assert_eq!(master.state(), MasterState::Sent);

        let mut results = std::vec::Vec::new();
        for _ in 0..=master.config().max_retries {
            clock.advance(master.config().timeout_ms + 1);
            results.push(master.pump());
        }

        let failures: std::vec::Vec<_> = results.iter().filter(|r| r.is_err()).collect();
        assert_eq!(failures, std::vec![&Err(SessionError::Timeout { address: 3 })]);
        assert_eq!(results.last(), Some(&Err(SessionError::Timeout { address: 3 })));
        assert_eq!(master.state(), MasterState::Waiting);
        assert_eq!(master.stats().retries, 3);
        assert_eq!(master.stats().aborted, 1);

        // One READ plus three retransmissions
        let reads = bus
            .sent_by_master()
            .iter()
            .filter(|p| Request::parse(p) == Request::Read)
            .count();
        assert_eq!(reads, 4);
    }

    #[test]
    fn test_no_timeout_inside_window() {
        let bus = VirtualBus::new();
        let clock = SimClock::new();
        let mut master = MasterSession::new(bus.master_port(), clock.clone());
        master.set_roster(&[3]).unwrap();

        master.pump().unwrap();
        clock.advance(master.config().timeout_ms);
        master.pump().unwrap();
        assert_eq!(master.stats().retries, 0);
        assert_eq!(bus.sent_by_master().len(), 1);
    }

    #[test]
    fn test_corrupt_reply_naks_once() {
        let bus = VirtualBus::new();
        let clock = SimClock::new();
        let mut master = MasterSession::new(bus.master_port(), clock.clone());
        master.set_roster(&[3]).unwrap();

        master.pump().unwrap();
        assert_eq!(master.state(), MasterState::Sent);
        master.send_data(5, b"x").unwrap();
        bus.clear_log();

        let mut frame = Reply::Data(&[SOLVE]).to_packet(3).unwrap().encode_to_vec().unwrap();
        frame[1] ^= 0x01;
        bus.inject_to_master(&frame);
        master.pump().unwrap();

        assert_eq!(bus.sent_by_master(), std::vec![Request::Nak.to_packet(3).unwrap()]);
        assert_eq!(master.state(), MasterState::Sent);
        assert_eq!(master.queued_writes(), 1);
        assert_eq!(master.queued_reads(), 0);
        assert_eq!(master.stats().naks_sent, 1);
    }

    #[test]
    fn test_nak_recovers_from_line_noise() {
        let bus = VirtualBus::new();
        let clock = SimClock::new();
        let mut master = MasterSession::new(bus.master_port(), clock.clone());
        let mut client = ClientSession::new(bus.client_port(), 3).unwrap();
        master.set_roster(&[3]).unwrap();
        client.send_data(&[SOLVE]).unwrap();

        master.pump().unwrap();
        // A damaged frame lands ahead of the client's reply
        let mut noise = Reply::Data(&[SOLVE]).to_packet(3).unwrap().encode_to_vec().unwrap();
        noise[1] ^= 0x02;
        bus.inject_to_master(&noise);
        client.pump().unwrap();

        for _ in 0..6 {
            master.pump().unwrap();
            client.pump().unwrap();
        }

        // Delivered once despite the resend the NAK provoked
        assert_eq!(master.get_data(), Some(Message::new(3, &[SOLVE]).unwrap()));
        assert_eq!(master.get_data(), None);
        assert!(master.stats().naks_sent >= 1);
        assert_eq!(master.stats().corrupt_frames, 1);
    }

    #[test]
    fn test_ignores_reply_from_other_client() {
        let bus = VirtualBus::new();
        let clock = SimClock::new();
        let mut master = MasterSession::new(bus.master_port(), clock.clone());
        master.set_roster(&[3]).unwrap();

        master.pump().unwrap();
        let stray = Reply::Data(&[STRIKE]).to_packet(4).unwrap().encode_to_vec().unwrap();
        bus.inject_to_master(&stray);
        master.pump().unwrap();

        assert_eq!(master.state(), MasterState::Sent);
        assert_eq!(master.queued_reads(), 0);
    }

    #[test]
    fn test_two_clients_exchange_traffic() {
        let bus = VirtualBus::new();
        let clock = SimClock::new();
        let mut master = MasterSession::new(bus.master_port(), clock.clone());
        let mut left = ClientSession::new(bus.client_port(), 3).unwrap();
        let mut right = ClientSession::new(bus.client_port(), 5).unwrap();
        master.set_roster(&[5, 3]).unwrap();

        for n in 0..4u8 {
            master.send_data(3, &[n]).unwrap();
            master.send_data(5, &[n + 10]).unwrap();
        }
        left.send_data(&[STRIKE]).unwrap();
        right.send_data(&[SOLVE]).unwrap();

        for _ in 0..100 {
            master.pump().unwrap();
            left.pump().unwrap();
            right.pump().unwrap();
            clock.advance(1);
        }

        for n in 0..4u8 {
            assert_eq!(left.get_data().unwrap().data.as_slice(), &[n]);
            assert_eq!(right.get_data().unwrap().data.as_slice(), &[n + 10]);
        }
        let mut received = std::vec![master.get_data().unwrap(), master.get_data().unwrap()];
        received.sort_by_key(|m| m.address);
        assert_eq!(received[0], Message::new(3, &[STRIKE]).unwrap());
        assert_eq!(received[1], Message::new(5, &[SOLVE]).unwrap());
        assert_eq!(master.stats().retries, 0);
    }

    #[test]
    fn test_send_data_validation() {
        let bus = VirtualBus::new();
        let mut master = MasterSession::new(bus.master_port(), SimClock::new());
        assert_eq!(master.send_data(0, b"x"), Err(SessionError::InvalidAddress));
        assert_eq!(master.send_data(126, b"x"), Err(SessionError::InvalidAddress));
        assert_eq!(
            master.send_data(3, &[0x41; 15]),
            Err(SessionError::InvalidPayload)
        );
        assert_eq!(master.send_data(3, &[0x41; 14]), Ok(()));
    }

    #[test]
    fn test_write_queue_full() {
        let bus = VirtualBus::new();
        let mut master = MasterSession::new(bus.master_port(), SimClock::new());
        while !master.is_write_queue_full() {
            master.send_data(3, b"x").unwrap();
        }
        assert_eq!(master.queued_writes(), dserial_protocol::MASTER_QUEUE_SIZE);
        assert_eq!(master.send_data(3, b"x"), Err(SessionError::QueueFull));
    }

    #[test]
    fn test_idle_without_roster() {
        let bus = VirtualBus::new();
        let mut master = MasterSession::new(bus.master_port(), SimClock::new());
        master.pump().unwrap();
        assert_eq!(master.state(), MasterState::Waiting);
        assert!(bus.sent_by_master().is_empty());
    }
}
