//! Bounded message queue
//!
//! Fixed-capacity FIFO of packets. Each queued packet lives in exactly one
//! slot; popping moves it out, so no message is ever held by two queues.

use heapless::Deque;

use crate::frame::Packet;

/// Inbound and outbound queue depth on the master
pub const MASTER_QUEUE_SIZE: usize = 40;

/// Inbound and outbound queue depth on a client
pub const CLIENT_QUEUE_SIZE: usize = 20;

/// Returned when pushing onto a full queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QueueFull;

/// FIFO of packets holding at most `N` entries
#[derive(Debug, Clone)]
pub struct MessageQueue<const N: usize> {
    slots: Deque<Packet, N>,
}

impl<const N: usize> Default for MessageQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> MessageQueue<N> {
    /// Create an empty queue
    pub const fn new() -> Self {
        Self {
            slots: Deque::new(),
        }
    }

    /// Append a packet at the tail
    pub fn push(&mut self, packet: Packet) -> Result<(), QueueFull> {
        self.slots.push_back(packet).map_err(|_| QueueFull)
    }

    /// Remove the packet at the head
    pub fn pop(&mut self) -> Option<Packet> {
        self.slots.pop_front()
    }

    pub fn is_full(&self) -> bool {
        self.slots.is_full()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Drop every queued packet
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn packet(tag: u8) -> Packet {
        Packet::new(&[1, tag]).unwrap()
    }

    #[test]
    fn test_new_queue_is_empty() {
        let mut queue = MessageQueue::<4>::new();
        assert!(queue.is_empty());
        assert!(!queue.is_full());
        assert_eq!(queue.pop(), None);
        assert_eq!(queue.capacity(), 4);
    }

    #[test]
    fn test_full_after_capacity_pushes() {
        let mut queue = MessageQueue::<3>::new();
        for tag in 0..3 {
            assert_eq!(queue.push(packet(tag)), Ok(()));
        }
        assert!(queue.is_full());
        assert_eq!(queue.push(packet(9)), Err(QueueFull));
        assert_eq!(queue.len(), 3);

        // One pop frees exactly one slot
        assert_eq!(queue.pop(), Some(packet(0)));
        assert_eq!(queue.push(packet(9)), Ok(()));
        assert_eq!(queue.push(packet(10)), Err(QueueFull));
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = MessageQueue::<CLIENT_QUEUE_SIZE>::new();
        queue.push(packet(1)).unwrap();
        queue.push(packet(2)).unwrap();
        queue.push(packet(3)).unwrap();
        assert_eq!(queue.pop(), Some(packet(1)));
        assert_eq!(queue.pop(), Some(packet(2)));
        assert_eq!(queue.pop(), Some(packet(3)));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut queue = MessageQueue::<MASTER_QUEUE_SIZE>::new();
        queue.push(packet(1)).unwrap();
        queue.clear();
        assert!(queue.is_empty());
    }

    proptest! {
        #[test]
        fn prop_interleaved_ops_are_fifo(ops in proptest::collection::vec(any::<bool>(), 0..200)) {
            // true = push, false = pop; compare against a reference model
            let mut queue = MessageQueue::<8>::new();
            let mut model = std::collections::VecDeque::new();
            let mut next = 0u8;

            for push in ops {
                if push {
                    let result = queue.push(packet(next));
                    if model.len() < 8 {
                        prop_assert_eq!(result, Ok(()));
                        model.push_back(next);
                    } else {
                        prop_assert_eq!(result, Err(QueueFull));
                    }
                    next = next.wrapping_add(1) & 0x7F;
                } else {
                    let popped = queue.pop();
                    prop_assert_eq!(popped, model.pop_front().map(packet));
                }
                prop_assert_eq!(queue.len(), model.len());
                prop_assert_eq!(queue.is_full(), model.len() == 8);
                prop_assert_eq!(queue.is_empty(), model.is_empty());
            }
        }
    }
}
