//! Per-node send queue with Ethernet-style framing.
//!
//! Grounded in `original_source/src/dama/model/simplebroadcastmac.{h,cc}`.
//! The bounded-queue-with-warning idiom (error at capacity, warn past a
//! threshold fraction) is reused from the teacher's
//! `simulation/types.rs::Node::push_airtime_packet`.

use std::collections::VecDeque;

use crate::dama::types::{EtherType, Frame, MacAddress};
use crate::sim::Millis;

/// Default `MaxPacketNumber`.
pub const DEFAULT_MAX_PACKET_NUMBER: usize = 400;

/// Queue occupancy fraction past which `enqueue` logs a warning, matching
/// the teacher's `AIRTIME_CAPACITY_WARNING_THRESHOLD` idiom.
const QUEUE_WARNING_THRESHOLD: f32 = 0.8;

/// An item waiting to be sent: not yet framed.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub payload: Vec<u8>,
    pub ether_type: EtherType,
    pub dst: MacAddress,
    pub enqueued_at: Millis,
}

/// Per-node MAC: bounded FIFO queue plus the device's own address.
pub struct Mac {
    address: MacAddress,
    max_size: usize,
    queue: VecDeque<QueueItem>,
}

impl Mac {
    pub fn new(address: MacAddress, max_size: usize) -> Self {
        Mac { address, max_size, queue: VecDeque::new() }
    }

    pub fn address(&self) -> MacAddress {
        self.address
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Append a packet to the send queue. `from` is accepted for bridging
    /// callers but silently ignored: this Mac variant always frames with its
    /// own address as source. Returns `false` (and drops the packet) if the
    /// queue is full.
    pub fn enqueue(
        &mut self,
        payload: Vec<u8>,
        ether_type: EtherType,
        dst: MacAddress,
        from: Option<MacAddress>,
        now: Millis,
    ) -> bool {
        if from.is_some() {
            log::warn!(
                "mac {}: enqueue() ignores explicit `from` address; framing with own address",
                self.address
            );
        }
        if self.queue.len() >= self.max_size {
            log::error!(
                "mac {}: queue full ({} packets), dropping frame to {}",
                self.address,
                self.max_size,
                dst
            );
            return false;
        }
        self.queue.push_back(QueueItem { payload, ether_type, dst, enqueued_at: now });
        let occupancy = self.queue.len() as f32 / self.max_size as f32;
        if occupancy >= QUEUE_WARNING_THRESHOLD {
            log::warn!(
                "mac {}: queue at {:.0}% capacity ({}/{})",
                self.address,
                occupancy * 100.0,
                self.queue.len(),
                self.max_size
            );
        }
        true
    }

    pub fn has_data(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Dequeue the head of the queue and prepend the Ethernet-style header,
    /// returning the framed `Frame` ready for the channel. MUST be called
    /// only by the owning Controller. The caller (the `Network` dispatch
    /// loop) is responsible for handing the returned frame to
    /// `Channel::send` in the same turn — this separates the Mac's local
    /// "decision applied" step from channel I/O, matching the Rc-free,
    /// index-based ownership nodes and devices live under.
    pub fn send_head(&mut self) -> Option<Frame> {
        let item = self.queue.pop_front()?;
        Some(Frame::new(item.dst, self.address, item.ether_type, item.payload))
    }

    /// Strip the header from a received frame and return `(payload, src, dst)`
    /// for the upward forwarding callback.
    pub fn receive(&self, frame: Frame) -> (Vec<u8>, MacAddress, MacAddress) {
        (frame.payload, frame.src, frame.dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> MacAddress {
        MacAddress([0, 0, 0, 0, 0, n])
    }

    #[test]
    fn enqueue_respects_capacity() {
        let mut mac = Mac::new(addr(1), 2);
        assert!(mac.enqueue(vec![1], 0x0800, addr(2), None, Millis(0)));
        assert!(mac.enqueue(vec![2], 0x0800, addr(2), None, Millis(0)));
        assert!(!mac.enqueue(vec![3], 0x0800, addr(2), None, Millis(0)));
        assert_eq!(mac.queue_len(), 2);
    }

    #[test]
    fn send_head_frames_with_own_address_as_source() {
        let mut mac = Mac::new(addr(1), 10);
        mac.enqueue(vec![9, 9], 0x0800, addr(2), None, Millis(0));
        let frame = mac.send_head().unwrap();
        assert_eq!(frame.src, addr(1));
        assert_eq!(frame.dst, addr(2));
        assert_eq!(frame.payload, vec![9, 9]);
        assert!(!mac.has_data());
    }

    #[test]
    fn from_override_is_ignored_not_honored() {
        let mut mac = Mac::new(addr(1), 10);
        mac.enqueue(vec![1], 0x0800, addr(2), Some(addr(99)), Millis(0));
        let frame = mac.send_head().unwrap();
        assert_eq!(frame.src, addr(1));
    }

    #[test]
    fn fifo_order_is_preserved() {
        let mut mac = Mac::new(addr(1), 10);
        mac.enqueue(vec![1], 0x0800, addr(2), None, Millis(0));
        mac.enqueue(vec![2], 0x0800, addr(3), None, Millis(1));
        assert_eq!(mac.send_head().unwrap().payload, vec![1]);
        assert_eq!(mac.send_head().unwrap().payload, vec![2]);
    }

    #[test]
    fn send_head_on_empty_queue_returns_none() {
        let mut mac = Mac::new(addr(1), 10);
        assert!(mac.send_head().is_none());
    }
}
