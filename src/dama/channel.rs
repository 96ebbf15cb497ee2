//! Shared broadcast medium.
//!
//! Grounded in `original_source/src/dama/model/simplebroadcastchannel.{h,cc}`:
//! at most one frame in flight; a second transmission while the channel is
//! in use collides with the first, notifying both senders' controllers and
//! cancelling the in-flight frame's delivery, while still re-arming
//! `free-channel` for the *new* attempted duration (verbatim source
//! behavior, not a simplification).
//!
//! `Channel` does not call into `Controller`/`Mac` itself — it returns a
//! [`SendOutcome`] describing what happened, and the owning
//! [`crate::dama::network::Network`] performs the controller up-calls. This
//! keeps `Channel` from needing a reference back into the arena it's shared
//! by.

use crate::dama::types::{Frame, NodeId};
use crate::sim::{EventId, Millis, Simulator};

/// Default propagation delay.
pub const DEFAULT_PROPAGATION: Millis = Millis(200);

/// Events a `Channel` schedules on the simulator. Shared by exactly one
/// `Channel` per `Network` (this crate models a single shared medium), so
/// no channel id is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Deliver the channel's current in-flight frame to this node.
    Deliver(NodeId),
    /// Clear `in_use`/`active_sender` and drop the in-flight frame.
    FreeChannel,
}

/// Result of a `Channel::send` call, for the caller to act on.
pub enum SendOutcome {
    /// The channel was free; `targets` will receive `Deliver` events.
    Delivering { targets: Vec<NodeId> },
    /// The channel was already in use: both `sender` and `active_sender`
    /// must be notified of a collision by their controllers.
    Collided { sender: NodeId, active_sender: NodeId },
}

pub struct Channel {
    propagation: Millis,
    attached: Vec<NodeId>,
    in_use: bool,
    active_sender: Option<NodeId>,
    current_frame: Option<Frame>,
    pending_events: Vec<EventId>,
}

impl Channel {
    pub fn new(propagation: Millis) -> Self {
        Channel {
            propagation,
            attached: Vec::new(),
            in_use: false,
            active_sender: None,
            current_frame: None,
            pending_events: Vec::new(),
        }
    }

    pub fn attach(&mut self, node: NodeId) {
        self.attached.push(node);
    }

    pub fn in_use(&self) -> bool {
        self.in_use
    }

    pub fn active_sender(&self) -> Option<NodeId> {
        self.active_sender
    }

    /// If the channel is free, start delivering to every other attached
    /// node and arm `free-channel`. If it's already in use, this is a
    /// collision: cancel all pending delivery events for the frame in
    /// flight, but still arm `free-channel` for the new transmission's
    /// attempted duration.
    pub fn send<S: Simulator<ChannelEvent>>(
        &mut self,
        sim: &mut S,
        frame: Frame,
        sender: NodeId,
    ) -> SendOutcome {
        if self.in_use {
            let active_sender = self.active_sender.expect("in_use implies active_sender");
            log::debug!("channel: collision between {sender:?} and {active_sender:?}");
            for id in self.pending_events.drain(..) {
                sim.cancel(id);
            }
            self.current_frame = None;
            let free_id = sim.schedule(self.propagation, ChannelEvent::FreeChannel);
            self.pending_events.push(free_id);
            SendOutcome::Collided { sender, active_sender }
        } else {
            self.in_use = true;
            self.active_sender = Some(sender);
            self.current_frame = Some(frame);
            let targets: Vec<NodeId> =
                self.attached.iter().copied().filter(|&n| n != sender).collect();
            for &target in &targets {
                let id = sim.schedule(self.propagation, ChannelEvent::Deliver(target));
                self.pending_events.push(id);
            }
            let free_id = sim.schedule(self.propagation, ChannelEvent::FreeChannel);
            self.pending_events.push(free_id);
            log::trace!("channel: {sender:?} transmitting to {} listener(s)", targets.len());
            SendOutcome::Delivering { targets }
        }
    }

    /// Retrieve the in-flight frame to deliver to `to`, invoked on a
    /// `Deliver` event. The actual `Mac::receive` call happens in `Network`,
    /// which owns the `Mac` arena.
    pub fn deliver(&self, to: NodeId) -> Option<Frame> {
        debug_assert_ne!(Some(to), self.active_sender, "no self-delivery");
        self.current_frame.clone()
    }

    /// Clears `in_use`, `active_sender`, and all pending events.
    pub fn free_channel(&mut self) {
        self.in_use = false;
        self.active_sender = None;
        self.current_frame = None;
        self.pending_events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::LogicalClock;

    fn frame(n: u8) -> Frame {
        use crate::dama::types::MacAddress;
        Frame::new(MacAddress([0; 6]), MacAddress([n; 6]), 0x0800, vec![n])
    }

    #[test]
    fn free_channel_send_delivers_to_all_but_sender() {
        let mut ch = Channel::new(Millis(10));
        ch.attach(NodeId(0));
        ch.attach(NodeId(1));
        ch.attach(NodeId(2));
        let mut clock: LogicalClock<ChannelEvent> = LogicalClock::new();
        match ch.send(&mut clock, frame(1), NodeId(0)) {
            SendOutcome::Delivering { targets } => {
                assert_eq!(targets, vec![NodeId(1), NodeId(2)]);
            }
            SendOutcome::Collided { .. } => panic!("expected free channel"),
        }
        assert!(ch.in_use());
        assert_eq!(ch.active_sender(), Some(NodeId(0)));
    }

    #[test]
    fn concurrent_send_while_in_use_collides() {
        let mut ch = Channel::new(Millis(10));
        ch.attach(NodeId(0));
        ch.attach(NodeId(1));
        let mut clock: LogicalClock<ChannelEvent> = LogicalClock::new();
        ch.send(&mut clock, frame(1), NodeId(0));
        match ch.send(&mut clock, frame(2), NodeId(1)) {
            SendOutcome::Collided { sender, active_sender } => {
                assert_eq!(sender, NodeId(1));
                assert_eq!(active_sender, NodeId(0));
            }
            SendOutcome::Delivering { .. } => panic!("expected collision"),
        }
        // the in-flight frame's deliveries were cancelled
        assert!(ch.current_frame.is_none());
    }

    #[test]
    fn free_channel_resets_state() {
        let mut ch = Channel::new(Millis(10));
        ch.attach(NodeId(0));
        ch.attach(NodeId(1));
        let mut clock: LogicalClock<ChannelEvent> = LogicalClock::new();
        ch.send(&mut clock, frame(1), NodeId(0));
        ch.free_channel();
        assert!(!ch.in_use());
        assert!(ch.active_sender().is_none());
    }

    #[test]
    fn no_self_delivery_target_list_excludes_sender() {
        let mut ch = Channel::new(Millis(10));
        ch.attach(NodeId(5));
        let mut clock: LogicalClock<ChannelEvent> = LogicalClock::new();
        match ch.send(&mut clock, frame(1), NodeId(5)) {
            SendOutcome::Delivering { targets } => assert!(targets.is_empty()),
            SendOutcome::Collided { .. } => panic!(),
        }
    }
}
