//! Thin façade gluing Mac, Controller, and Channel.
//!
//! Grounded in `original_source/src/dama/model/damanetdevice.h`: the
//! `MAX_MSDU_SIZE` constant (802.11 MSDU bound) and the `ForwardUp`
//! classification (broadcast / multicast / unicast-to-self / unicast-other)
//! are reproduced here; the full trace-source list in that header is
//! reduced to [`crate::dama::observer::DamaObserver`].

use crate::dama::mac::Mac;
use crate::dama::observer::DamaObserver;
use crate::dama::raloha::RAlohaController;
use crate::dama::types::{EtherType, Frame, MacAddress, NodeId};

/// 802.11 MSDU size bound (`original_source/damanetdevice.h`).
pub const MAX_MSDU_SIZE: usize = 2304;
/// 802.2 LLC + SNAP (OUI + PID) header length.
pub const LLC_SNAP_HEADER_LEN: usize = 8;
/// Default MTU: `MAX_MSDU_SIZE - LLC_SNAP_HEADER_LEN`.
pub const DEFAULT_MTU: usize = MAX_MSDU_SIZE - LLC_SNAP_HEADER_LEN;

/// Classification of an inbound frame, used to decide which controller
/// notification(s) and upward callback apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveClass {
    Broadcast,
    Multicast,
    UnicastToSelf,
    UnicastOther,
}

fn classify(dst: MacAddress, own: MacAddress) -> ReceiveClass {
    if dst.is_broadcast() {
        ReceiveClass::Broadcast
    } else if dst.is_multicast() {
        ReceiveClass::Multicast
    } else if dst == own {
        ReceiveClass::UnicastToSelf
    } else {
        ReceiveClass::UnicastOther
    }
}

/// A payload delivered upward, after LLC/SNAP stripping.
pub struct UpwardPacket {
    pub payload: Vec<u8>,
    pub protocol: EtherType,
    pub from: MacAddress,
    pub to: MacAddress,
}

pub struct NetDevice {
    id: NodeId,
    pub mac: Mac,
    pub controller: RAlohaController,
    mtu: usize,
    promiscuous: bool,
    observer: Option<Box<dyn DamaObserver>>,
}

impl NetDevice {
    pub fn new(id: NodeId, mac: Mac, controller: RAlohaController) -> Self {
        NetDevice { id, mac, controller, mtu: DEFAULT_MTU, promiscuous: false, observer: None }
    }

    pub fn set_observer(&mut self, observer: Box<dyn DamaObserver>) {
        self.observer = Some(observer);
    }

    /// A frame was handed to the channel. Called by `Network` right after
    /// `Mac::send_head`.
    pub fn notify_mac_tx(&mut self, frame: &Frame) {
        if let Some(obs) = self.observer.as_deref_mut() {
            obs.on_mac_tx(self.id, frame);
        }
    }

    /// A collision was reported to this node's controller.
    pub fn notify_collision(&mut self) {
        if let Some(obs) = self.observer.as_deref_mut() {
            obs.on_collision(self.id);
        }
    }

    /// A slot's reservation flags changed following a tick or collision.
    pub fn notify_slot_reservation_change(&mut self, slot: u32, allowed: bool, forbidden: bool) {
        if let Some(obs) = self.observer.as_deref_mut() {
            obs.on_slot_reservation_change(self.id, slot, allowed, forbidden);
        }
    }

    pub fn address(&self) -> MacAddress {
        self.mac.address()
    }

    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// MTU is bounded by the device constant `DEFAULT_MTU`; requesting a
    /// larger value is a fatal programming error, not a runtime condition.
    pub fn set_mtu(&mut self, mtu: usize) {
        assert!(mtu <= DEFAULT_MTU, "NetDevice: requested MTU {mtu} exceeds device bound {DEFAULT_MTU}");
        self.mtu = mtu;
    }

    pub fn enable_promiscuous(&mut self) {
        self.promiscuous = true;
    }

    /// Wrap in LLC/SNAP, enqueue via Mac. Fails if Mac returns false.
    pub fn send(&mut self, payload: Vec<u8>, dest: MacAddress, protocol: EtherType, now: crate::sim::Millis) -> bool {
        assert!(payload.len() <= self.mtu, "NetDevice: payload {} exceeds MTU {}", payload.len(), self.mtu);
        let accepted = self.mac.enqueue(payload, protocol, dest, None, now);
        if !accepted {
            if let Some(obs) = self.observer.as_deref_mut() {
                obs.on_mac_tx_drop(self.id, dest);
            }
        }
        accepted
    }

    /// Same as `send` but with an explicit source address for bridging.
    /// This Mac variant discards the override, so the effective behavior is
    /// identical to `send`; the explicit `source` parameter is kept for
    /// contract completeness.
    pub fn send_from(
        &mut self,
        payload: Vec<u8>,
        source: MacAddress,
        dest: MacAddress,
        protocol: EtherType,
        now: crate::sim::Millis,
    ) -> bool {
        assert!(payload.len() <= self.mtu, "NetDevice: payload {} exceeds MTU {}", payload.len(), self.mtu);
        let accepted = self.mac.enqueue(payload, protocol, dest, Some(source), now);
        if !accepted {
            if let Some(obs) = self.observer.as_deref_mut() {
                obs.on_mac_tx_drop(self.id, dest);
            }
        }
        accepted
    }

    /// Receive path: classify, notify the controller, and invoke the
    /// upward callback unless the packet is for another
    /// host — expressed here as a return value rather than a callback
    /// ([`ForwardOutcome`]), since buffering-and-draining is how the rest
    /// of this crate exposes "delivered" data to its caller (the `Network`
    /// dispatch loop owns the arena and cannot also hold a live closure
    /// back into it).
    pub fn forward_up(&mut self, payload: Vec<u8>, protocol: EtherType, from: MacAddress, to: MacAddress) -> ForwardOutcome {
        let class = classify(to, self.address());
        use crate::dama::controller::Controller;
        if let Some(obs) = self.observer.as_deref_mut() {
            let sniffed = Frame::new(to, from, protocol, payload.clone());
            match class {
                ReceiveClass::UnicastOther if self.promiscuous => obs.on_promisc_sniff(self.id, &sniffed),
                ReceiveClass::UnicastOther => {}
                _ => obs.on_sniff(self.id, &sniffed),
            }
        }
        let slot = self.controller.current_slot();
        match class {
            ReceiveClass::Broadcast | ReceiveClass::Multicast | ReceiveClass::UnicastToSelf => {
                let prev = self.controller.slot_status(slot);
                self.controller.notify_rx();
                self.notify_if_slot_changed(slot, prev);
                ForwardOutcome::Upward(UpwardPacket { payload, protocol, from, to })
            }
            ReceiveClass::UnicastOther => {
                if self.promiscuous {
                    let prev = self.controller.slot_status(slot);
                    self.controller.notify_promisc_rx();
                    self.notify_if_slot_changed(slot, prev);
                    ForwardOutcome::PromiscOnly(UpwardPacket { payload, protocol, from, to })
                } else {
                    ForwardOutcome::Dropped
                }
            }
        }
    }

    fn notify_if_slot_changed(&mut self, slot: u32, prev: crate::dama::raloha::SlotStatus) {
        let new_status = self.controller.slot_status(slot);
        if new_status != prev {
            self.notify_slot_reservation_change(slot, new_status.allowed, new_status.forbidden);
        }
    }
}

/// Outcome of [`NetDevice::forward_up`]: what, if anything, should reach the
/// layer above, via its main or promiscuous receive callback.
#[derive(Debug)]
pub enum ForwardOutcome {
    /// Deliver to the main upward callback.
    Upward(UpwardPacket),
    /// Deliver only to a registered promiscuous-receive callback.
    PromiscOnly(UpwardPacket),
    /// Not for this host and no promiscuous callback registered.
    Dropped,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dama::raloha::{DEFAULT_SLOT_NUMBER, DEFAULT_SLOT_TIME};
    use crate::sim::Millis;

    fn addr(n: u8) -> MacAddress {
        MacAddress([0, 0, 0, 0, 0, n])
    }

    fn device(own: u8) -> NetDevice {
        NetDevice::new(
            NodeId(own as u32),
            Mac::new(addr(own), 400),
            RAlohaController::new(DEFAULT_SLOT_NUMBER, DEFAULT_SLOT_TIME),
        )
    }

    #[test]
    fn set_mtu_above_bound_panics() {
        let mut dev = device(1);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            dev.set_mtu(DEFAULT_MTU + 1);
        }));
        assert!(result.is_err());
    }

    #[test]
    fn classify_distinguishes_broadcast_multicast_unicast() {
        let own = addr(1);
        assert_eq!(classify(MacAddress::BROADCAST, own), ReceiveClass::Broadcast);
        assert_eq!(classify(MacAddress([0x01, 0, 0, 0, 0, 9]), own), ReceiveClass::Multicast);
        assert_eq!(classify(own, own), ReceiveClass::UnicastToSelf);
        assert_eq!(classify(addr(2), own), ReceiveClass::UnicastOther);
    }

    #[test]
    fn unicast_to_self_yields_upward_packet_and_notifies_rx() {
        let mut dev = device(1);
        let outcome = dev.forward_up(vec![1, 2, 3], 0x0800, addr(2), addr(1));
        assert!(matches!(outcome, ForwardOutcome::Upward(_)));
    }

    #[test]
    fn unicast_other_is_dropped_unless_promiscuous() {
        let mut dev = device(1);
        assert!(matches!(dev.forward_up(vec![1], 0x0800, addr(2), addr(3)), ForwardOutcome::Dropped));
        dev.enable_promiscuous();
        assert!(matches!(dev.forward_up(vec![1], 0x0800, addr(2), addr(3)), ForwardOutcome::PromiscOnly(_)));
    }

    #[test]
    fn send_enqueues_on_mac() {
        let mut dev = device(1);
        assert!(dev.send(vec![1, 2], addr(2), 0x0800, Millis(0)));
        assert!(dev.mac.has_data());
    }
}
