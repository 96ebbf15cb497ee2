//! Optional observability hooks.
//!
//! The source (`original_source/src/dama/model/damanetdevice.h`) exposes a
//! dozen separate `TracedCallback`s (macTx, macTxDrop, macRx, macRxDrop,
//! phyTxBegin/End/Drop, phyRxBegin/End/Drop, sniffer, promiscSniffer). This
//! crate collapses that mesh into a single `DamaObserver` trait covering
//! everything a caller is likely to want to trace at the MAC/channel level,
//! with empty defaults so an embedder that doesn't care pays nothing.
//! Per-PHY granularity is not modeled since this crate has no PHY layer.

use crate::dama::types::{Frame, MacAddress, NodeId};

/// Observer for DAMA link-layer events. All methods have no-op defaults.
pub trait DamaObserver {
    /// A frame was successfully handed to the channel by `node`.
    fn on_mac_tx(&mut self, _node: NodeId, _frame: &Frame) {}
    /// A frame was dropped because the Mac's queue was full.
    fn on_mac_tx_drop(&mut self, _node: NodeId, _dst: MacAddress) {}
    /// A received frame was dropped (currently unused by the simple
    /// broadcast Mac, which never drops on receive; kept for parity with
    /// the source's trace surface and for future Mac variants).
    fn on_mac_rx_drop(&mut self, _node: NodeId, _frame: &Frame) {}
    /// A frame was received by `node`, regardless of destination address.
    fn on_promisc_sniff(&mut self, _node: NodeId, _frame: &Frame) {}
    /// A frame was received by `node` and accepted (matched its own or a
    /// broadcast/multicast address).
    fn on_sniff(&mut self, _node: NodeId, _frame: &Frame) {}
    /// A collision was reported to `node`'s controller.
    fn on_collision(&mut self, _node: NodeId) {}
    /// A slot's `allowed`/`forbidden` flags changed for `node`.
    fn on_slot_reservation_change(&mut self, _node: NodeId, _slot: u32, _allowed: bool, _forbidden: bool) {}
}

/// The default observer: observes nothing.
pub struct NullObserver;

impl DamaObserver for NullObserver {}
