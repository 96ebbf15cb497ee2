//! Abstract controller contract.
//!
//! The set of controllers is effectively closed for this crate
//! ([`RAlohaController`] is the only concrete implementation), so
//! `Controller` is not used for dynamic dispatch anywhere in `Network` — it
//! documents the contract a controller must satisfy. Starting a controller
//! requires a `Simulator` to schedule its first tick against, so that entry
//! point lives as an inherent method on the concrete type rather than on
//! this trait.
//!
//! [`RAlohaController`]: crate::dama::raloha::RAlohaController

/// A controller observes three events from its channel/device.
pub trait Controller {
    /// This node received a valid frame addressed to it (or broadcast).
    fn notify_rx(&mut self);

    /// This node received a frame regardless of destination address.
    fn notify_promisc_rx(&mut self);

    /// The channel reported a collision involving this node.
    fn notify_collision(&mut self);
}
