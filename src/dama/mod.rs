//! DAMA link layer: a Reservation-ALOHA TDMA controller arbitrating a
//! shared broadcast channel between simulated nodes.
//!
//! Data flow: `NetDevice::send` → Mac enqueues → `RAlohaController` at its
//! allowed slot calls `Mac::send_head` → `Channel` schedules delivery after
//! propagation → recipient `Mac::receive` → `NetDevice::forward_up`;
//! `Channel` flags concurrent senders as collided and notifies both
//! controllers. [`network::Network`] owns the arena (one entry per node)
//! and the single shared `Channel`, and is the only type that drives more
//! than one node at a time.

pub mod channel;
pub mod controller;
pub mod mac;
pub mod netdevice;
pub mod network;
pub mod observer;
pub mod raloha;
pub mod types;

pub use channel::Channel;
pub use controller::Controller;
pub use mac::Mac;
pub use netdevice::NetDevice;
pub use network::{DamaEvent, Network, NodeConfig};
pub use observer::DamaObserver;
pub use raloha::RAlohaController;
pub use types::{DeviceId, Frame, MacAddress, NodeId};
