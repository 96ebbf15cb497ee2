//! DAMA/R-ALOHA link layer and TCP-Noordwijk congestion control, expressed
//! as a discrete-event simulation core.
//!
//! `sim` supplies the scheduling primitives both subsystems are built on;
//! `dama` is the TDMA MAC and shared-channel model; `noordwijk` is the
//! burst-paced congestion control. Neither subsystem depends on the other;
//! an embedder wires them together (e.g. a TCP connection's segments
//! traveling over a `dama::NetDevice`) the same way a host simulator wires
//! in its own `Simulator<E>` implementation.

pub mod config;
pub mod dama;
pub mod noordwijk;
pub mod sim;
