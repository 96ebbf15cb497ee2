//! TCP-Noordwijk congestion control: a burst-paced alternative to
//! slow-start/AIMD, designed for high-latency satellite links.
//!
//! [`congestion::CongestionControl`] holds all Noordwijk-specific state and
//! drives it through the [`congestion::TcpEndpoint`] collaborator, which
//! stands in for the TCP connection plumbing this crate does not implement.

pub mod congestion;
pub mod types;

pub use congestion::{CongestionControl, NoordwijkEvent, SendDecision, TcpEndpoint};
pub use types::NoordwijkConfig;
