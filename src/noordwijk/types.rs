//! Data model for the Noordwijk congestion-control subsystem.

use serde::Deserialize;

use crate::sim::Millis;

/// `lambda` — small-burst pacing multiplier.
pub const LAMBDA: u32 = 2;
/// `burst_min` — below this, the small-burst pacing multiplier applies.
pub const BURST_MIN: u32 = 3;
/// Cap on how far repeated `default_tx_timer` doubling (triggered by
/// consecutive RTOs on the same head segment) is allowed to grow.
pub const MAX_DEFAULT_TX_TIMER: Millis = Millis(60_000);

/// Burst-size bookkeeping.
#[derive(Debug, Clone, Copy)]
pub struct BurstState {
    pub burst_size: u32,
    pub default_burst_size: u32,
    pub packets_sent_this_burst: u32,
    pub packets_retransmitted_this_burst: u32,
}

impl BurstState {
    pub fn new(default_burst_size: u32) -> Self {
        BurstState {
            burst_size: default_burst_size,
            default_burst_size,
            packets_sent_this_burst: 0,
            packets_retransmitted_this_burst: 0,
        }
    }
}

/// Pacing and ACK-train timing state.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub tx_timer: Millis,
    pub default_tx_timer: Millis,
    pub first_ack: Option<Millis>,
    pub ack_count: u32,
    /// The latched reference ACK dispersion δ, recorded only when a burst
    /// terminates at exactly `default_burst_size`. Used by both rate-update
    /// laws to compute the next `tx_timer`.
    pub ack_dispersion: Millis,
}

impl Timing {
    pub fn new(default_tx_timer: Millis) -> Self {
        Timing { tx_timer: default_tx_timer, default_tx_timer, first_ack: None, ack_count: 0, ack_dispersion: Millis::ZERO }
    }
}

/// RTT tracking over the current stability window.
#[derive(Debug, Clone, Copy)]
pub struct RttStats {
    pub last_rtt: Millis,
    pub min_rtt: Millis,
    pub congestion_threshold: Millis,
    pub stability_factor: u32,
    pub trains_received: u32,
}

impl RttStats {
    pub fn new(congestion_threshold: Millis, stability_factor: u32) -> Self {
        RttStats {
            last_rtt: Millis::ZERO,
            min_rtt: Millis::MAX,
            congestion_threshold,
            stability_factor,
            trains_received: 0,
        }
    }
}

/// Loss-recovery latch state.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryState {
    pub restore: bool,
    pub last_ack_at_rto: Option<u32>,
}

/// Configuration surface, settable before the congestion control is
/// attached to a connection.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NoordwijkConfig {
    pub segment_size: u32,
    pub burst_size: u32,
    pub tx_timer: Millis,
    pub congestion_threshold: Millis,
    pub stability_factor: u32,
}

impl Default for NoordwijkConfig {
    fn default() -> Self {
        NoordwijkConfig {
            segment_size: 536,
            burst_size: 20,
            tx_timer: Millis(500),
            congestion_threshold: Millis(200),
            stability_factor: 2,
        }
    }
}
