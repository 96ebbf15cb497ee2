//! Burst-based congestion control.
//!
//! `CongestionControl` replaces a TCP sender's slow-start/AIMD policy.
//! Everything it needs from the surrounding TCP connection — buffer state,
//! sequence numbers, the RTT estimator, retransmission — is expressed as
//! the [`TcpEndpoint`] trait, since this crate specifies the contract that
//! plumbing must satisfy rather than implementing a whole TCP stack.

use crate::noordwijk::types::{
    BurstState, RecoveryState, RttStats, Timing, BURST_MIN, LAMBDA, MAX_DEFAULT_TX_TIMER,
};
use crate::sim::{EventId, Millis, Simulator};

/// Events `CongestionControl` schedules on the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoordwijkEvent {
    /// The pacing timer for the current burst elapsed.
    TxTimerFired,
    /// The retransmit timer (RTO) elapsed.
    RetransmitTimeout,
}

/// What `send_pending_data` decided. There is no retry path: a `NoSend`
/// means the caller waits for the next trigger rather than this call
/// retrying on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendDecision {
    /// Nothing was sent; the caller should wait for the next trigger
    /// (buffer fill, pacing timer, or a new ACK).
    NoSend,
    /// `segments` segments were transmitted back-to-back.
    Sent { segments: u32 },
}

/// The external TCP connection state this subsystem reads and mutates.
/// Generic network-device and TCP-connection plumbing that this crate
/// specifies the contract for but does not implement.
pub trait TcpEndpoint {
    /// Whether the connection is established and may send.
    fn is_bound(&self) -> bool;
    /// Bytes currently queued to send.
    fn buffer_len(&self) -> usize;
    /// Bytes the receiver's advertised window currently allows.
    fn available_window(&self) -> usize;
    /// Sequence number of the oldest unacknowledged byte.
    fn head_seq(&self) -> u32;
    /// Next sequence number this endpoint will originate.
    fn next_tx_seq(&self) -> u32;
    fn set_next_tx_seq(&mut self, seq: u32);
    /// Most recent RTT sample.
    fn last_rtt(&self) -> Millis;
    /// Current retransmission timeout, from the endpoint's RTT estimator.
    fn rto(&self) -> Millis;
    /// Transmit a segment of `len` bytes starting at `seq`.
    fn send_segment(&mut self, seq: u32, len: usize);
    /// Discard acknowledged bytes from the send buffer.
    fn discard_up_to(&mut self, ack: u32);
    /// Retransmit the head of the send buffer.
    fn do_retransmit(&mut self);
}

pub struct CongestionControl {
    segment_size: u32,
    burst: BurstState,
    timing: Timing,
    rtt: RttStats,
    recovery: RecoveryState,
    tx_timer_pending: Option<EventId>,
    retransmit_timer: Option<EventId>,
}

impl CongestionControl {
    pub fn new(
        segment_size: u32,
        default_burst_size: u32,
        default_tx_timer: Millis,
        congestion_threshold: Millis,
        stability_factor: u32,
    ) -> Self {
        CongestionControl {
            segment_size,
            burst: BurstState::new(default_burst_size),
            timing: Timing::new(default_tx_timer),
            rtt: RttStats::new(congestion_threshold, stability_factor),
            recovery: RecoveryState::default(),
            tx_timer_pending: None,
            retransmit_timer: None,
        }
    }

    pub fn burst_size(&self) -> u32 {
        self.burst.burst_size
    }

    pub fn tx_timer(&self) -> Millis {
        self.timing.tx_timer
    }

    pub fn default_tx_timer(&self) -> Millis {
        self.timing.default_tx_timer
    }

    pub fn trains_received(&self) -> u32 {
        self.rtt.trains_received
    }

    pub fn min_rtt(&self) -> Millis {
        self.rtt.min_rtt
    }

    pub fn restore_pending(&self) -> bool {
        self.recovery.restore
    }

    /// Release a burst if the buffer holds a full burst's worth of data and
    /// no pacing timer is currently pending.
    pub fn send_pending_data<E: TcpEndpoint, S: Simulator<NoordwijkEvent>>(
        &mut self,
        _with_ack: bool,
        endpoint: &mut E,
        sim: &mut S,
    ) -> SendDecision {
        if !endpoint.is_bound() || endpoint.buffer_len() == 0 {
            return SendDecision::NoSend;
        }
        if self.tx_timer_pending.is_some() {
            return SendDecision::NoSend;
        }
        let available_window = endpoint.available_window();
        let segment_size = self.segment_size as usize;
        let per_segment = segment_size.min(available_window);
        let threshold = per_segment.saturating_mul(self.burst.burst_size as usize);
        if endpoint.buffer_len() < threshold {
            return SendDecision::NoSend;
        }

        let mut window_left = available_window;
        let mut segments = 0u32;
        for _ in 0..self.burst.burst_size {
            if window_left == 0 {
                break;
            }
            let len = segment_size.min(window_left);
            let seq = endpoint.next_tx_seq();
            endpoint.send_segment(seq, len);
            endpoint.set_next_tx_seq(seq.wrapping_add(len as u32));
            window_left -= len;
            segments += 1;
        }
        self.burst.packets_sent_this_burst = segments;
        let id = sim.schedule(self.timing.tx_timer, NoordwijkEvent::TxTimerFired);
        self.tx_timer_pending = Some(id);
        log::debug!("noordwijk: burst of {segments} segments, pacing {}", self.timing.tx_timer);
        SendDecision::Sent { segments }
    }

    /// The pacing timer fired: clear the one-shot flag so the next
    /// `send_pending_data` call is allowed to proceed. The pacing tx-timer
    /// is one-shot per burst.
    pub fn on_tx_timer_fired(&mut self) {
        self.tx_timer_pending = None;
    }

    /// Process a new cumulative ACK: reschedule the RTO, track `min_rtt`,
    /// count acked segments, and — once a full burst has been acked —
    /// recompute the burst size/pacing timer, apply any pending restore
    /// latch from a prior RTO, reset the stability window, and release the
    /// next burst.
    pub fn on_new_ack<E: TcpEndpoint, S: Simulator<NoordwijkEvent>>(
        &mut self,
        ack: u32,
        now: Millis,
        endpoint: &mut E,
        sim: &mut S,
    ) {
        // 1. cancel + reschedule the retransmit timer.
        if let Some(id) = self.retransmit_timer.take() {
            sim.cancel(id);
        }
        let rto = endpoint.rto();
        self.retransmit_timer = Some(sim.schedule(rto, NoordwijkEvent::RetransmitTimeout));

        // 2. min_rtt tracking.
        let last_rtt = endpoint.last_rtt();
        self.rtt.last_rtt = last_rtt;
        if last_rtt < self.rtt.min_rtt {
            self.rtt.min_rtt = last_rtt;
        }

        // 3. acked_pkts / ack_count.
        let head_seq = endpoint.head_seq();
        let acked_bytes = ack.wrapping_sub(head_seq);
        let acked_pkts = acked_bytes / self.segment_size.max(1);
        self.timing.ack_count += acked_pkts;

        // 4. first ACK of this burst.
        if self.timing.first_ack.is_none() {
            self.timing.first_ack = Some(now);
        }

        // 5. burst-terminating ACK.
        if self.timing.ack_count >= self.burst.burst_size {
            let first_ack = self.timing.first_ack.expect("ack_count >= 1 implies first_ack set");
            let train_dispersion = now - first_ack;

            if self.burst.burst_size == self.burst.default_burst_size {
                self.timing.ack_dispersion = Millis(train_dispersion.0 / self.burst.burst_size.max(1) as u64);
            }

            self.rtt.trains_received += 1;
            if self.rtt.trains_received == self.rtt.stability_factor {
                self.run_rate_update(train_dispersion);
                self.rtt.trains_received = 0;
            }

            // d. shrink by retransmissions this burst, clamp at 1.
            self.burst.burst_size = self
                .burst
                .burst_size
                .saturating_sub(self.burst.packets_retransmitted_this_burst)
                .max(1);
            self.burst.packets_retransmitted_this_burst = 0;

            // e. restore latch from a prior RTO.
            if self.recovery.restore {
                self.burst.burst_size = self.burst.default_burst_size;
                self.timing.tx_timer = self.timing.default_tx_timer;
                self.recovery.restore = false;
            }

            // f. reset the stability window.
            self.rtt.min_rtt = Millis::MAX;
            self.timing.ack_count = 0;
            self.timing.first_ack = None;

            // g. release the next burst.
            self.send_pending_data(true, endpoint, sim);
        }

        // 6. standard bookkeeping.
        endpoint.discard_up_to(ack);
        if ack.wrapping_sub(endpoint.next_tx_seq()) != 0 && !sequence_before(ack, endpoint.next_tx_seq()) {
            endpoint.set_next_tx_seq(ack);
        }
        if endpoint.buffer_len() == 0 {
            if let Some(id) = self.retransmit_timer.take() {
                sim.cancel(id);
            }
        }
    }

    /// Rate Adjustment vs Rate Tracking, selected by `last_rtt - min_rtt`
    /// against the congestion threshold β.
    fn run_rate_update(&mut self, train_dispersion: Millis) {
        let delta_rtt = self.rtt.last_rtt.0.saturating_sub(self.rtt.min_rtt.0);
        let delta_ref = self.timing.ack_dispersion;
        if Millis(delta_rtt) > self.rtt.congestion_threshold {
            // Rate Adjustment. Floor the divisor at 1ms so a zero train
            // dispersion cannot divide by zero.
            let divisor_ms = train_dispersion.0.max(1);
            let denom = 1_i64 + (delta_rtt / divisor_ms) as i64;
            let new_size = (self.burst.burst_size as i64 / denom.max(1)).max(1) as u32;
            self.burst.burst_size = new_size;
            self.timing.tx_timer = if self.burst.burst_size > BURST_MIN {
                Millis(self.burst.default_burst_size as u64 * delta_ref.0)
            } else {
                Millis(LAMBDA as u64 * self.burst.default_burst_size as u64 * delta_ref.0)
            };
            log::debug!(
                "noordwijk: rate adjustment, burst_size -> {}, tx_timer -> {}",
                self.burst.burst_size,
                self.timing.tx_timer
            );
        } else {
            // Rate Tracking.
            let gap = self.burst.default_burst_size as i64 - self.burst.burst_size as i64;
            self.burst.burst_size = (self.burst.burst_size as i64 + gap / 2).max(1) as u32;
            self.timing.tx_timer = Millis(self.burst.default_burst_size as u64 * delta_ref.0);
            log::debug!(
                "noordwijk: rate tracking, burst_size -> {}, tx_timer -> {}",
                self.burst.burst_size,
                self.timing.tx_timer
            );
        }
    }

    /// Ignore unless `count` is a non-zero multiple of 3 (triple-dup
    /// trigger, retriggerable per further three duplicate ACKs).
    pub fn on_dup_ack<E: TcpEndpoint>(&mut self, count: u32, endpoint: &mut E) {
        if count == 0 || count % 3 != 0 {
            return;
        }
        endpoint.do_retransmit();
        self.burst.packets_retransmitted_this_burst += 1;
        log::debug!("noordwijk: triple-dup retransmit (count={count})");
    }

    /// Handle a retransmission timeout: retransmit the head segment, and if
    /// the same segment timed out twice in a row, double the default
    /// pacing timer (capped) before the next cycle can use it.
    pub fn on_rto<E: TcpEndpoint>(&mut self, endpoint: &mut E) {
        let head_seq = endpoint.head_seq();
        if self.recovery.last_ack_at_rto == Some(head_seq) {
            // Cap the doubling so a run of RTOs can't grow it unbounded.
            let doubled = self.timing.default_tx_timer.0.saturating_mul(2);
            self.timing.default_tx_timer = Millis(doubled.min(MAX_DEFAULT_TX_TIMER.0));
            log::warn!(
                "noordwijk: consecutive RTO on same head segment, default_tx_timer -> {}",
                self.timing.default_tx_timer
            );
        }
        self.recovery.last_ack_at_rto = Some(head_seq);
        self.recovery.restore = true;
        endpoint.do_retransmit();
    }

    /// Explicit non-support: Noordwijk has no congestion window, so these
    /// are observable no-ops that warn.
    pub fn set_ssthresh(&mut self, _value: u32) {
        log::warn!("noordwijk: set_ssthresh is unsupported; Noordwijk has no slow-start threshold");
    }

    pub fn get_ssthresh(&self) -> u32 {
        log::warn!("noordwijk: get_ssthresh is unsupported; Noordwijk has no slow-start threshold");
        u32::MAX
    }

    pub fn set_initial_cwnd(&mut self, _segments: u32) {
        log::warn!("noordwijk: set_initial_cwnd is unsupported; Noordwijk has no congestion window");
    }

    pub fn get_initial_cwnd(&self) -> u32 {
        log::warn!("noordwijk: get_initial_cwnd is unsupported; Noordwijk has no congestion window");
        0
    }
}

/// Sequence-number comparison tolerant of wraparound, used only to decide
/// whether an ACK is ahead of `next_tx_seq` (standard TCP modular
/// arithmetic).
fn sequence_before(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) < 0
}
