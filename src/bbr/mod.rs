/*! BBR-style congestion and pacing control.

Fixed-point throughout: gains and `cwnd_gain` are expressed in units of
[`UNIT`] (256, i.e. an 8-bit fraction); the bandwidth filter stores delivery
rate scaled by [`BW_UNIT`] (2^24). Every multiply that combines a bandwidth
sample with an RTT or a gain is done in `i128` to avoid overflow, per the
note in the design docs about needing a wide accumulator here.

Ported from the reference `ctcp_bbr.c`/`ctcp_bbr.h`, with one deliberate
correction: `is_next_cycle_phase`'s gain<1 branch there reduces to an
always-true `||`, which looks like a typo for "inflight drained to BDP" —
that's what this port implements.
*/
use crate::config::MSS;
use crate::storage::MinMaxFilter;
use crate::time::{Duration, Instant};

/// 8-bit fixed point scale for gains (`BBR_SCALE`/`BBR_UNIT` in the source).
pub const SCALE: u32 = 8;
pub const UNIT: i64 = 1 << SCALE;

/// 24-bit fixed point scale for the bandwidth filter (`BW_SCALE`/`BW_UNIT`).
pub const BW_SCALE: u32 = 24;
pub const BW_UNIT: i64 = 1 << BW_SCALE;

pub const CYCLE_LEN: u32 = 8;
/// Width of the windowed max-bandwidth filter, in packet-delivery rounds.
pub const WINDOW_RTTS: u32 = CYCLE_LEN + 2;

/// Rounds of `rtt_cnt` during which a fresh connection is still in slow
/// start proper, regardless of whether the pipe looks full yet.
pub const INITIAL_CWND_ROUNDS: u32 = 10;

pub const MIN_RTT_FILTER_EXPIRY: Duration = Duration::from_secs(10);
pub const PROBE_RTT_DURATION: Duration = Duration::from_millis(200);
pub const PROBE_RTT_CWND_PACKETS: u32 = 4;

pub const HIGH_GAIN: i64 = UNIT * 2885 / 1000 + 1;
pub const DRAIN_GAIN: i64 = UNIT * 1000 / 2885;
pub const CWND_GAIN: i64 = UNIT * 2;
pub const PACING_GAIN_CYCLE: [i64; CYCLE_LEN as usize] =
    [UNIT * 5 / 4, UNIT * 3 / 4, UNIT, UNIT, UNIT, UNIT, UNIT, UNIT];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Startup,
    Drain,
    ProbeBw,
    ProbeRtt,
}

/// Snapshot captured at send time so the delivery rate can be computed once
/// the segment is acknowledged.
#[derive(Debug, Clone, Copy)]
pub struct RateSample {
    delivered_at_send: u64,
    prior_ack_time_us: i64,
    is_app_limited: bool,
}

#[derive(Debug, Clone)]
pub struct Model {
    min_rtt_us: i64,
    min_rtt_stamp: Instant,
    bw_filter: MinMaxFilter,
    delivered_pkts: u64,
    last_ack_time_us: i64,
    app_limited_until: u64,
    mode: Mode,
    pacing_gain: i64,
    cwnd_gain: i64,
    cycle_idx: usize,
    cycle_stamp: Instant,
    full_bw: u64,
    full_bw_cnt: u32,
    full_bw_reached: bool,
    probe_rtt_done_at: Option<Instant>,
    prior_cwnd: u32,
    rtt_cnt: u32,
    pub cwnd: u32,
    pub pacing_rate_bps: u64,
    pub pacing_gap_us: u64,
}

impl Model {
    /// `rt_timeout` seeds the initial RTT estimate, matching
    /// `ctcp_bbr_init`'s use of the configured retransmit timeout before any
    /// real sample exists.
    pub fn new(now: Instant, rt_timeout: Duration, initial_cwnd: u32) -> Model {
        let mut bw_filter = MinMaxFilter::new(WINDOW_RTTS);
        bw_filter.reset(0, 0);
        Model {
            min_rtt_us: rt_timeout.total_micros() as i64,
            min_rtt_stamp: now,
            bw_filter,
            delivered_pkts: 0,
            last_ack_time_us: now.total_micros(),
            app_limited_until: 0,
            mode: Mode::Startup,
            pacing_gain: HIGH_GAIN,
            cwnd_gain: CWND_GAIN,
            cycle_idx: 0,
            cycle_stamp: now,
            full_bw: 0,
            full_bw_cnt: 0,
            full_bw_reached: false,
            probe_rtt_done_at: None,
            prior_cwnd: initial_cwnd,
            rtt_cnt: 0,
            cwnd: initial_cwnd,
            pacing_rate_bps: 0,
            pacing_gap_us: 10,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn min_rtt_us(&self) -> i64 {
        self.min_rtt_us
    }

    /// Mark the sender as app-limited: it has fewer than a full pipe's
    /// worth of data queued. `inflight_bytes` is recorded so later bandwidth
    /// samples taken while still app-limited don't pull the max-bw estimate
    /// down below what the application's own send rate can sustain.
    pub fn note_app_limited(&mut self, inflight_bytes: u64) {
        self.app_limited_until = self.delivered_pkts + inflight_bytes.max(1);
    }

    /// Snapshot state at send time for later rate computation.
    pub fn on_send(&self) -> RateSample {
        RateSample {
            delivered_at_send: self.delivered_pkts,
            prior_ack_time_us: self.last_ack_time_us,
            is_app_limited: self.app_limited_until > self.delivered_pkts,
        }
    }

    /// BDP estimate in bytes at the given fixed-point gain.
    pub fn bdp_bytes(&self, gain: i64) -> u64 {
        let bw = self.bw_filter.get() as i128;
        let bdp = bw * self.min_rtt_us.max(1) as i128;
        let scaled = (bdp * gain as i128) >> SCALE;
        ((scaled * MSS as i128) >> BW_SCALE).max(0) as u64
    }

    fn rate_bytes_per_sec(&self, gain: i64) -> u64 {
        let bw = self.bw_filter.get() as i128;
        let scaled = (bw * gain as i128) >> SCALE;
        ((scaled * MSS as i128 * 1_000_000) / BW_UNIT as i128).max(0) as u64
    }

    /// Process an ACK for one previously sent segment.
    ///
    /// `send_time_us`/`ack_time_us` bound the segment's own RTT sample;
    /// `now` is the current clock, used for the 10s min-RTT filter and the
    /// PROBE_RTT duration.
    pub fn on_ack(&mut self, rs: &RateSample, send_time_us: i64, ack_time_us: i64, now: Instant, inflight_bytes: u64) {
        self.rtt_cnt += 1;
        self.delivered_pkts += 1;
        self.update_bw(rs, ack_time_us);
        self.last_ack_time_us = ack_time_us;
        self.update_min_rtt(send_time_us, ack_time_us, now);
        self.update_cycle_phase(now, inflight_bytes);
        self.check_full_bw_reached();
        self.check_drain(now, inflight_bytes);
        self.update_probe_rtt(now, inflight_bytes);
        self.set_pacing_rate();
        self.set_cwnd(inflight_bytes);
    }

    fn update_bw(&mut self, rs: &RateSample, ack_time_us: i64) {
        let dt_us = (ack_time_us - rs.prior_ack_time_us).max(1) as i128;
        let sent_pkts = self.delivered_pkts.saturating_sub(rs.delivered_at_send) as i128;
        let rate = ((sent_pkts << BW_SCALE) / dt_us).max(0) as u64;
        if !rs.is_app_limited || rate >= self.bw_filter.get() {
            self.bw_filter.insert(self.rtt_cnt, rate);
        }
    }

    fn update_min_rtt(&mut self, send_time_us: i64, ack_time_us: i64, now: Instant) {
        let rtt_us = (ack_time_us - send_time_us).max(0);
        let expired = now.saturating_duration_since(self.min_rtt_stamp) > MIN_RTT_FILTER_EXPIRY;
        if matches!(self.mode, Mode::Startup) || rtt_us < self.min_rtt_us || expired {
            self.min_rtt_us = rtt_us;
            self.min_rtt_stamp = now;
        }
    }

    fn check_full_bw_reached(&mut self) {
        if self.full_bw_reached || matches!(self.mode, Mode::ProbeRtt) {
            return;
        }
        let bw = self.bw_filter.get();
        if bw >= self.full_bw + self.full_bw / 4 {
            self.full_bw = bw;
            self.full_bw_cnt = 0;
            return;
        }
        self.full_bw_cnt += 1;
        if self.full_bw_cnt >= 3 {
            self.full_bw_reached = true;
        }
    }

    fn check_drain(&mut self, now: Instant, inflight_bytes: u64) {
        if matches!(self.mode, Mode::Startup) && self.full_bw_reached {
            self.mode = Mode::Drain;
            self.pacing_gain = DRAIN_GAIN;
        }
        if matches!(self.mode, Mode::Drain) && inflight_bytes <= self.bdp_bytes(UNIT) {
            self.enter_probe_bw(now);
        }
    }

    fn enter_probe_bw(&mut self, now: Instant) {
        self.mode = Mode::ProbeBw;
        self.cycle_idx = 0;
        self.cycle_stamp = now;
        self.pacing_gain = PACING_GAIN_CYCLE[0];
    }

    fn update_cycle_phase(&mut self, now: Instant, inflight_bytes: u64) {
        if !matches!(self.mode, Mode::ProbeBw) {
            return;
        }
        let is_full_length = now.saturating_duration_since(self.cycle_stamp).total_micros()
            as i64
            > self.min_rtt_us;
        let advance = if self.pacing_gain > UNIT {
            is_full_length && inflight_bytes >= self.bdp_bytes(self.pacing_gain)
        } else if self.pacing_gain < UNIT {
            is_full_length || inflight_bytes <= self.bdp_bytes(UNIT)
        } else {
            is_full_length
        };
        if advance {
            self.cycle_idx = (self.cycle_idx + 1) % CYCLE_LEN as usize;
            self.cycle_stamp = now;
            self.pacing_gain = PACING_GAIN_CYCLE[self.cycle_idx];
        }
    }

    fn update_probe_rtt(&mut self, now: Instant, inflight_bytes: u64) {
        let filter_expired =
            now.saturating_duration_since(self.min_rtt_stamp) > MIN_RTT_FILTER_EXPIRY;
        if filter_expired && !matches!(self.mode, Mode::ProbeRtt) {
            self.prior_cwnd = self.cwnd;
            self.mode = Mode::ProbeRtt;
            self.pacing_gain = UNIT;
            self.probe_rtt_done_at = None;
            return;
        }
        if !matches!(self.mode, Mode::ProbeRtt) {
            return;
        }
        if self.probe_rtt_done_at.is_none()
            && inflight_bytes <= PROBE_RTT_CWND_PACKETS as u64 * MSS as u64
        {
            self.probe_rtt_done_at = Some(now + PROBE_RTT_DURATION);
            self.min_rtt_stamp = now;
        }
        if let Some(done_at) = self.probe_rtt_done_at {
            if now >= done_at {
                self.min_rtt_stamp = now;
                if self.full_bw_reached {
                    self.enter_probe_bw(now);
                } else {
                    self.mode = Mode::Startup;
                    self.pacing_gain = HIGH_GAIN;
                }
                self.cwnd = self.prior_cwnd.max(self.cwnd);
            }
        }
    }

    fn target_cwnd(&self) -> u32 {
        let bytes = self.bdp_bytes(self.cwnd_gain);
        ((bytes / MSS as u64) as u32 + 1).max(PROBE_RTT_CWND_PACKETS)
    }

    fn set_cwnd(&mut self, inflight_bytes: u64) {
        if matches!(self.mode, Mode::ProbeRtt) {
            self.cwnd = PROBE_RTT_CWND_PACKETS;
            return;
        }
        let target = self.target_cwnd();
        let inflight_packets = (inflight_bytes / MSS as u64) as u32;
        if !self.full_bw_reached && self.rtt_cnt < INITIAL_CWND_ROUNDS {
            self.cwnd = (self.cwnd + 1).min(target.max(self.cwnd));
        } else if self.cwnd < target {
            self.cwnd = (inflight_packets + 1).min(target);
        } else {
            self.cwnd = target;
        }
        self.cwnd = self.cwnd.max(PROBE_RTT_CWND_PACKETS);
    }

    fn set_pacing_rate(&mut self) {
        self.pacing_rate_bps = self.rate_bytes_per_sec(self.pacing_gain);
        self.pacing_gap_us = if self.pacing_rate_bps == 0 {
            10
        } else {
            (MSS as u64 * 1_000_000 / self.pacing_rate_bps).max(10)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> Model {
        Model::new(Instant::ZERO, Duration::from_millis(200), 10)
    }

    #[test]
    fn starts_in_startup_with_high_gain() {
        let m = model();
        assert!(matches!(m.mode(), Mode::Startup));
        assert_eq!(m.pacing_gain, HIGH_GAIN);
    }

    #[test]
    fn pacing_gap_never_drops_below_minimum() {
        let mut m = model();
        m.set_pacing_rate();
        assert!(m.pacing_gap_us >= 10);
    }

    /// A 10 Mbps / 40 ms RTT link whose delivery rate stops growing: three
    /// flat rounds should flip `full_bw_reached` and drop the model into
    /// DRAIN at `DRAIN_GAIN`, then PROBE_BW at `cycle_idx = 0` once inflight
    /// has drained down to the unit-gain BDP.
    #[test]
    fn startup_drains_into_probe_bw_once_inflight_falls_to_bdp() {
        let mut m = model();
        let mut send_time = 0i64;
        let rtt_us = 40_000i64;

        for _ in 0..3 {
            let rs = m.on_send();
            let ack_time = send_time + rtt_us;
            let now = Instant::from_micros(ack_time);
            m.on_ack(&rs, send_time, ack_time, now, 10 * MSS as u64);
            send_time = ack_time;
        }
        assert!(m.full_bw_reached);
        assert!(matches!(m.mode(), Mode::Drain));
        assert_eq!(m.pacing_gain, DRAIN_GAIN);

        let bdp = m.bdp_bytes(UNIT);
        for _ in 0..CYCLE_LEN {
            let rs = m.on_send();
            let ack_time = send_time + rtt_us;
            let now = Instant::from_micros(ack_time);
            m.on_ack(&rs, send_time, ack_time, now, bdp);
            send_time = ack_time;
            if !matches!(m.mode(), Mode::Drain) {
                break;
            }
        }
        assert!(matches!(m.mode(), Mode::ProbeBw));
        assert_eq!(m.cycle_idx, 0);
    }
}
