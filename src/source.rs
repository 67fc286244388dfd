//! Sample sources and link supervision.
//!
//! - [`PollGate`]: limits BMS queries to the poll rate
//! - [`LinkSupervisor`]: handshake, frame health and reconnect decisions
//! - [`DemoSweep`]: synthetic discharge/charge cycle for bench testing
//!
//! The supervisor is a plain state machine driven by frames and the clock.
//! The adapter owning the port acts on the [`LinkEvent`]s it emits.

use crate::config::{
    HANDSHAKE_ERROR_MS, HANDSHAKE_GOOD_FRAMES, HANDSHAKE_RETRY_MS, HANDSHAKE_TIMEOUT_MS, NO_DATA_FAIL_COUNT,
    RECONNECT_FAIL_COUNT,
};
use crate::sample::Sample;

// =============================================================================
// Poll Gate
// =============================================================================

/// Lets a poll through at most once per period. The first poll always passes.
pub struct PollGate {
    period_ms: u64,
    last_ms: Option<u64>,
}

impl PollGate {
    pub const fn new(period_ms: u64) -> Self { Self { period_ms, last_ms: None } }

    /// True when a poll may run now. Marks the poll as taken.
    pub fn ready(
        &mut self,
        now_ms: u64,
    ) -> bool {
        if let Some(last) = self.last_ms
            && now_ms.saturating_sub(last) < self.period_ms
        {
            return false;
        }
        self.last_ms = Some(now_ms);
        true
    }
}

// =============================================================================
// Link Supervisor
// =============================================================================

/// Where the link is in its lifecycle.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum LinkPhase {
    /// Waiting for consecutive good frames.
    Handshake { started_ms: u64, good_frames: u8 },
    /// Frames flow to the estimator.
    Running,
    /// Handshake failed; waiting before the next attempt.
    Backoff { since_ms: u64 },
}

/// What to do with one received frame.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum FrameVerdict {
    /// Feed the sample to the estimator. `redraw` is set on the first good
    /// frame after "No Data" was shown.
    Accept { redraw: bool },
    /// Good frame, but the link is still settling after failures ("Loading Data").
    Recovering,
    /// Bad frame below the "No Data" limit.
    Rejected,
    /// Too many bad frames: show "No Data".
    NoData,
    /// Link not running yet; frame only counts toward the handshake.
    Handshaking,
}

/// Action the adapter has to take.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum LinkEvent {
    /// Handshake passed; reset the display and start estimating.
    Connected,
    /// Handshake timed out; show the error screen.
    HandshakeFailed,
    /// Backoff over; a new handshake has started.
    Retry,
    /// Too many consecutive bad frames while running; re-initialise the port.
    Reconnect,
}

/// Screen the link state calls for, when it overrides the normal display.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum LinkScreen {
    Loading,
    BmsError,
    Retrying,
}

impl LinkScreen {
    pub const fn message(self) -> &'static str {
        match self {
            Self::Loading => "LOADING",
            Self::BmsError => "BMS Error",
            Self::Retrying => "RETRYING",
        }
    }
}

/// Handshake, frame health and reconnect decisions for one link.
pub struct LinkSupervisor {
    phase: LinkPhase,
    /// Health counter: up on bad frames, down on good ones, pinned past the limit.
    fail_count: u8,
    /// Consecutive bad frames, reset by any good frame.
    bad_streak: u8,
    no_data_shown: bool,
    pending: Option<LinkEvent>,
}

impl LinkSupervisor {
    /// Starts in the handshake at `now_ms`.
    pub const fn new(now_ms: u64) -> Self {
        Self {
            phase: LinkPhase::Handshake {
                started_ms: now_ms,
                good_frames: 0,
            },
            fail_count: 0,
            bad_streak: 0,
            no_data_shown: false,
            pending: None,
        }
    }

    /// Classify one frame and advance the link state.
    pub fn on_frame(
        &mut self,
        valid: bool,
        now_ms: u64,
    ) -> FrameVerdict {
        match self.phase {
            LinkPhase::Handshake { started_ms, good_frames } => {
                let good_frames = if valid { good_frames.saturating_add(1) } else { 0 };
                if good_frames >= HANDSHAKE_GOOD_FRAMES {
                    self.phase = LinkPhase::Running;
                    self.fail_count = 0;
                    self.bad_streak = 0;
                    self.no_data_shown = false;
                    self.pending = Some(LinkEvent::Connected);
                } else {
                    self.phase = LinkPhase::Handshake { started_ms, good_frames };
                }
                FrameVerdict::Handshaking
            }
            LinkPhase::Backoff { .. } => FrameVerdict::Handshaking,
            LinkPhase::Running if valid => {
                self.bad_streak = 0;
                if self.fail_count > 0 {
                    self.fail_count -= 1;
                    return FrameVerdict::Recovering;
                }
                let redraw = core::mem::take(&mut self.no_data_shown);
                FrameVerdict::Accept { redraw }
            }
            LinkPhase::Running => {
                self.bad_streak = self.bad_streak.saturating_add(1);
                if self.bad_streak > RECONNECT_FAIL_COUNT {
                    self.restart_handshake(now_ms);
                    self.pending = Some(LinkEvent::Reconnect);
                    return FrameVerdict::NoData;
                }

                self.fail_count = self.fail_count.saturating_add(1);
                if self.fail_count > NO_DATA_FAIL_COUNT {
                    self.fail_count = NO_DATA_FAIL_COUNT + 1;
                    self.no_data_shown = true;
                    FrameVerdict::NoData
                } else {
                    FrameVerdict::Rejected
                }
            }
        }
    }

    /// Advance timers and return the next pending event.
    pub fn poll(
        &mut self,
        now_ms: u64,
    ) -> Option<LinkEvent> {
        if let Some(event) = self.pending.take() {
            return Some(event);
        }
        match self.phase {
            LinkPhase::Handshake { started_ms, .. } if now_ms.saturating_sub(started_ms) >= HANDSHAKE_TIMEOUT_MS => {
                self.phase = LinkPhase::Backoff { since_ms: now_ms };
                Some(LinkEvent::HandshakeFailed)
            }
            LinkPhase::Backoff { since_ms }
                if now_ms.saturating_sub(since_ms) >= HANDSHAKE_ERROR_MS + HANDSHAKE_RETRY_MS =>
            {
                self.restart_handshake(now_ms);
                Some(LinkEvent::Retry)
            }
            _ => None,
        }
    }

    /// Screen override for the current phase, `None` while running.
    pub fn screen(
        &self,
        now_ms: u64,
    ) -> Option<LinkScreen> {
        match self.phase {
            LinkPhase::Handshake { .. } => Some(LinkScreen::Loading),
            LinkPhase::Backoff { since_ms } if now_ms.saturating_sub(since_ms) < HANDSHAKE_ERROR_MS => {
                Some(LinkScreen::BmsError)
            }
            LinkPhase::Backoff { .. } => Some(LinkScreen::Retrying),
            LinkPhase::Running => None,
        }
    }

    fn restart_handshake(
        &mut self,
        now_ms: u64,
    ) {
        self.phase = LinkPhase::Handshake {
            started_ms: now_ms,
            good_frames: 0,
        };
        self.fail_count = 0;
        self.bad_streak = 0;
    }

    #[inline]
    pub fn phase(&self) -> LinkPhase { self.phase }

    #[inline]
    pub fn fail_count(&self) -> u8 { self.fail_count }

    #[inline]
    pub fn is_running(&self) -> bool { self.phase == LinkPhase::Running }
}

// =============================================================================
// Demo Sweep
// =============================================================================

/// Pack capacity used by the sweep (mAh).
const DEMO_CAPACITY_MAH: u32 = 11_000;
const DEMO_CURRENT_A: f32 = 10.0;
const DEMO_STEP_MS: u64 = 500;
/// Slower steps near the ends so low and full behaviour can be watched.
const DEMO_SLOW_STEP_MS: u64 = 3_000;
const DEMO_TURNAROUND_MS: u64 = 1_000;

/// Synthetic BMS: discharges at 10 A down to 0 %, then charges back to 100 %.
pub struct DemoSweep {
    soc: u8,
    charging: bool,
    next_step_ms: Option<u64>,
}

impl DemoSweep {
    /// Starts just above full so the first step lands on 100 %.
    pub const fn new() -> Self {
        Self {
            soc: 101,
            charging: false,
            next_step_ms: None,
        }
    }

    /// Current synthetic reading, stepping the sweep when due.
    pub fn sample(
        &mut self,
        now_ms: u64,
    ) -> Sample {
        if self.next_step_ms.is_none_or(|t| now_ms >= t) {
            self.step(now_ms);
        }
        let current_a = if self.charging { DEMO_CURRENT_A } else { -DEMO_CURRENT_A };
        let remaining_mah = (DEMO_CAPACITY_MAH * u32::from(self.soc) / 100) as f32;
        Sample::new(current_a, f32::from(self.soc), remaining_mah)
    }

    fn step(
        &mut self,
        now_ms: u64,
    ) {
        let near_end = (!self.charging && self.soc <= 21) || (self.charging && self.soc >= 94);
        let mut interval = if near_end { DEMO_SLOW_STEP_MS } else { DEMO_STEP_MS };

        if self.soc == 0 {
            self.charging = true;
            interval += DEMO_TURNAROUND_MS;
        } else if self.soc == 100 && self.charging {
            self.charging = false;
            interval += DEMO_TURNAROUND_MS;
        }

        if self.charging {
            self.soc += 1;
        } else {
            self.soc -= 1;
        }
        self.next_step_ms = Some(now_ms + interval);
    }
}

impl Default for DemoSweep {
    fn default() -> Self { Self::new() }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn running() -> LinkSupervisor {
        let mut link = LinkSupervisor::new(0);
        for k in 0..5u64 {
            link.on_frame(true, k * 250);
        }
        assert_eq!(link.poll(1_250), Some(LinkEvent::Connected));
        assert!(link.is_running());
        link
    }

    #[test]
    fn test_poll_gate() {
        let mut gate = PollGate::new(250);
        assert!(gate.ready(5));
        assert!(!gate.ready(10));
        assert!(!gate.ready(254));
        assert!(gate.ready(255));
        assert!(gate.ready(600));
    }

    #[test]
    fn test_handshake_needs_consecutive_frames() {
        let mut link = LinkSupervisor::new(0);
        for k in 0..4u64 {
            assert_eq!(link.on_frame(true, k * 250), FrameVerdict::Handshaking);
        }
        link.on_frame(false, 1_000);
        assert_eq!(link.phase(), LinkPhase::Handshake { started_ms: 0, good_frames: 0 });
        assert_eq!(link.screen(1_000), Some(LinkScreen::Loading));
        for k in 5..10u64 {
            link.on_frame(true, k * 250);
        }
        assert_eq!(link.poll(2_500), Some(LinkEvent::Connected));
        assert_eq!(link.screen(2_500), None);
    }

    #[test]
    fn test_handshake_timeout_and_retry() {
        let mut link = LinkSupervisor::new(0);
        assert_eq!(link.poll(9_999), None);
        assert_eq!(link.poll(10_000), Some(LinkEvent::HandshakeFailed));
        assert_eq!(link.screen(10_500), Some(LinkScreen::BmsError));
        assert_eq!(link.screen(11_000), Some(LinkScreen::Retrying));
        // Frames during backoff are ignored
        assert_eq!(link.on_frame(true, 12_000), FrameVerdict::Handshaking);
        assert_eq!(link.poll(13_999), None);
        assert_eq!(link.poll(14_000), Some(LinkEvent::Retry));
        assert_eq!(link.phase(), LinkPhase::Handshake { started_ms: 14_000, good_frames: 0 });
    }

    #[test]
    fn test_health_counter() {
        let mut link = running();
        assert_eq!(link.on_frame(true, 0), FrameVerdict::Accept { redraw: false });
        for _ in 0..5 {
            assert_eq!(link.on_frame(false, 0), FrameVerdict::Rejected);
        }
        assert_eq!(link.on_frame(false, 0), FrameVerdict::NoData);
        assert_eq!(link.fail_count(), 6);
        // Pinned at 6 even with more failures
        link.on_frame(false, 0);
        assert_eq!(link.fail_count(), 6);

        for _ in 0..6 {
            assert_eq!(link.on_frame(true, 0), FrameVerdict::Recovering);
        }
        assert_eq!(link.on_frame(true, 0), FrameVerdict::Accept { redraw: true });
        assert_eq!(link.on_frame(true, 0), FrameVerdict::Accept { redraw: false });
    }

    #[test]
    fn test_reconnect_after_bad_streak() {
        let mut link = running();
        for _ in 0..10 {
            link.on_frame(false, 5_000);
        }
        assert_eq!(link.poll(5_000), None);
        assert_eq!(link.on_frame(false, 5_000), FrameVerdict::NoData);
        assert_eq!(link.poll(5_000), Some(LinkEvent::Reconnect));
        assert_eq!(link.phase(), LinkPhase::Handshake { started_ms: 5_000, good_frames: 0 });
    }

    #[test]
    fn test_good_frame_breaks_bad_streak() {
        let mut link = running();
        for _ in 0..10 {
            link.on_frame(false, 0);
        }
        link.on_frame(true, 0);
        for _ in 0..10 {
            link.on_frame(false, 0);
        }
        assert!(link.is_running());
    }

    #[test]
    fn test_demo_sweep() {
        let mut demo = DemoSweep::new();
        let first = demo.sample(0);
        assert_eq!(first.soc_pct, 100.0);
        assert_eq!(first.current_a, -10.0);
        assert_eq!(first.remaining_mah, 11_000.0);
        // No step before the interval
        assert_eq!(demo.sample(499).soc_pct, 100.0);
        assert_eq!(demo.sample(500).soc_pct, 99.0);

        let mut now = 500;
        let mut s = demo.sample(now);
        while s.soc_pct > 0.0 {
            now += 3_000;
            s = demo.sample(now);
        }
        assert_eq!(s.remaining_mah, 0.0);
        now += 3_000;
        let turned = demo.sample(now);
        assert_eq!(turned.soc_pct, 1.0);
        assert_eq!(turned.current_a, 10.0);
    }
}
