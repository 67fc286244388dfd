//! Hysteresis and dwell state machines for charge/discharge detection.
//!
//! A state only flips after its crossing condition has held contiguously for
//! the configured dwell. Any single tick that breaks the condition restarts the
//! wait from scratch.

use crate::config::HysteresisBand;

// =============================================================================
// Dwell Timer
// =============================================================================

/// Tracks how long a condition has held without interruption.
#[derive(Clone, Copy, Debug)]
pub struct DwellTimer {
    dwell_ms: u64,
    since_ms: Option<u64>,
}

impl DwellTimer {
    pub const fn new(dwell_ms: u64) -> Self {
        Self { dwell_ms, since_ms: None }
    }

    /// Feed the condition for this tick. True once it has held for the dwell.
    pub fn update(
        &mut self,
        condition: bool,
        now_ms: u64,
    ) -> bool {
        if !condition {
            self.since_ms = None;
            return false;
        }
        let since = *self.since_ms.get_or_insert(now_ms);
        now_ms.saturating_sub(since) >= self.dwell_ms
    }

    /// When the current run of the condition started.
    #[inline]
    pub fn since_ms(&self) -> Option<u64> { self.since_ms }

    #[inline]
    pub fn reset(&mut self) { self.since_ms = None; }
}

// =============================================================================
// Hysteresis Machine
// =============================================================================

/// Edge reported by [`HysteresisMachine::update`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum Transition {
    None,
    Entered,
    Exited,
}

/// Two-state machine over a [`HysteresisBand`].
pub struct HysteresisMachine {
    band: HysteresisBand,
    stable: bool,
    timer: DwellTimer,
}

impl HysteresisMachine {
    pub const fn new(band: HysteresisBand) -> Self {
        Self {
            band,
            stable: false,
            timer: DwellTimer::new(band.dwell_ms),
        }
    }

    /// Feed the filtered current for this tick.
    pub fn update(
        &mut self,
        current_a: f32,
        now_ms: u64,
    ) -> Transition {
        let crossing = if self.stable {
            self.band.wants_exit(current_a)
        } else {
            self.band.wants_enter(current_a)
        };

        if !self.timer.update(crossing, now_ms) {
            return Transition::None;
        }

        self.timer.reset();
        self.stable = !self.stable;
        if self.stable { Transition::Entered } else { Transition::Exited }
    }

    /// True while in the stable (entered) state.
    #[inline]
    pub fn is_stable(&self) -> bool { self.stable }

    /// Start of the pending crossing, if one is being timed.
    #[inline]
    pub fn pending_since_ms(&self) -> Option<u64> { self.timer.since_ms() }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EstimatorConfig;

    fn charging() -> HysteresisMachine { HysteresisMachine::new(EstimatorConfig::DISPLAY_UNIT.charge) }

    fn discharging() -> HysteresisMachine { HysteresisMachine::new(EstimatorConfig::DISPLAY_UNIT.discharge) }

    #[test]
    fn test_dwell_timer_contiguous() {
        let mut t = DwellTimer::new(3_000);
        assert!(!t.update(true, 0));
        assert!(!t.update(true, 2_999));
        assert!(t.update(true, 3_000));
        assert!(!t.update(false, 3_250));
        assert_eq!(t.since_ms(), None);
        assert!(!t.update(true, 3_500));
        assert!(t.update(true, 6_500));
    }

    #[test]
    fn test_enter_after_dwell() {
        let mut m = charging();
        let mut entered_at = None;
        for k in 0..20u64 {
            let now = k * 250;
            if m.update(2.0, now) == Transition::Entered {
                entered_at = Some(now);
                break;
            }
        }
        assert_eq!(entered_at, Some(2_000));
        assert!(m.is_stable());
    }

    #[test]
    fn test_break_restarts_dwell() {
        let mut m = charging();
        for k in 0..7u64 {
            assert_eq!(m.update(2.0, k * 250), Transition::None);
        }
        // One tick below the enter threshold at 1750 ms
        assert_eq!(m.update(1.0, 1_750), Transition::None);
        assert_eq!(m.pending_since_ms(), None);
        for k in 8..16u64 {
            assert_eq!(m.update(2.0, k * 250), Transition::None);
        }
        assert_eq!(m.update(2.0, 16 * 250), Transition::Entered);
    }

    #[test]
    fn test_hysteresis_band_holds() {
        let mut m = charging();
        for k in 0..=8u64 {
            m.update(2.0, k * 250);
        }
        assert!(m.is_stable());
        // Inside the band: neither enter nor exit
        for k in 9..40u64 {
            assert_eq!(m.update(0.8, k * 250), Transition::None);
        }
        assert!(m.is_stable());
    }

    #[test]
    fn test_exit_after_dwell() {
        let mut m = discharging();
        for k in 0..=8u64 {
            m.update(-5.0, k * 250);
        }
        assert!(m.is_stable());
        let mut exited_at = None;
        for k in 9..30u64 {
            if m.update(0.0, k * 250) == Transition::Exited {
                exited_at = Some(k * 250);
                break;
            }
        }
        assert_eq!(exited_at, Some(4_250));
        assert!(!m.is_stable());
    }
}
