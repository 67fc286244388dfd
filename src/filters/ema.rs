//! Time-aware exponential moving averages.
//!
//! Samples do not arrive on a fixed grid (BMS reads can stall, link frames can
//! drop), so every smoothing site derives its weight from the real elapsed
//! time through [`ema_alpha`] instead of assuming a fixed poll rate.

#[cfg(not(test))]
use micromath::F32Ext;

use crate::config::StepEmaConfig;

/// Blend weight for a first-order low-pass after `dt_s` seconds: `1 - e^(-dt/tau)`.
///
/// Returns 1.0 for a non-positive `tau_s` (no smoothing) and 0.0 for a
/// non-positive `dt_s` (no time has passed).
#[inline]
pub fn ema_alpha(
    dt_s: f32,
    tau_s: f32,
) -> f32 {
    if !(tau_s > 0.0) {
        return 1.0;
    }
    if !(dt_s > 0.0) {
        return 0.0;
    }
    1.0 - (-dt_s / tau_s).exp()
}

/// Elapsed seconds between two millisecond timestamps, saturating at zero.
#[inline]
pub(crate) fn elapsed_s(
    last_ms: u64,
    now_ms: u64,
) -> f32 {
    now_ms.saturating_sub(last_ms) as f32 / 1000.0
}

// =============================================================================
// Plain EMA
// =============================================================================

/// dt-aware EMA. The first update seeds the value.
pub struct Ema {
    value: f32,
    initialized: bool,
    last_update_ms: u64,
}

impl Ema {
    pub const fn new() -> Self {
        Self {
            value: 0.0,
            initialized: false,
            last_update_ms: 0,
        }
    }

    /// Blend `raw` in and return the new value.
    ///
    /// Non-finite input is ignored: the value is held and the clock still moves.
    pub fn update(
        &mut self,
        raw: f32,
        now_ms: u64,
        tau_s: f32,
    ) -> f32 {
        let dt_s = elapsed_s(self.last_update_ms, now_ms);
        self.last_update_ms = now_ms;

        if !raw.is_finite() {
            return self.value;
        }

        if self.initialized {
            self.value += ema_alpha(dt_s, tau_s) * (raw - self.value);
        } else {
            self.value = raw;
            self.initialized = true;
        }
        self.value
    }

    /// Current value, `None` until the first update.
    #[inline]
    pub fn value(&self) -> Option<f32> { self.initialized.then_some(self.value) }
}

impl Default for Ema {
    fn default() -> Self { Self::new() }
}

// =============================================================================
// Step EMA
// =============================================================================

/// Fast-attack discharge EMA.
///
/// Tracks the magnitude of discharge current only while discharge is strong
/// enough to count. Between discharge bursts the value is held, not decayed,
/// so a parked vehicle keeps its last typical draw. A step up in draw closes
/// most of the gap at once so the estimate reacts when the rider speeds up.
pub struct StepEma {
    config: StepEmaConfig,
    /// Discharge must exceed this magnitude for an update to run (A).
    gate_a: f32,
    /// `dt` used on the first update (s).
    first_dt_s: f32,
    value: f32,
    valid: bool,
    last_ms: Option<u64>,
}

impl StepEma {
    pub const fn new(
        config: StepEmaConfig,
        gate_a: f32,
        first_dt_s: f32,
    ) -> Self {
        Self {
            config,
            gate_a,
            first_dt_s,
            value: 0.0,
            valid: false,
            last_ms: None,
        }
    }

    /// Feed a raw current reading (signed, negative = discharge).
    ///
    /// Returns the tracked draw magnitude once valid.
    pub fn update(
        &mut self,
        current_a: f32,
        now_ms: u64,
    ) -> Option<f32> {
        if current_a < -self.gate_a {
            let draw = -current_a;
            let dt_s = match self.last_ms {
                Some(last) => elapsed_s(last, now_ms),
                None => self.first_dt_s,
            };
            self.last_ms = Some(now_ms);

            if !self.valid || self.value < self.config.bootstrap_a {
                self.value = draw;
                self.valid = true;
            } else if draw >= self.value * self.config.step_ratio {
                self.value += self.config.jump_gain * (draw - self.value);
            } else {
                self.value += ema_alpha(dt_s, self.config.tau_s) * (draw - self.value);
            }
        }
        self.value()
    }

    /// Tracked draw in amps, `None` before the first discharge.
    #[inline]
    pub fn value(&self) -> Option<f32> { self.valid.then_some(self.value) }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EstimatorConfig;
    use crate::estimate::MIN_DISCHARGE_CURRENT_A;

    fn step_ema() -> StepEma {
        let config = EstimatorConfig::DISPLAY_UNIT;
        StepEma::new(config.step_ema, MIN_DISCHARGE_CURRENT_A, config.poll_period_s())
    }

    #[test]
    fn test_alpha_bounds() {
        assert_eq!(ema_alpha(0.0, 3.0), 0.0);
        assert_eq!(ema_alpha(-1.0, 3.0), 0.0);
        assert_eq!(ema_alpha(1.0, 0.0), 1.0);
        let a = ema_alpha(3.0, 3.0);
        assert!((a - (1.0 - (-1.0f32).exp())).abs() < 1e-6);
        assert!(ema_alpha(1_000.0, 3.0) > 0.999);
    }

    #[test]
    fn test_first_update_exact() {
        let mut ema = Ema::new();
        assert_eq!(ema.value(), None);
        assert_eq!(ema.update(4.2, 12_345, 3.0), 4.2);
        assert_eq!(ema.value(), Some(4.2));
    }

    #[test]
    fn test_converges_to_constant_input() {
        let mut ema = Ema::new();
        ema.update(0.0, 0, 3.0);
        let mut now = 0;
        let mut last = 0.0;
        for _ in 0..200 {
            now += 250;
            let v = ema.update(10.0, now, 3.0);
            assert!(v >= last, "monotone approach");
            last = v;
        }
        assert!((last - 10.0).abs() < 0.01);
    }

    #[test]
    fn test_dt_awareness() {
        // One 1 s step equals four 250 ms steps
        let mut a = Ema::new();
        a.update(0.0, 0, 3.0);
        let one = a.update(10.0, 1_000, 3.0);

        let mut b = Ema::new();
        b.update(0.0, 0, 3.0);
        let mut four = 0.0;
        for t in [250, 500, 750, 1_000] {
            four = b.update(10.0, t, 3.0);
        }
        assert!((one - four).abs() < 1e-4);
    }

    #[test]
    fn test_non_finite_held() {
        let mut ema = Ema::new();
        assert_eq!(ema.update(f32::INFINITY, 0, 3.0), 0.0);
        assert_eq!(ema.value(), None);
        ema.update(2.0, 250, 3.0);
        assert_eq!(ema.update(f32::NAN, 500, 3.0), 2.0);
        assert_eq!(ema.value(), Some(2.0));
    }

    #[test]
    fn test_step_ema_bootstrap_and_hold() {
        let mut s = step_ema();
        assert_eq!(s.update(-0.5, 0), None);
        assert_eq!(s.update(-4.0, 250), Some(4.0));
        // Idle and charging readings do not decay the value
        assert_eq!(s.update(0.0, 10_000), Some(4.0));
        assert_eq!(s.update(3.0, 20_000), Some(4.0));
    }

    #[test]
    fn test_step_ema_jump() {
        let mut s = step_ema();
        s.update(-4.0, 0);
        // 10 >= 1.25 * 4 so 80 % of the gap closes at once
        let v = s.update(-10.0, 250).unwrap();
        assert!((v - 8.8).abs() < 1e-5);
    }

    #[test]
    fn test_step_ema_normal_blend() {
        let mut s = step_ema();
        s.update(-4.0, 0);
        let v = s.update(-3.0, 250).unwrap();
        let expected = 4.0 + ema_alpha(0.25, 2.5) * (3.0 - 4.0);
        assert!((v - expected).abs() < 1e-5);
    }
}
