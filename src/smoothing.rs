//! Display smoothing for time estimates.
//!
//! Raw time-left values jump with every throttle change. The smoother makes
//! them calm enough to read:
//!
//! - Asymmetric EMA: bad news (estimate dropping) lands quickly through the
//!   attack constant, good news (estimate rising) creeps in through release.
//! - Seeding: on the tick a stable state is entered the display jumps straight
//!   to the raw value instead of gliding from a stale one.
//! - Quantization: output is rounded to whole display steps (10 minutes).

use crate::config::SmootherConfig;
use crate::estimate::quantize_hours;
use crate::filters::ema::{elapsed_s, ema_alpha};

/// Smoothed, quantized view of one time estimate (hours).
pub struct DisplaySmoother {
    config: SmootherConfig,
    first_dt_s: f32,
    displayed_h: f32,
    initialized: bool,
    last_ms: Option<u64>,
}

impl DisplaySmoother {
    /// `first_dt_s` is the step assumed on the very first update.
    pub const fn new(
        config: SmootherConfig,
        first_dt_s: f32,
    ) -> Self {
        Self {
            config,
            first_dt_s,
            displayed_h: 0.0,
            initialized: false,
            last_ms: None,
        }
    }

    /// Feed a raw estimate and return the quantized display value.
    ///
    /// `raw` that is `None`, NaN or non-positive holds the previous value.
    /// `seed` snaps the display to `raw` (when `raw` is usable). Returns `None`
    /// until a usable value has been seen.
    pub fn update(
        &mut self,
        raw: Option<f32>,
        seed: bool,
        now_ms: u64,
    ) -> Option<f32> {
        let dt_s = match self.last_ms {
            Some(last) => elapsed_s(last, now_ms),
            None => self.first_dt_s,
        };
        self.last_ms = Some(now_ms);

        if let Some(raw) = raw.filter(|h| *h > 0.0 && h.is_finite()) {
            if !self.initialized || seed {
                self.displayed_h = raw;
                self.initialized = true;
            } else {
                let tau_s = if raw < self.displayed_h {
                    self.config.attack_tau_s
                } else {
                    self.config.release_tau_s
                };
                self.displayed_h += ema_alpha(dt_s, tau_s) * (raw - self.displayed_h);
            }
        }

        self.value()
    }

    /// Current quantized display value without feeding a new estimate.
    pub fn value(&self) -> Option<f32> {
        if !self.initialized || !(self.displayed_h > 0.0) {
            return None;
        }
        Some(quantize_hours(self.displayed_h, self.config.quant_min))
    }

    /// Unquantized internal value.
    #[inline]
    pub fn raw_display_h(&self) -> Option<f32> { self.initialized.then_some(self.displayed_h) }
}

// =============================================================================
// Unit Tests
// =============================================================================
