//! Time-to-empty and time-to-full formulas.
//!
//! Pure functions over a single sample. `None` means "no meaningful estimate"
//! (idle pack, full pack, SOC too low to extrapolate capacity) and is carried
//! through the smoothing layer rather than displayed as a number.

use core::fmt::Write;

use heapless::String;
#[cfg(not(test))]
use micromath::F32Ext;

/// Charge currents at or below this are too small for a time-to-full (A).
pub const MIN_CHARGE_CURRENT_A: f32 = 0.3;

/// Discharge must be stronger than this to count as real load (A, magnitude).
pub const MIN_DISCHARGE_CURRENT_A: f32 = 1.0;

/// Below this SOC the nominal capacity extrapolation divides by almost zero (%).
pub const TTF_SOC_GUARD_PCT: f32 = 0.5;

/// Estimates of 100 hours or more are shown as `>99h`.
const MAX_DISPLAY_HOURS: u32 = 100;

/// Placeholder for an undefined duration.
pub const NO_DURATION: &str = "--";

/// Formatted duration, e.g. `12h 05m`.
pub type DurationText = String<8>;

/// Hours until full at charge current `current_a`.
///
/// Nominal capacity is extrapolated from the remaining capacity and SOC.
pub fn compute_ttf(
    remaining_mah: f32,
    soc_pct: f32,
    current_a: f32,
) -> Option<f32> {
    if !(soc_pct < 100.0) || !(current_a > MIN_CHARGE_CURRENT_A) || !(soc_pct > TTF_SOC_GUARD_PCT) {
        return None;
    }
    let nominal_mah = remaining_mah * (100.0 / soc_pct);
    let to_full_mah = (nominal_mah - remaining_mah).max(0.0);
    Some(to_full_mah / 1000.0 / current_a)
}

/// Hours until empty at signed current `current_a` (negative while discharging).
pub fn compute_tte(
    remaining_mah: f32,
    current_a: f32,
) -> Option<f32> {
    let draw_a = -current_a;
    if !(draw_a > MIN_DISCHARGE_CURRENT_A) {
        return None;
    }
    Some(remaining_mah / 1000.0 / draw_a)
}

/// Round `hours` to the nearest `step_min` minutes.
///
/// A zero step returns the input unchanged.
pub fn quantize_hours(
    hours: f32,
    step_min: u16,
) -> f32 {
    if step_min == 0 {
        return hours;
    }
    let step = f32::from(step_min);
    (hours * 60.0 / step).round() * step / 60.0
}

/// Whole minutes in `hours`, rounded to nearest. Non-positive input gives 0.
pub fn hours_to_minutes(hours: f32) -> u32 {
    if !(hours > 0.0) {
        return 0;
    }
    (hours * 60.0).round() as u32
}

/// `"{h}h {mm}m"`, `">99h"` from 100 hours, `"--"` for non-positive input.
pub fn format_hours_hm(hours: f32) -> DurationText {
    let mut out = DurationText::new();
    if !(hours > 0.0) {
        let _ = out.push_str(NO_DURATION);
        return out;
    }

    let total_min = hours_to_minutes(hours);
    let (h, m) = (total_min / 60, total_min % 60);
    if h >= MAX_DISPLAY_HOURS {
        let _ = out.push_str(">99h");
    } else {
        let _ = write!(out, "{h}h {m:02}m");
    }
    out
}

// =============================================================================
// Unit Tests
// =============================================================================
