//! Estimator thresholds and time constants.
//!
//! One [`EstimatorConfig`] parameterises the whole pipeline. Each device role
//! gets its own preset instead of its own copy of the filter code:
//!
//! - [`EstimatorConfig::DISPLAY_UNIT`]: display board fed over the radio link.
//!   Long dwell so brief regenerative braking spikes never read as charging.
//! - [`EstimatorConfig::BATTERY_BOX`]: sensor board next to the pack. Only the
//!   charge state drives its LED, so it reacts faster.
//!
//! # Validation
//!
//! [`EstimatorConfig::validate`] is a `const fn`, so the presets are checked at
//! compile time. Equal enter/exit thresholds are rejected as
//! [`ConfigError::NoHysteresis`]: a band with zero width flips state on noise.

use core::fmt;

/// Capacity of the discharge history ring (15 minutes at 1 Hz).
pub const HISTORY_CAPACITY: usize = 15 * 60;

// =============================================================================
// Building Blocks
// =============================================================================

/// Which side of the band the "stable" state lives on.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum Direction {
    /// Enter when the input falls to `enter_a` or below (discharging).
    EnterBelow,
    /// Enter when the input rises to `enter_a` or above (charging).
    EnterAbove,
}

/// Hysteresis band with a contiguous dwell requirement.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct HysteresisBand {
    pub direction: Direction,
    /// Threshold that must be crossed to enter the stable state (A).
    pub enter_a: f32,
    /// Threshold that must be crossed to leave the stable state (A).
    pub exit_a: f32,
    /// How long the crossing must hold before the state flips.
    pub dwell_ms: u64,
}

impl HysteresisBand {
    /// True when `current_a` asks to enter the stable state.
    #[inline]
    pub fn wants_enter(
        &self,
        current_a: f32,
    ) -> bool {
        match self.direction {
            Direction::EnterBelow => current_a <= self.enter_a,
            Direction::EnterAbove => current_a >= self.enter_a,
        }
    }

    /// True when `current_a` asks to leave the stable state.
    #[inline]
    pub fn wants_exit(
        &self,
        current_a: f32,
    ) -> bool {
        match self.direction {
            Direction::EnterBelow => current_a >= self.exit_a,
            Direction::EnterAbove => current_a <= self.exit_a,
        }
    }
}

/// Asymmetric display smoothing for one time estimate.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct SmootherConfig {
    /// Time constant while the estimate is dropping (s).
    pub attack_tau_s: f32,
    /// Time constant while the estimate is rising (s).
    pub release_tau_s: f32,
    /// Display quantization step (minutes).
    pub quant_min: u16,
}

/// Long-window discharge history and its display gate.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct HistoryConfig {
    /// Discharge magnitudes below this are coasting and are not recorded (A).
    pub keep_min_a: f32,
    /// Minimum spacing between recorded samples.
    pub push_interval_ms: u64,
    /// Fraction of the lowest sorted samples dropped by the trimmed mean.
    pub trim_low: f32,
    /// Fraction of the highest sorted samples dropped by the trimmed mean.
    pub trim_high: f32,
    /// Samples needed before a typical draw is reported.
    pub min_samples: usize,
    /// How long the gate conditions must hold before the estimate is shown.
    pub gate_dwell_ms: u64,
}

/// Fast-attack discharge EMA that holds its value while idle.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct StepEmaConfig {
    /// Time constant for ordinary updates (s).
    pub tau_s: f32,
    /// A new draw at least this multiple of the EMA counts as a step.
    pub step_ratio: f32,
    /// Fraction of the gap closed immediately on a step.
    pub jump_gain: f32,
    /// Below this value the EMA snaps to the next draw instead of blending (A).
    pub bootstrap_a: f32,
}

// =============================================================================
// Estimator Configuration
// =============================================================================

/// Every threshold and time constant used by the estimator.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct EstimatorConfig {
    /// Nominal poll period; used as `dt` on the very first filter update.
    pub poll_period_ms: u64,
    /// Positive median currents below this are treated as 0 A (back-EMF trickle).
    pub positive_clamp_a: f32,
    /// SOC at or below which the battery is reported low (%).
    pub low_soc_pct: u8,
    /// Time constant of the display current EMA feeding time-to-full (s).
    pub current_tau_s: f32,
    pub discharge: HysteresisBand,
    pub charge: HysteresisBand,
    pub tte: SmootherConfig,
    pub ttf: SmootherConfig,
    pub history: HistoryConfig,
    pub step_ema: StepEmaConfig,
}

impl EstimatorConfig {
    /// Display unit fed over the radio link.
    pub const DISPLAY_UNIT: Self = Self {
        poll_period_ms: super::timing::BMS_QUERY_MS,
        positive_clamp_a: 0.5,
        low_soc_pct: 20,
        current_tau_s: 3.0,
        discharge: HysteresisBand {
            direction: Direction::EnterBelow,
            enter_a: -1.0,
            exit_a: -0.8,
            dwell_ms: 2_000,
        },
        charge: HysteresisBand {
            direction: Direction::EnterAbove,
            enter_a: 1.2,
            exit_a: 0.4,
            dwell_ms: 2_000,
        },
        tte: SmootherConfig {
            attack_tau_s: 5.0,
            release_tau_s: 18.0,
            quant_min: 10,
        },
        ttf: SmootherConfig {
            attack_tau_s: 9.0,
            release_tau_s: 36.0,
            quant_min: 10,
        },
        history: HistoryConfig {
            keep_min_a: 1.0,
            push_interval_ms: 1_000,
            trim_low: 0.40,
            trim_high: 0.05,
            min_samples: 10,
            gate_dwell_ms: 3_000,
        },
        step_ema: StepEmaConfig {
            tau_s: 2.5,
            step_ratio: 1.25,
            jump_gain: 0.80,
            bootstrap_a: 1.0,
        },
    };

    /// Battery box unit. Same pipeline, quicker charge detection for the LED.
    pub const BATTERY_BOX: Self = {
        let mut config = Self::DISPLAY_UNIT;
        config.charge = HysteresisBand {
            direction: Direction::EnterAbove,
            enter_a: 0.5,
            exit_a: 0.4,
            dwell_ms: 500,
        };
        config
    };

    /// Nominal poll period in seconds.
    #[inline]
    pub fn poll_period_s(&self) -> f32 { self.poll_period_ms as f32 / 1000.0 }

    /// Check thresholds for ordering and time constants for sign.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if let Err(e) = check_band(&self.discharge, Machine::Discharging) {
            return Err(e);
        }
        if let Err(e) = check_band(&self.charge, Machine::Charging) {
            return Err(e);
        }
        if !matches!(self.discharge.direction, Direction::EnterBelow) {
            return Err(ConfigError::WrongDirection(Machine::Discharging));
        }
        if !matches!(self.charge.direction, Direction::EnterAbove) {
            return Err(ConfigError::WrongDirection(Machine::Charging));
        }
        if !(self.current_tau_s > 0.0)
            || !(self.tte.attack_tau_s > 0.0)
            || !(self.tte.release_tau_s > 0.0)
            || !(self.ttf.attack_tau_s > 0.0)
            || !(self.ttf.release_tau_s > 0.0)
            || !(self.step_ema.tau_s > 0.0)
        {
            return Err(ConfigError::NonPositiveTimeConstant);
        }
        if self.tte.quant_min == 0 || self.ttf.quant_min == 0 {
            return Err(ConfigError::ZeroQuantStep);
        }
        let h = &self.history;
        if !(h.trim_low >= 0.0) || !(h.trim_high >= 0.0) || !(h.trim_low + h.trim_high < 1.0) {
            return Err(ConfigError::BadTrim);
        }
        if h.min_samples == 0 || h.min_samples > HISTORY_CAPACITY {
            return Err(ConfigError::BadHistoryMinimum);
        }
        if !(self.positive_clamp_a >= 0.0) || !(h.keep_min_a > 0.0) {
            return Err(ConfigError::BadCurrentGate);
        }
        Ok(())
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self { Self::DISPLAY_UNIT }
}

const fn check_band(
    band: &HysteresisBand,
    machine: Machine,
) -> Result<(), ConfigError> {
    if band.enter_a == band.exit_a {
        return Err(ConfigError::NoHysteresis(machine));
    }
    let inverted = match band.direction {
        Direction::EnterBelow => band.enter_a > band.exit_a,
        Direction::EnterAbove => band.enter_a < band.exit_a,
    };
    if inverted {
        return Err(ConfigError::InvertedBand(machine));
    }
    Ok(())
}

// Compile-time validation of the presets
const _: () = assert!(EstimatorConfig::DISPLAY_UNIT.validate().is_ok());
const _: () = assert!(EstimatorConfig::BATTERY_BOX.validate().is_ok());

// =============================================================================
// Errors
// =============================================================================

/// Which state machine a band belongs to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum Machine {
    Discharging,
    Charging,
}

/// Reasons an [`EstimatorConfig`] is rejected.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum ConfigError {
    /// Enter and exit thresholds are equal.
    NoHysteresis(Machine),
    /// Exit threshold sits on the wrong side of the enter threshold.
    InvertedBand(Machine),
    /// Band direction does not match the machine.
    WrongDirection(Machine),
    NonPositiveTimeConstant,
    ZeroQuantStep,
    /// Trim fractions negative or removing every sample.
    BadTrim,
    BadHistoryMinimum,
    BadCurrentGate,
}

impl fmt::Display for Machine {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Discharging => f.write_str("discharging"),
            Self::Charging => f.write_str("charging"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::NoHysteresis(m) => write!(f, "{m} band has equal enter and exit thresholds"),
            Self::InvertedBand(m) => write!(f, "{m} band exit threshold is on the wrong side"),
            Self::WrongDirection(m) => write!(f, "{m} band has the wrong direction"),
            Self::NonPositiveTimeConstant => f.write_str("time constants must be positive"),
            Self::ZeroQuantStep => f.write_str("quantization step must be non-zero"),
            Self::BadTrim => f.write_str("trim fractions must be >= 0 and sum below 1"),
            Self::BadHistoryMinimum => f.write_str("history minimum must be within capacity"),
            Self::BadCurrentGate => f.write_str("current gates must not be negative"),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
