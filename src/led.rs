//! Status LED patterns for the battery box.
//!
//! The pattern position is derived from the time since the current mode was
//! entered, so a late update never drifts the pattern and a mode change always
//! starts it from the top.

use embedded_graphics::pixelcolor::Rgb888;

use crate::colors::{LED_GREEN, LED_OFF, LED_RED, led_color};
use crate::config::timing::{LED_CHARGE_OFF_MS, LED_CHARGE_ON_MS, LED_LOW_FLASH_MS};
use crate::status::Status;

/// Flash steps in the low battery pattern that light the LED (0, 2, 4).
const LOW_FLASH_LIT_STEPS: usize = 6;

/// What the LED is doing.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum LedMode {
    #[default]
    Off,
    /// Three short red flashes, then a pause.
    FlashLowRed,
    /// Slow flash in the SOC colour.
    FlashCharging,
    /// Solid green.
    SolidFull,
}

impl LedMode {
    /// Pick the mode for the current state. First matching rule wins.
    pub fn select(
        soc: u8,
        charging: bool,
        status: Status,
    ) -> Self {
        if status == Status::Full && charging && soc == 100 {
            Self::SolidFull
        } else if status == Status::Low && !charging && soc <= 20 {
            Self::FlashLowRed
        } else if charging && soc < 100 {
            Self::FlashCharging
        } else {
            Self::Off
        }
    }
}

/// Turns a mode and the clock into a colour.
pub struct LedDriver {
    mode: LedMode,
    mode_since_ms: u64,
    soc: u8,
}

impl LedDriver {
    pub const fn new() -> Self {
        Self {
            mode: LedMode::Off,
            mode_since_ms: 0,
            soc: 0,
        }
    }

    /// Select the mode for this state. A changed mode restarts its pattern.
    pub fn set_state(
        &mut self,
        soc: u8,
        charging: bool,
        status: Status,
        now_ms: u64,
    ) -> LedMode {
        let want = LedMode::select(soc, charging, status);
        if want != self.mode {
            self.mode = want;
            self.mode_since_ms = now_ms;
        }
        self.soc = soc;
        self.mode
    }

    /// Colour to show at `now_ms`.
    pub fn update(
        &self,
        now_ms: u64,
    ) -> Rgb888 {
        let elapsed = now_ms.saturating_sub(self.mode_since_ms);
        match self.mode {
            LedMode::Off => LED_OFF,
            LedMode::SolidFull => LED_GREEN,
            LedMode::FlashLowRed => {
                if low_flash_lit(elapsed) { LED_RED } else { LED_OFF }
            }
            LedMode::FlashCharging => {
                let period = LED_CHARGE_ON_MS + LED_CHARGE_OFF_MS;
                if elapsed % period < LED_CHARGE_ON_MS { led_color(self.soc) } else { LED_OFF }
            }
        }
    }

    #[inline]
    pub fn mode(&self) -> LedMode { self.mode }
}

impl Default for LedDriver {
    fn default() -> Self { Self::new() }
}

fn low_flash_lit(elapsed_ms: u64) -> bool {
    let period: u64 = LED_LOW_FLASH_MS.iter().sum();
    let mut t = elapsed_ms % period;
    for (step, duration) in LED_LOW_FLASH_MS.iter().enumerate() {
        if t < *duration {
            return step < LOW_FLASH_LIT_STEPS && step % 2 == 0;
        }
        t -= duration;
    }
    false
}

// =============================================================================
// Unit Tests
// =============================================================================
