//! Hardware outputs driven by the main loop.
//!
//! - [`AudioPins`]: three-line trigger bus for the sound module
//! - [`StatusLed`]: RGB status LED on three PWM slices
//! - [`LoadGate`]: MOSFET gate for the switched load

use embassy_rp::gpio::{Level, Output};
use embassy_rp::pwm::{Pwm, SetDutyCycle};
use embassy_time::Timer;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::RgbColor;

use crate::audio::PinLevels;
use crate::config::AUDIO_PULSE_MS;

// =============================================================================
// Audio Trigger Pins
// =============================================================================

/// IO0..IO2 of the sound module. A cue is a short pulse of one pin pattern.
pub struct AudioPins {
    io: [Output<'static>; 3],
}

impl AudioPins {
    pub fn new(io: [Output<'static>; 3]) -> Self { Self { io } }

    pub fn set(
        &mut self,
        levels: PinLevels,
    ) {
        for (pin, high) in self.io.iter_mut().zip(levels.as_array()) {
            pin.set_level(Level::from(high));
        }
    }

    /// Hold `pulse` for [`AUDIO_PULSE_MS`], then return to `rest`.
    pub async fn pulse(
        &mut self,
        pulse: PinLevels,
        rest: PinLevels,
    ) {
        self.set(pulse);
        Timer::after_millis(AUDIO_PULSE_MS).await;
        self.set(rest);
    }
}

// =============================================================================
// Status LED
// =============================================================================

/// Common-cathode RGB LED, one PWM slice per channel.
pub struct StatusLed {
    red: Pwm<'static>,
    green: Pwm<'static>,
    blue: Pwm<'static>,
    shown: Option<Rgb888>,
}

impl StatusLed {
    pub fn new(
        red: Pwm<'static>,
        green: Pwm<'static>,
        blue: Pwm<'static>,
    ) -> Self {
        let mut led = Self {
            red,
            green,
            blue,
            shown: None,
        };
        led.show(Rgb888::BLACK);
        led
    }

    /// Drive the LED to `color`. Unchanged colours are skipped.
    pub fn show(
        &mut self,
        color: Rgb888,
    ) {
        if self.shown == Some(color) {
            return;
        }
        let _ = self.red.set_duty_cycle_fraction(u16::from(color.r()), 255);
        let _ = self.green.set_duty_cycle_fraction(u16::from(color.g()), 255);
        let _ = self.blue.set_duty_cycle_fraction(u16::from(color.b()), 255);
        self.shown = Some(color);
    }
}

// =============================================================================
// Load Gate
// =============================================================================

/// MOSFET gate for the switched load. High means the load is powered.
pub struct LoadGate {
    pin: Output<'static>,
}

impl LoadGate {
    pub fn new(pin: Output<'static>) -> Self { Self { pin } }

    pub fn set(
        &mut self,
        gate_high: bool,
    ) {
        self.pin.set_level(Level::from(gate_high));
    }
}
