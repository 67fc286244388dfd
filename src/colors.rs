//! Color constants for the charge indicator.
//!
//! Two palettes live here:
//!
//! - `Rgb565` SOC bands for the display (border, icon and bars share a band)
//! - `Rgb888` colours for the battery box status LED, driven with 8-bit PWM
//!
//! ## Rgb565 Color Format
//!
//! Rgb565 uses 16 bits per pixel: 5 bits red, 6 bits green, 5 bits blue.
//! Custom values below are written in that channel range.

use embedded_graphics::pixelcolor::{Rgb565, Rgb888, RgbColor};

// =============================================================================
// Display SOC Bands
// =============================================================================

/// Empty pack. RGB565: (17, 0, 0).
pub const DARK_RED: Rgb565 = Rgb565::new(17, 0, 0);

/// 1-20 %.
pub const RED: Rgb565 = Rgb565::RED;

/// 21-40 %. RGB565: (31, 10, 0).
pub const DARK_ORANGE: Rgb565 = Rgb565::new(31, 10, 0);

/// 41-60 %.
pub const YELLOW: Rgb565 = Rgb565::YELLOW;

/// 61-80 %. Slightly warm green, RGB565: (27, 63, 0).
pub const GREEN: Rgb565 = Rgb565::new(27, 63, 0);

/// 81-100 %. RGB565: (0, 32, 0).
pub const DARK_GREEN: Rgb565 = Rgb565::new(0, 32, 0);

/// Out of range SOC. Never expected on screen.
pub const PINK: Rgb565 = Rgb565::MAGENTA;

/// Display colour band for an integer SOC.
pub const fn soc_color(soc: u8) -> Rgb565 {
    match soc {
        0 => DARK_RED,
        1..=20 => RED,
        21..=40 => DARK_ORANGE,
        41..=60 => YELLOW,
        61..=80 => GREEN,
        81..=100 => DARK_GREEN,
        _ => PINK,
    }
}

// =============================================================================
// Status LED
// =============================================================================

pub const LED_OFF: Rgb888 = Rgb888::BLACK;

pub const LED_RED: Rgb888 = Rgb888::RED;

/// Amber rather than pure yellow; the green die dominates at full duty.
pub const LED_YELLOW: Rgb888 = Rgb888::new(255, 220, 0);

pub const LED_GREEN: Rgb888 = Rgb888::GREEN;

/// LED colour for an integer SOC. Coarser than the display bands.
pub const fn led_color(soc: u8) -> Rgb888 {
    match soc {
        0..=40 => LED_RED,
        41..=80 => LED_YELLOW,
        _ => LED_GREEN,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soc_band_edges() {
        assert_eq!(soc_color(0), DARK_RED);
        assert_eq!(soc_color(1), RED);
        assert_eq!(soc_color(20), RED);
        assert_eq!(soc_color(21), DARK_ORANGE);
        assert_eq!(soc_color(40), DARK_ORANGE);
        assert_eq!(soc_color(60), YELLOW);
        assert_eq!(soc_color(61), GREEN);
        assert_eq!(soc_color(80), GREEN);
        assert_eq!(soc_color(100), DARK_GREEN);
        assert_eq!(soc_color(101), PINK);
    }

    #[test]
    fn test_led_color_edges() {
        assert_eq!(led_color(0), LED_RED);
        assert_eq!(led_color(40), LED_RED);
        assert_eq!(led_color(41), LED_YELLOW);
        assert_eq!(led_color(80), LED_YELLOW);
        assert_eq!(led_color(81), LED_GREEN);
    }

    #[test]
    fn test_rgb565_channels() {
        assert_eq!(DARK_ORANGE.r(), 31);
        assert_eq!(DARK_ORANGE.g(), 10);
        assert_eq!(DARK_GREEN.g(), 32);
    }
}
