//! Timing configuration constants.
//!
//! All values are milliseconds unless the name says otherwise. Timestamps in
//! this crate are `u64` milliseconds since boot, matching
//! `embassy_time::Instant::as_millis()` on the device.

// =============================================================================
// Sampling
// =============================================================================

/// Minimum spacing between BMS polls. The BMS is never queried faster than 4 Hz.
pub const BMS_QUERY_MS: u64 = 250;

/// Main loop cadence. The loop runs faster than the poll rate so button and
/// LED handling stay responsive.
pub const LOOP_PERIOD_MS: u64 = 10;

/// How often the firmware logs a status summary over RTT.
pub const STATUS_LOG_PERIOD_MS: u64 = 1_000;

const _: () = assert!(LOOP_PERIOD_MS < BMS_QUERY_MS);

// =============================================================================
// Button and Audio
// =============================================================================

/// Edges closer together than this are treated as contact bounce.
pub const BUTTON_DEBOUNCE_MS: u64 = 500;

/// How long the audio trigger lines are held before being released.
/// The DY-SV8F module misses pulses shorter than ~4 ms.
pub const AUDIO_PULSE_MS: u64 = 10;

const _: () = assert!(AUDIO_PULSE_MS >= 4);

// =============================================================================
// Link Supervision
// =============================================================================

/// Consecutive good frames required before leaving the handshake screen.
pub const HANDSHAKE_GOOD_FRAMES: u8 = 5;

/// Handshake gives up after this long without enough good frames.
pub const HANDSHAKE_TIMEOUT_MS: u64 = 10_000;

/// "BMS Error" is shown this long after a failed handshake.
pub const HANDSHAKE_ERROR_MS: u64 = 1_000;

/// "RETRYING" is shown this long before the next handshake attempt.
pub const HANDSHAKE_RETRY_MS: u64 = 3_000;

/// Consecutive bad frames after which the display switches to "No Data".
pub const NO_DATA_FAIL_COUNT: u8 = 5;

/// Consecutive bad frames after which the adapter re-initialises the port.
pub const RECONNECT_FAIL_COUNT: u8 = 10;

const _: () = assert!(NO_DATA_FAIL_COUNT < RECONNECT_FAIL_COUNT);

// =============================================================================
// Status LED
// =============================================================================

/// Low battery triple flash: on/off steps, then a long pause.
pub const LED_LOW_FLASH_MS: [u64; 7] = [120, 120, 120, 120, 120, 120, 1_000];

/// Charging flash on phase.
pub const LED_CHARGE_ON_MS: u64 = 2_000;

/// Charging flash off phase.
pub const LED_CHARGE_OFF_MS: u64 = 2_000;
