//! Application configuration.
//!
//! - `timing`: Poll rates, debounce windows, link supervision and LED timing
//! - `estimator`: Thresholds and time constants for the estimation pipeline

pub mod estimator;
pub mod timing;

// Re-export estimator configuration at config level for convenience
pub use estimator::{
    ConfigError,
    Direction,
    EstimatorConfig,
    HISTORY_CAPACITY,
    HistoryConfig,
    HysteresisBand,
    Machine,
    SmootherConfig,
    StepEmaConfig,
};
// Re-export timing constants at config level for convenience
pub use timing::{
    AUDIO_PULSE_MS,
    BMS_QUERY_MS,
    BUTTON_DEBOUNCE_MS,
    HANDSHAKE_ERROR_MS,
    HANDSHAKE_GOOD_FRAMES,
    HANDSHAKE_RETRY_MS,
    HANDSHAKE_TIMEOUT_MS,
    LOOP_PERIOD_MS,
    NO_DATA_FAIL_COUNT,
    RECONNECT_FAIL_COUNT,
    STATUS_LOG_PERIOD_MS,
};
