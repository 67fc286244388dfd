//! Robust current filters.
//!
//! - `median`: 5-tap median for spike rejection
//! - `ema`: dt-aware exponential moving averages

pub mod ema;
pub mod median;

pub use ema::{Ema, StepEma, ema_alpha};
pub use median::Median5;
