//! Async tasks for the charge indicator firmware.
//!
//! This module contains Embassy async tasks that run concurrently:
//! - `button`: Debounced load switch button, signalled to the main loop
//! - `link`: Link frames from the radio bridge on UART0 (`uart-link`)
//! - `demo`: Synthetic discharge/charge sweep (default without `uart-link`)
//!
//! Both sample sources publish into [`SAMPLES`]; the main loop only ever sees
//! the latest sample.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::watch::Watch;

use crate::sample::Sample;

pub mod button;
#[cfg(not(feature = "uart-link"))]
pub mod demo;
#[cfg(feature = "uart-link")]
pub mod link;

pub use button::{BUTTON_PRESSED, button_task};
#[cfg(not(feature = "uart-link"))]
pub use demo::demo_sample_task;
#[cfg(feature = "uart-link")]
pub use link::{LINK_RESET, link_task};

/// Watch channel carrying the latest sample from the active source.
/// The source task writes, the main loop reads the latest value.
pub static SAMPLES: Watch<CriticalSectionRawMutex, Sample, 1> = Watch::new();
