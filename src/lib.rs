//! Smart BCI library - testable estimation pipeline for the battery charge indicator.
//!
//! This library contains the core logic that can be tested on the host machine.
//! The binary (`main.rs`) uses this library and adds the embedded-specific code.
//!
//! # Pipeline
//!
//! Samples flow forward through one [`estimator::Estimator`] per device:
//! median filter, charge/discharge state machines, time-left formulas, display
//! smoothing and finally the narrative selector that decides what the user sees.
//!
//! # Testing
//!
//! Run tests on host with:
//! ```bash
//! cargo test --lib --target x86_64-unknown-linux-gnu  # Linux/macOS
//! cargo test --lib --target x86_64-pc-windows-msvc    # Windows
//! ```
//!
//! Tests run with `std` enabled (via `cfg_attr`), allowing use of the standard
//! test framework while the actual firmware runs as `no_std`.

// Use no_std only when NOT testing (tests need std for the test harness)
#![cfg_attr(not(test), no_std)]
// Crate-level lints
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

// === Pure logic modules (testable on host, no ARM dependencies) ===

// Configuration
pub mod config;

// Input
pub mod sample;
pub mod source;

// Estimation pipeline
pub mod estimate;
pub mod estimator;
pub mod filters;
pub mod history;
pub mod smoothing;
pub mod state_machine;
pub mod status;

// Outputs
pub mod audio;
pub mod button;
pub mod colors;
pub mod led;
