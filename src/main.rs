//! Smart BCI firmware for Raspberry Pi Pico 2 (RP2350)
//!
//! Battery charge indicator: turns BMS samples into a calm status narrative,
//! time-left estimates, audio cues and an RGB status LED.
//!
//! # Architecture
//!
//! - Main task: polls the latest sample at 4 Hz, runs the link supervisor and
//!   the estimator, drives the audio bus, LED and load gate
//! - Sample task: demo sweep, or link frames from UART0 with `uart-link`
//! - Button task: debounced load switch button (display unit only)
//!
//! # Roles
//!
//! - Default: display unit with the load switch button
//! - `battery-box`: faster charge detection, no button fitted
//!
//! # Pins
//!
//! - GP1: UART0 RX from the radio bridge (`uart-link`)
//! - GP10/GP11/GP12: sound module IO0/IO1/IO2 (active low)
//! - GP14: load MOSFET gate
//! - GP15: load switch button (to 3V3, internal pull-down)
//! - GP16/GP18/GP20: status LED red/green/blue (PWM slices 0/1/2)

#![no_std]
#![no_main]
// Crate-level lints (match lib.rs for consistency)
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::too_many_lines)]

mod outputs;
mod tasks;

// Re-export library modules under the names the binary modules expect
mod audio {
    pub use smart_bci::audio::*;
}
mod button {
    pub use smart_bci::button::*;
}
mod config {
    pub use smart_bci::config::*;
}
mod estimator {
    pub use smart_bci::estimator::*;
}
mod led {
    pub use smart_bci::led::*;
}
mod sample {
    pub use smart_bci::sample::*;
}
mod source {
    pub use smart_bci::source::*;
}

use defmt::{error, info, warn};
use embassy_executor::Spawner;
#[cfg(not(feature = "battery-box"))]
use embassy_rp::gpio::{Input, Pull};
use embassy_rp::gpio::{Level, Output};
use embassy_rp::pwm::{self, Pwm};
use embassy_time::{Instant, Timer};
use {defmt_rtt as _, panic_probe as _};

use crate::audio::AudioGate;
use crate::button::LoadSwitch;
use crate::config::{BMS_QUERY_MS, EstimatorConfig, LOOP_PERIOD_MS, STATUS_LOG_PERIOD_MS};
use crate::estimator::Estimator;
use crate::led::LedDriver;
use crate::outputs::{AudioPins, LoadGate, StatusLed};
use crate::source::{FrameVerdict, LinkEvent, LinkScreen, LinkSupervisor, PollGate};
#[cfg(not(feature = "battery-box"))]
use crate::tasks::button_task;
use crate::tasks::{BUTTON_PRESSED, SAMPLES};

// =============================================================================
// Role Selection
// =============================================================================

#[cfg(feature = "battery-box")]
const ROLE: EstimatorConfig = EstimatorConfig::BATTERY_BOX;
#[cfg(not(feature = "battery-box"))]
const ROLE: EstimatorConfig = EstimatorConfig::DISPLAY_UNIT;

/// Baud rate of the radio bridge.
#[cfg(feature = "uart-link")]
const LINK_BAUD: u32 = 9_600;

// =============================================================================
// Main Entry Point
// =============================================================================

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Smart BCI starting...");

    let p = embassy_rp::init(Default::default());
    let boot = Instant::now();

    let mut estimator = match Estimator::new(ROLE) {
        Ok(estimator) => estimator,
        Err(e) => {
            error!("Estimator config rejected: {}", e);
            loop {
                Timer::after_secs(1).await;
            }
        }
    };

    // Status LED (common cathode, one PWM slice per channel)
    let mut led = StatusLed::new(
        Pwm::new_output_a(p.PWM_SLICE0, p.PIN_16, pwm::Config::default()),
        Pwm::new_output_a(p.PWM_SLICE1, p.PIN_18, pwm::Config::default()),
        Pwm::new_output_a(p.PWM_SLICE2, p.PIN_20, pwm::Config::default()),
    );
    let mut led_driver = LedDriver::new();
    info!("Status LED initialized!");

    // Sound module bus idles high (no cue), load starts powered
    let mut audio_pins = AudioPins::new([
        Output::new(p.PIN_10, Level::High),
        Output::new(p.PIN_11, Level::High),
        Output::new(p.PIN_12, Level::High),
    ]);
    let mut audio_gate = AudioGate::new();
    let mut load_gate = LoadGate::new(Output::new(p.PIN_14, Level::High));
    let mut load_switch = LoadSwitch::new();

    // The battery box has no button fitted; the signal then never fires
    #[cfg(not(feature = "battery-box"))]
    {
        spawner.spawn(button_task(Input::new(p.PIN_15, Pull::Down))).unwrap();
        info!("Button task spawned");
    }

    // Sample source publishes into the Watch; the loop reads the latest value
    let mut samples = SAMPLES.dyn_receiver().unwrap();

    #[cfg(feature = "uart-link")]
    {
        use embassy_rp::uart::{self, UartRx};

        let mut uart_config = uart::Config::default();
        uart_config.baudrate = LINK_BAUD;
        let rx = UartRx::new(p.UART0, p.PIN_1, tasks::link::Irqs, p.DMA_CH0, uart_config);

        spawner.spawn(tasks::link_task(rx, SAMPLES.dyn_sender())).unwrap();
        info!("Link task spawned");
    }
    #[cfg(not(feature = "uart-link"))]
    {
        spawner.spawn(tasks::demo_sample_task(SAMPLES.dyn_sender(), boot)).unwrap();
        info!("Demo sample task spawned");
    }

    let mut poll_gate = PollGate::new(BMS_QUERY_MS);
    let mut link = LinkSupervisor::new(0);
    let mut last_screen: Option<LinkScreen> = None;
    let mut last_verdict: Option<FrameVerdict> = None;
    let mut last_status_log = 0u64;

    info!("Main loop starting");

    loop {
        let now_ms = boot.elapsed().as_millis();

        // Button: toggle the load and mute/unmute the sound module together
        if BUTTON_PRESSED.try_take().is_some() {
            let gate_high = load_switch.toggle();
            let audio_on = audio_gate.toggle();
            load_gate.set(gate_high);
            audio_pins.set(audio_gate.rest_levels());
            info!("Load {}, audio {}", if gate_high { "on" } else { "off" }, if audio_on { "on" } else { "off" });
        }

        // Sample poll at the BMS query rate
        if poll_gate.ready(now_ms)
            && let Some(sample) = samples.try_changed()
        {
            let verdict = link.on_frame(sample.valid, now_ms);
            match verdict {
                FrameVerdict::Accept { redraw } => {
                    if redraw {
                        estimator.invalidate_display();
                    }
                    let state = estimator.tick(&sample, now_ms);

                    if state.status_changed {
                        info!("Status: {} ({}%)", state.status, state.soc);
                    }
                    if state.line_changed {
                        info!("Line: {}", state.time_estimate_line.as_str());
                    }
                    led_driver.set_state(state.soc, state.charging, state.status, now_ms);

                    if let Some(levels) = audio_gate.pulse(state.audio) {
                        info!("Audio cue: {}", state.audio);
                        audio_pins.pulse(levels, audio_gate.rest_levels()).await;
                    }
                }
                FrameVerdict::Recovering if last_verdict != Some(verdict) => info!("Loading data"),
                FrameVerdict::NoData if last_verdict != Some(verdict) => warn!("No data"),
                _ => {}
            }
            last_verdict = Some(verdict);
        }

        // Link lifecycle
        while let Some(event) = link.poll(now_ms) {
            match event {
                LinkEvent::Connected => {
                    info!("Link connected");
                    estimator.invalidate_display();
                }
                LinkEvent::HandshakeFailed => error!("Link handshake failed"),
                LinkEvent::Retry => info!("Link retrying"),
                LinkEvent::Reconnect => {
                    warn!("Link lost, reconnecting");
                    #[cfg(feature = "uart-link")]
                    tasks::LINK_RESET.signal(());
                }
            }
        }

        let screen = link.screen(now_ms);
        if screen != last_screen {
            match screen {
                Some(screen) => info!("Screen: {}", screen.message()),
                None => estimator.invalidate_display(),
            }
            last_screen = screen;
        }

        led.show(led_driver.update(now_ms));

        // Log status periodically
        if now_ms.saturating_sub(last_status_log) >= STATUS_LOG_PERIOD_MS {
            let state = estimator.last_state();
            info!(
                "SOC {}% | I {} A | chg {} dis {} | {} | link {}",
                state.soc,
                state.filtered_current_a,
                state.charging,
                state.discharging,
                state.time_estimate_line.as_str(),
                link.phase()
            );
            info!(
                "Draw: step EMA {} A, typical {} A",
                estimator.step_ema_a(),
                estimator.typical_draw_a()
            );
            last_status_log = now_ms;
        }

        Timer::after_millis(LOOP_PERIOD_MS).await;
    }
}
