//! Load switch button task.
//!
//! Waits on the button edge, debounces by timestamp and hands a single flag to
//! the main loop. Presses that arrive before the loop consumes the flag
//! collapse into one.

use defmt::{debug, info};
use embassy_rp::gpio::Input;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::Instant;

use crate::button::ButtonState;

/// Set on every accepted press; taken by the main loop.
pub static BUTTON_PRESSED: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Button task - waits for rising edges (button pulls the line high).
#[embassy_executor::task]
pub async fn button_task(mut button: Input<'static>) {
    info!("Button task started");

    let mut state = ButtonState::new();
    loop {
        button.wait_for_rising_edge().await;

        if state.accept_edge(Instant::now().as_millis()) {
            BUTTON_PRESSED.signal(());
        } else {
            debug!("Button bounce ignored");
        }
    }
}
