//! Link frame reader for the radio bridge on UART0.
//!
//! The bridge forwards each 16-byte frame from the battery box as-is. Frames
//! carry no delimiter, so a lost byte shifts every later frame. The main loop
//! detects that through the link supervisor and raises [`LINK_RESET`]; the
//! task then drains the port until the line goes idle and starts over on a
//! frame boundary.

use defmt::{info, warn};
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::UART0;
use embassy_rp::uart::{self, Async, UartRx};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_sync::watch::DynSender;
use embassy_time::{Duration, with_timeout};

use crate::config::BMS_QUERY_MS;
use crate::sample::{FRAME_LEN, Sample};

bind_interrupts!(pub struct Irqs {
    UART0_IRQ => uart::InterruptHandler<UART0>;
});

/// Raised by the main loop when the link needs re-synchronising.
pub static LINK_RESET: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// A frame that has not fully arrived in this long counts as a failed read.
const FRAME_TIMEOUT: Duration = Duration::from_millis(BMS_QUERY_MS * 4);

/// Silence on the line that marks a frame boundary.
const RESYNC_IDLE: Duration = Duration::from_millis(20);

/// Link task - reads frames and publishes one sample per read attempt.
#[embassy_executor::task]
pub async fn link_task(
    mut rx: UartRx<'static, Async>,
    sender: DynSender<'static, Sample>,
) {
    info!("Link task started");

    let mut frame = [0u8; FRAME_LEN];
    loop {
        if LINK_RESET.try_take().is_some() {
            warn!("Link: re-synchronising");
            drain(&mut rx).await;
        }

        let sample = match with_timeout(FRAME_TIMEOUT, rx.read(&mut frame)).await {
            Ok(Ok(())) => Sample::from_frame(&frame).unwrap_or_else(|e| {
                warn!("Link: {}", e);
                Sample::invalid()
            }),
            Ok(Err(e)) => {
                warn!("Link: UART error {}", e);
                Sample::invalid()
            }
            Err(_) => Sample::invalid(),
        };

        sender.send(sample);
    }
}

/// Discard bytes until the line has been idle for [`RESYNC_IDLE`].
async fn drain(rx: &mut UartRx<'static, Async>) {
    let mut byte = [0u8; 1];
    while let Ok(Ok(())) = with_timeout(RESYNC_IDLE, rx.read(&mut byte)).await {}
}
