//! Demo sample task for bench testing without a BMS.

use defmt::info;
use embassy_sync::watch::DynSender;
use embassy_time::{Instant, Timer};

use crate::config::BMS_QUERY_MS;
use crate::sample::Sample;
use crate::source::DemoSweep;

/// Demo sample generation task - publishes the synthetic sweep at the poll rate.
#[embassy_executor::task]
pub async fn demo_sample_task(
    sender: DynSender<'static, Sample>,
    start_time: Instant,
) {
    info!("Demo sample task started");

    let mut sweep = DemoSweep::new();
    loop {
        // Time-based stepping (independent of loop rate)
        sender.send(sweep.sample(start_time.elapsed().as_millis()));

        Timer::after_millis(BMS_QUERY_MS).await;
    }
}
