//! Sequencer health check
//!
//! Periodically probes the sequencer task with `CheckHealth` and warns
//! when the previous probe went unanswered.

use defmt::*;
use embassy_time::{Duration, Ticker};
use portable_atomic::Ordering;

use cyclo_core::Event;

use super::sequencer::HEALTH_ACK;
use crate::Manager;

/// Health task - one probe per interval
#[embassy_executor::task]
pub async fn health_task(manager: &'static Manager, interval_ms: u32) {
    info!("Health task started, every {} ms", interval_ms);

    let mut ticker = Ticker::every(Duration::from_millis(interval_ms as u64));
    let mut probed = false;

    loop {
        ticker.next().await;

        if probed && !HEALTH_ACK.swap(false, Ordering::AcqRel) {
            warn!("Sequencer missed a health check");
        }

        manager.publish(Event::CheckHealth);
        probed = true;
    }
}
