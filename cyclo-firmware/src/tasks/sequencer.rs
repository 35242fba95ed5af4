//! Sequencer task
//!
//! Owns the [`Sequencer`] and feeds it every message from the sequencer
//! channel. Step delays come back through the timer task.

use defmt::*;
use portable_atomic::{AtomicBool, Ordering};

use cyclo_core::sequencer::Sequencer;
use cyclo_core::Event;

use super::timer::EmbassyTimer;
use crate::channels::SEQUENCER_CHANNEL;
use crate::Manager;

/// Set when the sequencer answers a health check
pub static HEALTH_ACK: AtomicBool = AtomicBool::new(false);

/// Sequencer task - plays the active program
#[embassy_executor::task]
pub async fn sequencer_task(manager: &'static Manager) {
    info!("Sequencer task started");

    let mut sequencer = Sequencer::new(manager, EmbassyTimer::new());

    loop {
        let event = SEQUENCER_CHANNEL.receive().await;

        match event {
            Event::SequenceNext { .. } => trace!("Sequencer: {:?}", event),
            Event::CheckHealth => HEALTH_ACK.store(true, Ordering::Release),
            _ => debug!("Sequencer: {:?}", event),
        }

        sequencer.handle(event);
    }
}
