//! NO/NC wiring detection
//!
//! The sampler reads the two jumper inputs at a fixed rate and reports a
//! change of wiring through the [`WIRING`] signal. The wiring task applies
//! it to the contact, outside the sampler's tight loop.

use defmt::*;
use embassy_time::{Duration, Ticker};

use cyclo_hal::InputPin;
use cyclo_hal_rp2040::gpio::SenseInput;

use crate::channels::WIRING;
use crate::Manager;

/// Wiring read from the jumper, `None` when it is missing or ambiguous
fn read_wiring(no_pin: &SenseInput<'_>, nc_pin: &SenseInput<'_>) -> Option<bool> {
    match (no_pin.is_low(), nc_pin.is_low()) {
        (true, false) => Some(true),
        (false, true) => Some(false),
        _ => None,
    }
}

/// Sampler task - reports the wiring whenever it changes
#[embassy_executor::task]
pub async fn nonc_sampler_task(
    no_pin: SenseInput<'static>,
    nc_pin: SenseInput<'static>,
    period_ms: u32,
) {
    info!("NO/NC sampler started, every {} ms", period_ms);

    let mut ticker = Ticker::every(Duration::from_millis(period_ms as u64));
    let mut reported: Option<bool> = None;

    loop {
        if let Some(is_no) = read_wiring(&no_pin, &nc_pin) {
            if reported != Some(is_no) {
                reported = Some(is_no);
                WIRING.signal(is_no);
            }
        }

        ticker.next().await;
    }
}

/// Wiring task - applies reported wiring to the contact
#[embassy_executor::task]
pub async fn wiring_task(manager: &'static Manager) {
    info!("Wiring task started");

    loop {
        let is_no = WIRING.wait().await;
        info!("Relay wired {}", if is_no { "NO" } else { "NC" });
        manager.set_contact_wiring(is_no);
    }
}
