//! User interface task
//!
//! Shows the splash screen, boots the program manager and then follows
//! the engine's notifications. Rendering to a display and keypad input
//! live outside this firmware; here the state is reported over defmt.

use defmt::*;
use embassy_time::Timer;

use cyclo_core::config::UiConfig;
use cyclo_core::manual::ManualProgram;
use cyclo_core::Event;

use crate::channels::UI_CHANNEL;
use crate::Manager;

/// UI task - boot sequence and notification handling
#[embassy_executor::task]
pub async fn ui_task(manager: &'static Manager, config: UiConfig) {
    info!("UI task started");

    Timer::after_millis(config.splash_ms as u64).await;

    let manual = ManualProgram::load(manager);
    info!(
        "Manual program: on {}m{}s, off {}m{}s",
        manual.on_min, manual.on_sec, manual.off_min, manual.off_sec
    );
    info!(
        "Stored programs: {}, autostart {:?}, last used {:?}",
        manager.occupancy().len(),
        manager.auto_start(),
        manager.last_used()
    );

    manager.boot();
    info!("Selected program {:?}", manager.selected());

    loop {
        let event = UI_CHANNEL.receive().await;
        handle_event(manager, event);
    }
}

fn handle_event(manager: &Manager, event: Event) {
    match event {
        Event::ContactUpdate => {
            let open = manager.contact_is_open();
            debug!("Contact {}", if open { "open" } else { "closed" });
        }
        Event::NoNcUpdate => {
            let no = manager.contact_is_no();
            info!("Contact wiring {}", if no { "NO" } else { "NC" });
        }
        Event::CounterUpdate => {
            debug!("Loop counter {:?}", manager.counter());
        }
        Event::ProgramIsStopped => {
            info!("Program finished, state {:?}", manager.state());
        }
        Event::UsbConnected => info!("Console took control of the relay"),
        Event::UsbDisconnected => info!("Console released the relay"),
        _ => {}
    }
}
