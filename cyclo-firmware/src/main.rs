//! Cyclo - Relay Cycler Firmware
//!
//! Main firmware binary for RP2040-based relay cyclers. One contact is
//! driven through short timed programs typed on the serial console or
//! set from the front panel, and kept in an emulated EEPROM.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::UART0;
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use cyclo_core::config::{parse_config, BoardConfig};
use cyclo_core::store::{ProgramManager, STORE_SIZE};
use cyclo_hal_rp2040::eeprom::FlashEeprom;
use cyclo_hal_rp2040::gpio::{RelayOutput, SenseInput};
use cyclo_hal_rp2040::pins;

use crate::channels::ChannelRouter;

mod channels;
mod tasks;

/// Embedded board configuration (compiled into firmware)
/// Edit cyclo.toml and rebuild to customize
const EMBEDDED_CONFIG: &str = include_str!("../cyclo.toml");

/// The program engine as wired on this board
pub type Manager = ProgramManager<
    CriticalSectionRawMutex,
    FlashEeprom<'static, STORE_SIZE>,
    RelayOutput<'static>,
    ChannelRouter,
>;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
});

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 1024]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 64]> = StaticCell::new();

static MANAGER: StaticCell<Manager> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Cyclo firmware starting...");

    let p = embassy_rp::init(Default::default());
    let (mut bank, rest) = pins::split(p);
    info!("Peripherals initialized");

    let config = load_config();

    // Relay and wiring sense pins come from the config
    let relay = RelayOutput::new(unwrap!(bank.take(config.relay.pin.gpio)), config.relay.pin);
    let no_pin = SenseInput::new(unwrap!(bank.take(config.nonc.no_pin.gpio)), config.nonc.no_pin);
    let nc_pin = SenseInput::new(unwrap!(bank.take(config.nonc.nc_pin.gpio)), config.nonc.nc_pin);
    info!(
        "Relay on GPIO{}, NO sense on GPIO{}, NC sense on GPIO{}",
        config.relay.pin.gpio, config.nonc.no_pin.gpio, config.nonc.nc_pin.gpio
    );

    let store = unwrap!(FlashEeprom::<STORE_SIZE>::new(rest.flash, config.storage.offset));
    info!("Program store at flash offset {:#x}", config.storage.offset);

    let manager: &'static Manager = MANAGER.init(ProgramManager::new(store, relay, ChannelRouter));
    info!("Program store scanned: {} programs", manager.occupancy().len());

    // Console UART on GPIO0/GPIO1
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = config.console.baudrate;

    let tx_buf = TX_BUF.init([0u8; 1024]);
    let rx_buf = RX_BUF.init([0u8; 64]);

    let uart = Uart::new_blocking(rest.uart0, rest.uart_tx, rest.uart_rx, uart_config);
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let (tx, rx) = uart.split();
    info!("Console UART initialized at {} baud", config.console.baudrate);

    // Spawn tasks
    spawner.spawn(tasks::timer_task()).unwrap();
    spawner.spawn(tasks::sequencer_task(manager)).unwrap();
    spawner
        .spawn(tasks::nonc_sampler_task(no_pin, nc_pin, config.sample_period_ms()))
        .unwrap();
    spawner.spawn(tasks::wiring_task(manager)).unwrap();
    spawner
        .spawn(tasks::console_task(manager, rx, tx, config.console.banner))
        .unwrap();
    spawner
        .spawn(tasks::health_task(manager, config.ui.health_interval_ms))
        .unwrap();
    spawner.spawn(tasks::ui_task(manager, config.ui)).unwrap();

    info!("All tasks spawned, firmware running");
}

/// Parse the embedded configuration
///
/// build.rs has already validated cyclo.toml; falling back to the defaults
/// only happens if the two parsers disagree.
fn load_config() -> BoardConfig {
    match parse_config(EMBEDDED_CONFIG) {
        Ok(config) => {
            info!("Parsed embedded configuration successfully");
            config
        }
        Err(e) => {
            error!("Failed to parse embedded config: {:?}", e);
            error!("Using default board configuration");
            BoardConfig::default()
        }
    }
}
