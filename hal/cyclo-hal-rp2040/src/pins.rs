//! Dynamic pin allocation for config-driven hardware setup
//!
//! Pin numbers for the relay and the NO/NC jumper come from `cyclo.toml`,
//! so GPIOs are handed out by number at runtime. GPIO0 and GPIO1 carry
//! the console UART and are never available from the bank.

use embassy_rp::gpio::AnyPin;
use embassy_rp::peripherals::{FLASH, PIN_0, PIN_1, UART0};
use embassy_rp::{Peri, Peripherals};

/// Number of GPIOs on the RP2040
pub const GPIO_COUNT: usize = 30;

/// GPIOs reserved for the console UART
pub const CONSOLE_PINS: [u8; 2] = [0, 1];

/// Error when requesting a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinError {
    /// Pin number out of range (0-29 valid)
    InvalidPin,
    /// Pin already taken
    AlreadyTaken,
    /// Pin reserved for the console
    Reserved,
}

/// Pin bank that holds the free GPIO pins and hands them out by number
pub struct PinBank {
    pins: [Option<Peri<'static, AnyPin>>; GPIO_COUNT],
}

impl PinBank {
    /// Take a pin by number
    pub fn take(&mut self, gpio: u8) -> Result<Peri<'static, AnyPin>, PinError> {
        if gpio as usize >= GPIO_COUNT {
            return Err(PinError::InvalidPin);
        }
        if CONSOLE_PINS.contains(&gpio) {
            return Err(PinError::Reserved);
        }
        self.pins[gpio as usize]
            .take()
            .ok_or(PinError::AlreadyTaken)
    }

    /// Check if a pin is available
    pub fn is_available(&self, gpio: u8) -> bool {
        self.pins
            .get(gpio as usize)
            .is_some_and(|pin| pin.is_some())
    }
}

/// Peripherals the firmware uses besides the pin bank
pub struct RemainingPeripherals {
    pub flash: Peri<'static, FLASH>,
    pub uart0: Peri<'static, UART0>,
    pub uart_tx: Peri<'static, PIN_0>,
    pub uart_rx: Peri<'static, PIN_1>,
}

/// Split the peripherals into the pin bank and everything else
pub fn split(p: Peripherals) -> (PinBank, RemainingPeripherals) {
    let bank = PinBank {
        pins: [
            None,
            None,
            Some(p.PIN_2.into()),
            Some(p.PIN_3.into()),
            Some(p.PIN_4.into()),
            Some(p.PIN_5.into()),
            Some(p.PIN_6.into()),
            Some(p.PIN_7.into()),
            Some(p.PIN_8.into()),
            Some(p.PIN_9.into()),
            Some(p.PIN_10.into()),
            Some(p.PIN_11.into()),
            Some(p.PIN_12.into()),
            Some(p.PIN_13.into()),
            Some(p.PIN_14.into()),
            Some(p.PIN_15.into()),
            Some(p.PIN_16.into()),
            Some(p.PIN_17.into()),
            Some(p.PIN_18.into()),
            Some(p.PIN_19.into()),
            Some(p.PIN_20.into()),
            Some(p.PIN_21.into()),
            Some(p.PIN_22.into()),
            Some(p.PIN_23.into()),
            Some(p.PIN_24.into()),
            Some(p.PIN_25.into()),
            Some(p.PIN_26.into()),
            Some(p.PIN_27.into()),
            Some(p.PIN_28.into()),
            Some(p.PIN_29.into()),
        ],
    };
    let remaining = RemainingPeripherals {
        flash: p.FLASH,
        uart0: p.UART0,
        uart_tx: p.PIN_0,
        uart_rx: p.PIN_1,
    };
    (bank, remaining)
}
