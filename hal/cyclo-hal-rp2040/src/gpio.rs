//! Relay output and NO/NC sense inputs
//!
//! Both wrappers apply the polarity from the board configuration so the
//! rest of the firmware only deals in logical levels.

use cyclo_core::config::PinConfig;
use cyclo_hal::{InputPin, OutputPin};
use embassy_rp::gpio::{AnyPin, Input, Level, Output, Pull};
use embassy_rp::Peri;

/// Relay coil driver
pub struct RelayOutput<'d> {
    pin: Output<'d>,
    inverted: bool,
}

impl<'d> RelayOutput<'d> {
    /// Configure `pin` as an output, starting logically low
    pub fn new(pin: Peri<'d, AnyPin>, config: PinConfig) -> Self {
        let initial = if config.inverted { Level::High } else { Level::Low };
        Self {
            pin: Output::new(pin, initial),
            inverted: config.inverted,
        }
    }
}

impl OutputPin for RelayOutput<'_> {
    fn set_high(&mut self) {
        if self.inverted {
            self.pin.set_low();
        } else {
            self.pin.set_high();
        }
    }

    fn set_low(&mut self) {
        if self.inverted {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
    }

    fn is_set_high(&self) -> bool {
        self.pin.is_set_high() != self.inverted
    }
}

/// Wiring jumper sense input
///
/// The pin is pulled up; fitting the jumper pulls it low.
pub struct SenseInput<'d> {
    pin: Input<'d>,
    inverted: bool,
}

impl<'d> SenseInput<'d> {
    pub fn new(pin: Peri<'d, AnyPin>, config: PinConfig) -> Self {
        Self {
            pin: Input::new(pin, Pull::Up),
            inverted: config.inverted,
        }
    }
}

impl InputPin for SenseInput<'_> {
    fn is_high(&self) -> bool {
        self.pin.is_high() != self.inverted
    }
}
