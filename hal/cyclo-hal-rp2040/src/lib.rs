//! RP2040-specific HAL for the relay cycler firmware
//!
//! This crate provides RP2040 implementations of the shared `cyclo-hal`
//! traits:
//!
//! - Emulated EEPROM banked across two flash sectors (implements
//!   `cyclo_hal::ByteStore`)
//! - Relay drive output and NO/NC sense inputs with configurable polarity
//! - Dynamic pin allocation for config-driven setup

#![no_std]

pub mod eeprom;
pub mod gpio;
pub mod pins;

pub use cyclo_hal::{ByteStore, InputPin, OutputPin, StoreError};
