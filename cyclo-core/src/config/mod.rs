//! Board configuration
//!
//! Tunables the firmware reads at boot: which pins drive the relay and
//! sense the NO/NC jumper, console settings, UI timing and where the
//! emulated EEPROM lives in flash. The firmware embeds `cyclo.toml` and
//! parses it with [`parse_config`].

mod toml;

pub use toml::parse_config;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of GPIOs on the RP2040
pub const GPIO_COUNT: u8 = 30;

/// Flash erase granularity the storage offset must be aligned to
pub const FLASH_SECTOR_SIZE: u32 = 4096;

/// Configuration error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Unknown or malformed section header
    InvalidSection,
    /// Value of the wrong type or out of range
    InvalidValue,
    /// Key not recognised in its section
    UnknownKey,
    /// Malformed, out of range or duplicated pin
    InvalidPin,
}

/// Pin configuration with optional inversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PinConfig {
    /// GPIO number
    pub gpio: u8,
    /// Pin is active-low
    pub inverted: bool,
}

impl PinConfig {
    pub const fn new(gpio: u8) -> Self {
        Self {
            gpio,
            inverted: false,
        }
    }

    pub const fn inverted(gpio: u8) -> Self {
        Self {
            gpio,
            inverted: true,
        }
    }
}

/// Relay drive output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RelayConfig {
    pub pin: PinConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            pin: PinConfig::new(23),
        }
    }
}

/// NO/NC jumper sense inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NoNcConfig {
    /// Pulled low when the relay is wired normally-open
    pub no_pin: PinConfig,
    /// Pulled low when the relay is wired normally-closed
    pub nc_pin: PinConfig,
    /// Sampling rate of the jumper
    pub sample_hz: u16,
}

impl Default for NoNcConfig {
    fn default() -> Self {
        Self {
            no_pin: PinConfig::new(2),
            nc_pin: PinConfig::new(3),
            sample_hz: 50,
        }
    }
}

/// Serial console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConsoleConfig {
    pub baudrate: u32,
    /// Print the greeting when the console starts
    pub banner: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            baudrate: 115_200,
            banner: true,
        }
    }
}

/// Front panel timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UiConfig {
    /// How long the splash screen stays up
    pub splash_ms: u32,
    /// Period of the sequencer health check
    pub health_interval_ms: u32,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            splash_ms: 1500,
            health_interval_ms: 5000,
        }
    }
}

/// Program storage placement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StorageConfig {
    /// Flash offset of the two sectors backing the program store
    pub offset: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { offset: 0x1F_0000 }
    }
}

/// Complete board configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoardConfig {
    pub relay: RelayConfig,
    pub nonc: NoNcConfig,
    pub console: ConsoleConfig,
    pub ui: UiConfig,
    pub storage: StorageConfig,
}

impl BoardConfig {
    /// Check cross-field constraints
    ///
    /// Every pin must exist and no GPIO may be used twice.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pins = [self.relay.pin, self.nonc.no_pin, self.nonc.nc_pin];
        for (i, pin) in pins.iter().enumerate() {
            if pin.gpio >= GPIO_COUNT {
                return Err(ConfigError::InvalidPin);
            }
            if pins[i + 1..].iter().any(|other| other.gpio == pin.gpio) {
                return Err(ConfigError::InvalidPin);
            }
        }

        if self.nonc.sample_hz == 0 || self.console.baudrate == 0 {
            return Err(ConfigError::InvalidValue);
        }
        if self.ui.health_interval_ms == 0 {
            return Err(ConfigError::InvalidValue);
        }
        if self.storage.offset % FLASH_SECTOR_SIZE != 0 {
            return Err(ConfigError::InvalidValue);
        }
        Ok(())
    }

    /// NO/NC sampling period
    pub fn sample_period_ms(&self) -> u32 {
        (1000 / self.nonc.sample_hz.max(1) as u32).max(1)
    }
}
