//! Cyclo Hardware Abstraction Layer
//!
//! This crate defines the narrow hardware contracts the program engine
//! is written against. Chip-specific HALs implement them; host tests use
//! the in-memory [`eeprom::RamEeprom`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application (cyclo-firmware)           │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  cyclo-core (program engine)            │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  cyclo-hal (this crate - traits)        │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!             ┌───────────────┐
//!             │ cyclo-hal-    │
//!             │    rp2040     │
//!             └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::OutputPin`], [`gpio::InputPin`] - Relay drive and wiring sense
//! - [`eeprom::ByteStore`] - Page-organised non-volatile storage

#![no_std]
#![deny(unsafe_code)]

pub mod eeprom;
pub mod gpio;

// Re-export key traits at crate root for convenience
pub use eeprom::{ByteStore, RamEeprom, StoreError, EEPROM_PAGE_SIZE};
pub use gpio::{InputPin, OutputPin};
