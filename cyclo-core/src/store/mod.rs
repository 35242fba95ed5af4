//! Persistent program store
//!
//! Ten fixed slots of two EEPROM pages each, validated by marker and
//! CRC-16 on every read. Slot 0 holds the manual program and always
//! exists.

pub mod bank;
pub mod crc;
pub mod manager;
pub mod record;

pub use manager::{Occupancy, ProgramManager, MANUAL_DEFAULT, MANUAL_SLOT};
pub use record::{StoredProgram, RECORD_SIZE, SLOT_COUNT, TEXT_LEN};

/// Bytes of EEPROM needed for all slots
pub const STORE_SIZE: usize = SLOT_COUNT * RECORD_SIZE;
