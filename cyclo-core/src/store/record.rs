//! On-media program record
//!
//! Each of the ten slots occupies two EEPROM pages:
//!
//! ```text
//! offset  size  field
//!      0     1  marker      'P' when the slot holds a program
//!      1     1  autostart   'A' or 0xFF
//!      2     1  last used   'L' or 0xFF
//!      3    59  text        program text, NUL padded
//!     62     2  crc16       little endian, over bytes 0..62
//! ```

use cyclo_hal::EEPROM_PAGE_SIZE;

use super::crc::crc16;

/// Number of program slots
pub const SLOT_COUNT: usize = 10;

/// Pages used by one record
pub const PAGES_PER_RECORD: usize = 2;

/// Size of one record in bytes
pub const RECORD_SIZE: usize = PAGES_PER_RECORD * EEPROM_PAGE_SIZE;

/// Room for program text in a record
pub const TEXT_LEN: usize = RECORD_SIZE - HEADER_LEN - CRC_LEN;

const HEADER_LEN: usize = 3;
const CRC_LEN: usize = 2;
const CRC_OFFSET: usize = RECORD_SIZE - CRC_LEN;

const MARKER_PROGRAM: u8 = b'P';
const FLAG_AUTOSTART: u8 = b'A';
const FLAG_LAST_USED: u8 = b'L';
const FLAG_UNSET: u8 = 0xFF;

/// Byte offset of a slot's record
pub const fn slot_offset(slot: u8) -> usize {
    slot as usize * RECORD_SIZE
}

/// First EEPROM page of a slot's record
pub const fn slot_page(slot: u8) -> usize {
    slot as usize * PAGES_PER_RECORD
}

/// A decoded program record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredProgram {
    pub auto_start: bool,
    pub last_used: bool,
    text: [u8; TEXT_LEN],
}

impl StoredProgram {
    /// Build a record, truncating `text` to [`TEXT_LEN`] bytes on a
    /// character boundary
    pub fn new(text: &str, auto_start: bool, last_used: bool) -> Self {
        let mut len = text.len().min(TEXT_LEN);
        while !text.is_char_boundary(len) {
            len -= 1;
        }

        let mut buf = [0u8; TEXT_LEN];
        buf[..len].copy_from_slice(&text.as_bytes()[..len]);

        Self {
            auto_start,
            last_used,
            text: buf,
        }
    }

    /// Program text, up to the first NUL
    pub fn text(&self) -> &str {
        let len = self.text.iter().position(|&b| b == 0).unwrap_or(TEXT_LEN);
        core::str::from_utf8(&self.text[..len]).unwrap_or("")
    }

    /// Serialise with a fresh CRC
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut bytes = [0u8; RECORD_SIZE];
        bytes[0] = MARKER_PROGRAM;
        bytes[1] = if self.auto_start { FLAG_AUTOSTART } else { FLAG_UNSET };
        bytes[2] = if self.last_used { FLAG_LAST_USED } else { FLAG_UNSET };
        bytes[HEADER_LEN..CRC_OFFSET].copy_from_slice(&self.text);

        let crc = crc16(&bytes[..CRC_OFFSET]);
        bytes[CRC_OFFSET..].copy_from_slice(&crc.to_le_bytes());
        bytes
    }

    /// Decode a raw record
    ///
    /// Returns `None` for virgin memory, a missing marker or a CRC
    /// mismatch.
    pub fn decode(bytes: &[u8; RECORD_SIZE]) -> Option<Self> {
        if bytes[0] != MARKER_PROGRAM {
            return None;
        }

        let stored = u16::from_le_bytes([bytes[CRC_OFFSET], bytes[CRC_OFFSET + 1]]);
        if stored != crc16(&bytes[..CRC_OFFSET]) {
            return None;
        }

        let mut text = [0u8; TEXT_LEN];
        text.copy_from_slice(&bytes[HEADER_LEN..CRC_OFFSET]);

        Some(Self {
            auto_start: bytes[1] == FLAG_AUTOSTART,
            last_used: bytes[2] == FLAG_LAST_USED,
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_layout() {
        assert_eq!(RECORD_SIZE, 64);
        assert_eq!(TEXT_LEN, 59);
        assert_eq!(slot_offset(3), 192);
        assert_eq!(slot_page(3), 6);
    }

    #[test]
    fn test_encode_bytes() {
        let bytes = StoredProgram::new("o 1 *", true, false).encode();
        assert_eq!(&bytes[..8], b"PA\xFFo 1 *");
        assert!(bytes[8..CRC_OFFSET].iter().all(|&b| b == 0));

        let crc = crc16(&bytes[..CRC_OFFSET]);
        assert_eq!(bytes[62], crc as u8);
        assert_eq!(bytes[63], (crc >> 8) as u8);
    }

    #[test]
    fn test_decode_roundtrip_with_flags() {
        let record = StoredProgram::new("c 1M o 5s *", false, true);
        let decoded = StoredProgram::decode(&record.encode()).unwrap();
        assert_eq!(decoded.text(), "c 1M o 5s *");
        assert!(!decoded.auto_start);
        assert!(decoded.last_used);
    }

    #[test]
    fn test_virgin_memory_is_absent() {
        assert!(StoredProgram::decode(&[0xFF; RECORD_SIZE]).is_none());
        assert!(StoredProgram::decode(&[0x00; RECORD_SIZE]).is_none());
    }

    #[test]
    fn test_long_text_truncated() {
        let long = "o 1 c 1 o 1 c 1 o 1 c 1 o 1 c 1 o 1 c 1 o 1 c 1 o 1 c 1 o 1 c 1";
        let record = StoredProgram::new(long, false, false);
        assert_eq!(record.text().len(), TEXT_LEN);
        assert_eq!(record.text(), &long[..TEXT_LEN]);
    }

    #[test]
    fn test_truncation_respects_char_boundary() {
        let mut text = [b'a'; TEXT_LEN + 1];
        // 'é' straddling the end of the text field
        text[TEXT_LEN - 1] = 0xC3;
        text[TEXT_LEN] = 0xA9;
        let text = core::str::from_utf8(&text).unwrap();

        let record = StoredProgram::new(text, false, false);
        assert_eq!(record.text().len(), TEXT_LEN - 1);
    }

    proptest! {
        #[test]
        fn prop_any_single_byte_corruption_is_detected(
            index in 0usize..RECORD_SIZE,
            flip in 1u8..=255,
        ) {
            let mut bytes = StoredProgram::new("c 10s o 20s *", true, true).encode();
            bytes[index] ^= flip;
            prop_assert!(StoredProgram::decode(&bytes).is_none());
        }
    }
}
