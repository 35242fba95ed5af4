//! CRC-16/CCITT-FALSE
//!
//! Polynomial 0x1021, initial value 0xFFFF, no reflection, no final xor.
//! This is the checksum the XMEGA CRC peripheral produces in CCITT mode.

const POLY: u16 = 0x1021;
const INIT: u16 = 0xFFFF;

/// Checksum of `data`
pub fn crc16(data: &[u8]) -> u16 {
    crc16_update(INIT, data)
}

/// Continue a running checksum with more data
pub fn crc16_update(crc: u16, data: &[u8]) -> u16 {
    let mut crc = crc;

    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ POLY;
            } else {
                crc <<= 1;
            }
        }
    }

    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_value() {
        assert_eq!(crc16(b"123456789"), 0x29B1);
    }

    #[test]
    fn test_empty_input_is_init() {
        assert_eq!(crc16(&[]), INIT);
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let data = b"c 1M o 5s *";
        let (head, tail) = data.split_at(4);
        assert_eq!(crc16_update(crc16(head), tail), crc16(data));
    }

    #[test]
    fn test_single_bit_change_detected() {
        let mut data = *b"P\xFF\xFFo 1 c 1 *";
        let before = crc16(&data);
        data[5] ^= 0x01;
        assert_ne!(crc16(&data), before);
    }
}
