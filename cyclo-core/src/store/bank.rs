//! Two-sector image banking
//!
//! A flash-backed store keeps its image in two sectors and programs them
//! alternately. Each sector ends its image with a footer:
//!
//! ```text
//! offset  size  field
//!      0     2  magic        "CY"
//!      2     4  generation   little endian, +1 per commit
//!      6     2  crc16        little endian, over image and generation
//! ```
//!
//! The footer is programmed after the image, so a sector whose commit was
//! cut short has no valid footer and the other sector still wins.

use super::crc::{crc16, crc16_update};

/// Size of the footer that follows the image
pub const FOOTER_LEN: usize = 8;

const MAGIC: [u8; 2] = *b"CY";

/// Footer sealing `image` as `generation`
pub fn seal(image: &[u8], generation: u32) -> [u8; FOOTER_LEN] {
    let stamp = generation.to_le_bytes();
    let crc = crc16_update(crc16(image), &stamp);

    let mut footer = [0u8; FOOTER_LEN];
    footer[..2].copy_from_slice(&MAGIC);
    footer[2..6].copy_from_slice(&stamp);
    footer[6..].copy_from_slice(&crc.to_le_bytes());
    footer
}

/// Generation of a sector whose footer matches its image
pub fn generation(image: &[u8], footer: &[u8; FOOTER_LEN]) -> Option<u32> {
    if footer[..2] != MAGIC {
        return None;
    }
    let generation = u32::from_le_bytes([footer[2], footer[3], footer[4], footer[5]]);
    (seal(image, generation) == *footer).then_some(generation)
}

/// Index of the sector holding the newest valid image
///
/// Generations compare with wraparound.
pub fn newest(banks: [Option<u32>; 2]) -> Option<usize> {
    match banks {
        [Some(a), Some(b)] => Some(if (b.wrapping_sub(a) as i32) > 0 { 1 } else { 0 }),
        [Some(_), None] => Some(0),
        [None, Some(_)] => Some(1),
        [None, None] => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ERASED_FOOTER: [u8; FOOTER_LEN] = [0xFF; FOOTER_LEN];

    #[test]
    fn test_sealed_image_reports_generation() {
        let image = [0x50u8; 64];
        let footer = seal(&image, 7);
        assert_eq!(generation(&image, &footer), Some(7));
    }

    #[test]
    fn test_erased_or_torn_sector_is_invalid() {
        let image = [0xFFu8; 64];
        assert_eq!(generation(&image, &ERASED_FOOTER), None);

        let mut torn = [0x50u8; 64];
        let footer = seal(&torn, 3);
        torn[40] = 0xFF;
        assert_eq!(generation(&torn, &footer), None);
    }

    #[test]
    fn test_newest_bank() {
        assert_eq!(newest([None, None]), None);
        assert_eq!(newest([Some(4), None]), Some(0));
        assert_eq!(newest([None, Some(4)]), Some(1));
        assert_eq!(newest([Some(4), Some(5)]), Some(1));
        assert_eq!(newest([Some(6), Some(5)]), Some(0));
        assert_eq!(newest([Some(u32::MAX), Some(0)]), Some(1));
    }

    #[test]
    fn test_interrupted_commit_keeps_previous_image() {
        let old = [0x11u8; 64];
        let new = [0x22u8; 64];
        let banks = [generation(&old, &seal(&old, 1)), None];

        // Image programmed, footer not yet
        let staged = [generation(&old, &seal(&old, 1)), generation(&new, &ERASED_FOOTER)];
        assert_eq!(newest(staged), Some(0));

        let committed = [banks[0], generation(&new, &seal(&new, 2))];
        assert_eq!(newest(committed), Some(1));
    }
}
