//! EEPROM emulation in RP2040 flash
//!
//! The RP2040 has no EEPROM, so the program store lives in flash. A RAM
//! mirror of the image serves reads and takes page writes and erases;
//! [`ByteStore::flush`] commits it.
//!
//! Two consecutive 4 KB sectors hold the image alternately. A commit erases
//! and programs the sector not currently in use, then seals it with a
//! generation footer (see `cyclo_core::store::bank`). A reset mid-commit
//! leaves the previous sector intact, so at worst the last change is lost.
//!
//! Flash erase and program run with XIP suspended, which stalls the other
//! core and interrupts for a few milliseconds. The store only writes on
//! user action (save, delete, run, autostart), so this is acceptable.

use cyclo_core::store::bank::{self, FOOTER_LEN};
use cyclo_hal::{ByteStore, StoreError, EEPROM_PAGE_SIZE, ERASED};
use embassy_rp::flash::{Blocking, Flash, ERASE_SIZE};
use embassy_rp::peripherals::FLASH;
use embassy_rp::Peri;

/// Flash size on the target board
pub const FLASH_SIZE: usize = 2 * 1024 * 1024;

/// Flash used by the store: two sectors
pub const REGION_SIZE: usize = 2 * ERASE_SIZE;

/// Emulated EEPROM of `SIZE` bytes banked across two flash sectors
pub struct FlashEeprom<'d, const SIZE: usize> {
    flash: Flash<'d, FLASH, Blocking, FLASH_SIZE>,
    offset: u32,
    mirror: [u8; SIZE],
    /// Sector holding the current image, `None` if neither is valid
    bank: Option<usize>,
    generation: u32,
    dirty: bool,
}

impl<'d, const SIZE: usize> FlashEeprom<'d, SIZE> {
    /// Open the image at flash `offset`
    ///
    /// `offset` must be sector aligned and both sectors must fit on the
    /// device. When neither sector holds a sealed image the store starts
    /// erased.
    pub fn new(flash: Peri<'d, FLASH>, offset: u32) -> Result<Self, StoreError> {
        let aligned = offset as usize % ERASE_SIZE == 0;
        let fits = SIZE + FOOTER_LEN <= ERASE_SIZE && offset as usize + REGION_SIZE <= FLASH_SIZE;
        if !aligned || !fits {
            return Err(StoreError::OutOfRange);
        }

        let mut store = Self {
            flash: Flash::new_blocking(flash),
            offset,
            mirror: [ERASED; SIZE],
            bank: None,
            generation: 0,
            dirty: false,
        };

        let mut generations = [None; 2];
        for (index, slot) in generations.iter_mut().enumerate() {
            *slot = store.read_bank(index)?;
        }

        if let Some(index) = bank::newest(generations) {
            let sector = store.sector(index);
            store
                .flash
                .blocking_read(sector, &mut store.mirror)
                .map_err(|_| StoreError::Io)?;
            store.bank = Some(index);
            store.generation = generations[index].unwrap_or(0);
        }

        Ok(store)
    }

    /// Flash offset of the first sector
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Generation of the image last committed
    pub fn generation(&self) -> u32 {
        self.generation
    }

    fn sector(&self, index: usize) -> u32 {
        self.offset + (index * ERASE_SIZE) as u32
    }

    /// Generation of a sector's sealed image, `None` if it has none
    fn read_bank(&mut self, index: usize) -> Result<Option<u32>, StoreError> {
        let sector = self.sector(index);
        let mut image = [0u8; SIZE];
        let mut footer = [0u8; FOOTER_LEN];
        self.flash
            .blocking_read(sector, &mut image)
            .map_err(|_| StoreError::Io)?;
        self.flash
            .blocking_read(sector + SIZE as u32, &mut footer)
            .map_err(|_| StoreError::Io)?;
        Ok(bank::generation(&image, &footer))
    }

    fn page_range(&self, page: usize) -> Result<core::ops::Range<usize>, StoreError> {
        let start = page
            .checked_mul(EEPROM_PAGE_SIZE)
            .ok_or(StoreError::OutOfRange)?;
        let end = start
            .checked_add(EEPROM_PAGE_SIZE)
            .ok_or(StoreError::OutOfRange)?;
        if end > SIZE {
            return Err(StoreError::OutOfRange);
        }
        Ok(start..end)
    }
}

impl<'d, const SIZE: usize> ByteStore for FlashEeprom<'d, SIZE> {
    fn capacity(&self) -> usize {
        SIZE
    }

    fn read_at(&mut self, offset: usize, buffer: &mut [u8]) -> Result<(), StoreError> {
        let end = offset
            .checked_add(buffer.len())
            .ok_or(StoreError::OutOfRange)?;
        let source = self.mirror.get(offset..end).ok_or(StoreError::OutOfRange)?;
        buffer.copy_from_slice(source);
        Ok(())
    }

    fn write_page(&mut self, page: usize, data: &[u8]) -> Result<(), StoreError> {
        if data.len() != EEPROM_PAGE_SIZE {
            return Err(StoreError::OutOfRange);
        }
        let range = self.page_range(page)?;
        if self.mirror[range.clone()] != *data {
            self.mirror[range].copy_from_slice(data);
            self.dirty = true;
        }
        Ok(())
    }

    fn erase_page(&mut self, page: usize) -> Result<(), StoreError> {
        let range = self.page_range(page)?;
        if self.mirror[range.clone()].iter().any(|&b| b != ERASED) {
            self.mirror[range].fill(ERASED);
            self.dirty = true;
        }
        Ok(())
    }

    /// Program the mirror into the idle sector and seal it
    fn flush(&mut self) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }

        let target = match self.bank {
            Some(index) => 1 - index,
            None => 0,
        };
        let generation = self.generation.wrapping_add(1);
        let sector = self.sector(target);

        self.flash
            .blocking_erase(sector, sector + ERASE_SIZE as u32)
            .map_err(|_| StoreError::Io)?;
        self.flash
            .blocking_write(sector, &self.mirror)
            .map_err(|_| StoreError::Io)?;
        self.flash
            .blocking_write(sector + SIZE as u32, &bank::seal(&self.mirror, generation))
            .map_err(|_| StoreError::Io)?;

        self.bank = Some(target);
        self.generation = generation;
        self.dirty = false;
        Ok(())
    }
}
