//! Page-organised non-volatile storage
//!
//! Models a small EEPROM: reads are byte granular, writes and erases work
//! on whole pages. Backends may stage page writes and erases until
//! [`ByteStore::flush`], so a multi-page record reaches the media in one
//! commit.

/// EEPROM page size in bytes
pub const EEPROM_PAGE_SIZE: usize = 32;

/// Value of an erased byte
pub const ERASED: u8 = 0xFF;

/// Errors from storage operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// Address or page outside the device, or a page buffer of the wrong size
    OutOfRange,
    /// The underlying device reported a failure
    Io,
}

/// Byte addressable non-volatile memory
///
/// All operations are blocking and complete before returning. Callers
/// that share a store between tasks are expected to serialise access.
pub trait ByteStore {
    /// Total size of the device in bytes
    fn capacity(&self) -> usize;

    /// Read `buffer.len()` bytes starting at `offset`
    fn read_at(&mut self, offset: usize, buffer: &mut [u8]) -> Result<(), StoreError>;

    /// Replace the contents of page `page` with `data`
    ///
    /// `data` must be exactly [`EEPROM_PAGE_SIZE`] bytes long.
    fn write_page(&mut self, page: usize, data: &[u8]) -> Result<(), StoreError>;

    /// Reset page `page` to the erased state
    fn erase_page(&mut self, page: usize) -> Result<(), StoreError>;

    /// Make every staged write and erase durable
    ///
    /// Reads always see staged data. Stores that write through need not
    /// override this.
    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Number of whole pages on the device
    fn page_count(&self) -> usize {
        self.capacity() / EEPROM_PAGE_SIZE
    }
}

/// EEPROM image held in RAM
///
/// Starts fully erased. Used by host tests and by simulation builds that
/// have no persistent backing store.
pub struct RamEeprom<const SIZE: usize> {
    memory: [u8; SIZE],
    page_writes: usize,
    flushes: usize,
}

impl<const SIZE: usize> RamEeprom<SIZE> {
    /// Create an erased image
    pub const fn new() -> Self {
        Self {
            memory: [ERASED; SIZE],
            page_writes: 0,
            flushes: 0,
        }
    }

    /// Create an image from existing contents
    pub const fn from_bytes(memory: [u8; SIZE]) -> Self {
        Self {
            memory,
            page_writes: 0,
            flushes: 0,
        }
    }

    /// Raw view of the image
    pub fn as_bytes(&self) -> &[u8; SIZE] {
        &self.memory
    }

    /// Mutable raw view, for injecting corruption
    pub fn as_bytes_mut(&mut self) -> &mut [u8; SIZE] {
        &mut self.memory
    }

    /// Number of page writes and erases performed so far
    pub fn page_writes(&self) -> usize {
        self.page_writes
    }

    /// Number of flushes performed so far
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    fn page_range(page: usize) -> Result<core::ops::Range<usize>, StoreError> {
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

impl<const SIZE: usize> Default for RamEeprom<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const SIZE: usize> ByteStore for RamEeprom<SIZE> {
    fn capacity(&self) -> usize {
        SIZE
    }

    fn read_at(&mut self, offset: usize, buffer: &mut [u8]) -> Result<(), StoreError> {
        let end = offset
            .checked_add(buffer.len())
            .ok_or(StoreError::OutOfRange)?;
        let source = self.memory.get(offset..end).ok_or(StoreError::OutOfRange)?;
        buffer.copy_from_slice(source);
        Ok(())
    }

    fn write_page(&mut self, page: usize, data: &[u8]) -> Result<(), StoreError> {
        if data.len() != EEPROM_PAGE_SIZE {
            return Err(StoreError::OutOfRange);
        }
        let range = Self::page_range(page)?;
        self.memory[range].copy_from_slice(data);
        self.page_writes += 1;
        Ok(())
    }

    fn erase_page(&mut self, page: usize) -> Result<(), StoreError> {
        let range = Self::page_range(page)?;
        self.memory[range].fill(ERASED);
        self.page_writes += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.flushes += 1;
        Ok(())
    }
}

impl<T: ByteStore + ?Sized> ByteStore for &mut T {
    fn capacity(&self) -> usize {
        T::capacity(self)
    }

    fn read_at(&mut self, offset: usize, buffer: &mut [u8]) -> Result<(), StoreError> {
        T::read_at(self, offset, buffer)
    }

    fn write_page(&mut self, page: usize, data: &[u8]) -> Result<(), StoreError> {
        T::write_page(self, page, data)
    }

    fn erase_page(&mut self, page: usize) -> Result<(), StoreError> {
        T::erase_page(self, page)
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        T::flush(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_image_is_erased() {
        let mut eeprom = RamEeprom::<64>::new();
        let mut buf = [0u8; 64];
        eeprom.read_at(0, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == ERASED));
        assert_eq!(eeprom.page_count(), 2);
    }

    #[test]
    fn test_write_page_then_read_across_pages() {
        let mut eeprom = RamEeprom::<96>::new();
        eeprom.write_page(1, &[0xA5; EEPROM_PAGE_SIZE]).unwrap();

        let mut buf = [0u8; 4];
        eeprom.read_at(30, &mut buf).unwrap();
        assert_eq!(buf, [ERASED, ERASED, 0xA5, 0xA5]);
        assert_eq!(eeprom.page_writes(), 1);
    }

    #[test]
    fn test_erase_page_only_touches_that_page() {
        let mut eeprom = RamEeprom::<64>::from_bytes([0u8; 64]);
        eeprom.erase_page(0).unwrap();

        assert!(eeprom.as_bytes()[..32].iter().all(|&b| b == ERASED));
        assert!(eeprom.as_bytes()[32..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_out_of_range_access_rejected() {
        let mut eeprom = RamEeprom::<64>::new();
        let mut buf = [0u8; 8];

        assert_eq!(eeprom.read_at(60, &mut buf), Err(StoreError::OutOfRange));
        assert_eq!(eeprom.read_at(usize::MAX, &mut buf), Err(StoreError::OutOfRange));
        assert_eq!(
            eeprom.write_page(2, &[0; EEPROM_PAGE_SIZE]),
            Err(StoreError::OutOfRange)
        );
        assert_eq!(eeprom.erase_page(usize::MAX), Err(StoreError::OutOfRange));
    }

    #[test]
    fn test_short_page_buffer_rejected() {
        let mut eeprom = RamEeprom::<64>::new();
        assert_eq!(eeprom.write_page(0, &[0; 16]), Err(StoreError::OutOfRange));
        assert_eq!(eeprom.page_writes(), 0);
    }

    #[test]
    fn test_store_usable_through_reference() {
        fn fill<S: ByteStore>(mut store: S) {
            store.write_page(0, &[7; EEPROM_PAGE_SIZE]).unwrap();
        }

        let mut eeprom = RamEeprom::<32>::new();
        fill(&mut eeprom);
        assert_eq!(eeprom.as_bytes()[0], 7);
    }

    #[test]
    fn test_flush_forwarded_through_reference() {
        fn commit<S: ByteStore>(mut store: S) {
            store.flush().unwrap();
        }

        let mut eeprom = RamEeprom::<32>::new();
        commit(&mut eeprom);
        assert_eq!(eeprom.flushes(), 1);
        assert_eq!(eeprom.page_writes(), 0);
    }
}
