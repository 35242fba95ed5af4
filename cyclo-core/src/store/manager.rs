//! Program manager
//!
//! Owns the persisted programs, the active (playing) program, the contact
//! and the bookkeeping the user interface shows: selected slot, autostart
//! slot, last used slot, loop counter and program state.
//!
//! The manager is shared between workers by reference. Model state sits
//! behind one blocking mutex and the storage device behind another, so a
//! slow EEPROM write never holds up readers of the active program. Text
//! read from storage is parsed outside the model lock and swapped in
//! whole.

use core::cell::RefCell;

use cyclo_hal::{ByteStore, OutputPin, StoreError, EEPROM_PAGE_SIZE};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::String;

use super::record::{slot_offset, slot_page, StoredProgram, RECORD_SIZE, SLOT_COUNT, TEXT_LEN};
use crate::contact::{Contact, ContactState};
use crate::parser::{parse, Parsed};
use crate::program::Program;
use crate::sequencer::SequencerHost;
use crate::state::{Event, EventSink, ProgramState};

/// Slot holding the manual program
pub const MANUAL_SLOT: u8 = 0;

/// Manual program written to slot 0 when it is missing
pub const MANUAL_DEFAULT: &str = "c 1M o 5s *";

/// Set of occupied slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Occupancy(u16);

impl Occupancy {
    pub fn contains(self, slot: u8) -> bool {
        (slot as usize) < SLOT_COUNT && self.0 & (1 << slot) != 0
    }

    fn insert(&mut self, slot: u8) {
        if (slot as usize) < SLOT_COUNT {
            self.0 |= 1 << slot;
        }
    }

    fn remove(&mut self, slot: u8) {
        if (slot as usize) < SLOT_COUNT {
            self.0 &= !(1 << slot);
        }
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Occupied slots in ascending order
    pub fn iter(self) -> impl Iterator<Item = u8> {
        (0..SLOT_COUNT as u8).filter(move |&slot| self.contains(slot))
    }
}

struct Model<P> {
    selected: Option<u8>,
    auto_start: Option<u8>,
    last_used: Option<u8>,
    state: ProgramState,
    counter: Option<u32>,
    occupancy: Occupancy,
    active_program: Program,
    contact: Contact<P>,
}

/// Persisted programs plus the live engine state
pub struct ProgramManager<M: RawMutex, S, P, E> {
    media: Mutex<M, RefCell<S>>,
    model: Mutex<M, RefCell<Model<P>>>,
    events: E,
}

impl<M, S, P, E> ProgramManager<M, S, P, E>
where
    M: RawMutex,
    S: ByteStore,
    P: OutputPin,
    E: EventSink,
{
    /// Take ownership of the store and relay, scan all slots and make sure
    /// the manual program exists
    pub fn new(store: S, relay: P, events: E) -> Self {
        let manager = Self {
            media: Mutex::new(RefCell::new(store)),
            model: Mutex::new(RefCell::new(Model {
                selected: None,
                auto_start: None,
                last_used: None,
                state: ProgramState::Stopped,
                counter: None,
                occupancy: Occupancy::default(),
                active_program: Program::new(),
                contact: Contact::new(relay),
            })),
            events,
        };
        manager.scan();
        manager
    }

    fn with_model<U>(&self, f: impl FnOnce(&mut Model<P>) -> U) -> U {
        self.model.lock(|model| f(&mut model.borrow_mut()))
    }

    fn with_media<U>(&self, f: impl FnOnce(&mut S) -> U) -> U {
        self.media.lock(|media| f(&mut media.borrow_mut()))
    }

    /// Publish an event after applying it to the program state
    pub fn publish(&self, event: Event) {
        self.with_model(|m| m.state = m.state.transition(event));
        self.events.publish(event);
    }

    /// The sink events are forwarded to
    pub fn events(&self) -> &E {
        &self.events
    }

    // ------------------------------------------------------------------
    // Storage
    // ------------------------------------------------------------------

    fn read_record(&self, slot: u8) -> Option<StoredProgram> {
        if slot as usize >= SLOT_COUNT {
            return None;
        }
        let mut bytes = [0u8; RECORD_SIZE];
        self.with_media(|media| media.read_at(slot_offset(slot), &mut bytes))
            .ok()?;
        StoredProgram::decode(&bytes)
    }

    /// Stage both pages of a record, durable after [`Self::flush`]
    fn write_record(&self, slot: u8, record: &StoredProgram) -> Result<(), StoreError> {
        let bytes = record.encode();
        let page = slot_page(slot);
        self.with_media(|media| {
            for (i, chunk) in bytes.chunks_exact(EEPROM_PAGE_SIZE).enumerate() {
                media.write_page(page + i, chunk)?;
            }
            Ok(())
        })
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.with_media(|media| media.flush())
    }

    /// Rebuild occupancy and the autostart/last used slots from storage
    ///
    /// Slots that fail the marker or CRC check are treated as empty. A
    /// missing manual program is recreated.
    ///
    /// A flag set in more than one record stays with the highest slot; the
    /// other records are rewritten without it.
    pub fn scan(&self) {
        let mut occupancy = Occupancy::default();
        let mut flagged = Occupancy::default();
        let mut auto_start = None;
        let mut last_used = None;

        for slot in 0..SLOT_COUNT as u8 {
            if let Some(record) = self.read_record(slot) {
                occupancy.insert(slot);
                if record.auto_start {
                    flagged.insert(slot);
                    auto_start = Some(slot);
                }
                if record.last_used {
                    flagged.insert(slot);
                    last_used = Some(slot);
                }
            }
        }

        self.with_model(|m| {
            m.occupancy = occupancy;
            m.auto_start = auto_start;
            m.last_used = last_used;
        });

        // On failure the model still holds the winners and the next scan retries
        if flagged.iter().try_for_each(|slot| self.refresh_flags(slot)).is_ok() {
            self.flush().ok();
        }

        if !occupancy.contains(MANUAL_SLOT) {
            self.restore_manual_program();
        }
    }

    fn restore_manual_program(&self) {
        if self.write_pgm_at(MANUAL_SLOT, MANUAL_DEFAULT).is_err() {
            // Unwritable storage: still report the slot, loading it falls
            // back to the fail-safe program
            self.with_model(|m| m.occupancy.insert(MANUAL_SLOT));
        }
    }

    /// Store `text` in `slot`, keeping the slot's autostart and last used
    /// flags. Text longer than a record holds is truncated.
    pub fn write_pgm_at(&self, slot: u8, text: &str) -> Result<(), StoreError> {
        if slot as usize >= SLOT_COUNT {
            return Err(StoreError::OutOfRange);
        }

        let (auto_start, last_used) =
            self.with_model(|m| (m.auto_start == Some(slot), m.last_used == Some(slot)));
        self.write_record(slot, &StoredProgram::new(text, auto_start, last_used))?;
        self.flush()?;
        self.with_model(|m| m.occupancy.insert(slot));
        Ok(())
    }

    /// Erase `slot`
    ///
    /// Autostart, last used and selection pointing at the slot are cleared
    /// (selection falls back to the manual program). Erasing the manual
    /// program resets it to the default.
    pub fn erase(&self, slot: u8) -> Result<(), StoreError> {
        if slot as usize >= SLOT_COUNT {
            return Err(StoreError::OutOfRange);
        }

        let page = slot_page(slot);
        self.with_media(|media| {
            media.erase_page(page)?;
            media.erase_page(page + 1)?;
            media.flush()
        })?;

        self.with_model(|m| {
            m.occupancy.remove(slot);
            if m.auto_start == Some(slot) {
                m.auto_start = None;
            }
            if m.last_used == Some(slot) {
                m.last_used = None;
            }
            if m.selected == Some(slot) {
                m.selected = Some(MANUAL_SLOT);
            }
        });

        if slot == MANUAL_SLOT {
            self.restore_manual_program();
        }
        Ok(())
    }

    /// Text of an occupied slot
    pub fn program_text(&self, slot: u8) -> Option<String<TEXT_LEN>> {
        if !self.is_occupied(slot) {
            return None;
        }
        let record = self.read_record(slot)?;
        let mut text = String::new();
        text.push_str(record.text()).ok()?;
        Some(text)
    }

    /// Stage a rewrite of a slot's record so its flags match the model
    fn refresh_flags(&self, slot: u8) -> Result<(), StoreError> {
        let Some(mut record) = self.read_record(slot) else {
            return Ok(());
        };
        let (auto_start, last_used) =
            self.with_model(|m| (m.auto_start == Some(slot), m.last_used == Some(slot)));
        if record.auto_start == auto_start && record.last_used == last_used {
            return Ok(());
        }
        record.auto_start = auto_start;
        record.last_used = last_used;
        self.write_record(slot, &record)
    }

    fn reassign(
        &self,
        slot: Option<u8>,
        field: impl FnOnce(&mut Model<P>) -> &mut Option<u8>,
    ) -> Result<(), StoreError> {
        if matches!(slot, Some(s) if s as usize >= SLOT_COUNT) {
            return Err(StoreError::OutOfRange);
        }

        let previous = self.with_model(|m| core::mem::replace(field(m), slot));
        if previous == slot {
            return Ok(());
        }
        if let Some(old) = previous {
            self.refresh_flags(old)?;
        }
        if let Some(new) = slot {
            self.refresh_flags(new)?;
        }
        self.flush()
    }

    /// Designate the slot run at power-up, `None` to disable autostart
    pub fn set_autostart(&self, slot: Option<u8>) -> Result<(), StoreError> {
        self.reassign(slot, |m| &mut m.auto_start)
    }

    /// Record the slot that was run last
    pub fn set_lastused(&self, slot: Option<u8>) -> Result<(), StoreError> {
        self.reassign(slot, |m| &mut m.last_used)
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    /// Restore the selection and run the autostart program, if any
    pub fn boot(&self) {
        let (auto_start, last_used) = self.with_model(|m| (m.auto_start, m.last_used));
        self.set_selected(Some(last_used.unwrap_or(MANUAL_SLOT)));

        if let Some(slot) = auto_start {
            self.set_selected(Some(slot));
            self.load(slot);
        }
    }

    /// Load `slot` as the active program and start it
    ///
    /// An empty slot or unparsable text loads the fail-safe program.
    pub fn load(&self, slot: u8) {
        let program = self.read_program(slot).unwrap_or_else(Program::fail_safe);
        self.install(program);
    }

    /// Load an already parsed program and start it
    pub fn load_program(&self, program: &Program) {
        self.install(program.clone());
    }

    fn read_program(&self, slot: u8) -> Option<Program> {
        if !self.is_occupied(slot) {
            return None;
        }
        let record = self.read_record(slot)?;
        match parse(record.text()) {
            Ok(Parsed::Program(program)) => Some(program),
            _ => None,
        }
    }

    fn install(&self, mut program: Program) {
        program.start();
        self.with_model(|m| m.active_program = program);
        self.publish(Event::StartProgram { from_start: true });
    }

    /// Pause the active program
    pub fn stop(&self) {
        self.publish(Event::StopProgram);
    }

    /// Continue the active program where it was paused
    pub fn resume(&self) {
        self.publish(Event::StartProgram { from_start: false });
    }

    /// Copy of the active program
    pub fn active_program(&self) -> Program {
        self.with_model(|m| m.active_program.clone())
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Next occupied slot after `from`, or `from` if there is none
    pub fn next_slot(&self, from: u8) -> u8 {
        let occupancy = self.occupancy();
        (from.saturating_add(1)..SLOT_COUNT as u8)
            .find(|&slot| occupancy.contains(slot))
            .unwrap_or(from)
    }

    /// Previous occupied slot before `from`, bottoming out at the manual
    /// program
    pub fn prev_slot(&self, from: u8) -> u8 {
        let occupancy = self.occupancy();
        (0..from.min(SLOT_COUNT as u8))
            .rev()
            .find(|&slot| occupancy.contains(slot))
            .unwrap_or(MANUAL_SLOT)
    }

    // ------------------------------------------------------------------
    // Contact
    // ------------------------------------------------------------------

    /// Drive the contact
    pub fn drive_contact(&self, state: ContactState) {
        self.with_model(|m| m.contact.set(state, &self.events));
    }

    /// Toggle the contact by hand
    pub fn flip_contact(&self) {
        self.with_model(|m| m.contact.flip(&self.events));
    }

    /// Apply the wiring reported by the NO/NC sense inputs
    pub fn set_contact_wiring(&self, is_no: bool) {
        self.with_model(|m| m.contact.set_as_no(is_no, &self.events));
    }

    pub fn contact_is_open(&self) -> bool {
        self.with_model(|m| m.contact.is_open())
    }

    pub fn contact_is_no(&self) -> bool {
        self.with_model(|m| m.contact.is_no())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn selected(&self) -> Option<u8> {
        self.with_model(|m| m.selected)
    }

    pub fn set_selected(&self, slot: Option<u8>) {
        self.with_model(|m| m.selected = slot);
    }

    pub fn state(&self) -> ProgramState {
        self.with_model(|m| m.state)
    }

    pub fn set_state(&self, state: ProgramState) {
        self.with_model(|m| m.state = state);
    }

    /// Completed loops of the active program, `None` before the first start
    pub fn counter(&self) -> Option<u32> {
        self.with_model(|m| m.counter)
    }

    pub fn set_counter(&self, counter: Option<u32>) {
        self.with_model(|m| m.counter = counter);
    }

    pub fn auto_start(&self) -> Option<u8> {
        self.with_model(|m| m.auto_start)
    }

    pub fn last_used(&self) -> Option<u8> {
        self.with_model(|m| m.last_used)
    }

    pub fn occupancy(&self) -> Occupancy {
        self.with_model(|m| m.occupancy)
    }

    pub fn is_occupied(&self, slot: u8) -> bool {
        self.occupancy().contains(slot)
    }
}

impl<M, S, P, E> SequencerHost for ProgramManager<M, S, P, E>
where
    M: RawMutex,
    S: ByteStore,
    P: OutputPin,
    E: EventSink,
{
    fn active_program(&self) -> Program {
        ProgramManager::active_program(self)
    }

    fn counter(&self) -> Option<u32> {
        ProgramManager::counter(self)
    }

    fn set_counter(&self, counter: Option<u32>) {
        ProgramManager::set_counter(self, counter)
    }

    fn drive_contact(&self, state: ContactState) {
        ProgramManager::drive_contact(self, state)
    }

    fn publish(&self, event: Event) {
        ProgramManager::publish(self, event)
    }
}

#[cfg(test)]
impl<M, S, E> ProgramManager<M, S, crate::testing::MockPin, E>
where
    M: RawMutex,
    S: ByteStore,
    E: EventSink,
{
    /// Writes performed on the relay pin
    pub(crate) fn relay_writes(&self) -> usize {
        self.with_model(|m| m.contact.relay().writes)
    }
}
